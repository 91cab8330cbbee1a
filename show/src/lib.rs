//! The `show` crate defines a trait for showing option widgets.

use std::fmt::Display;

use hex_color::HexColor;
use three_d::egui::{Align, CollapsingHeader, ComboBox, Layout, RichText, Ui};

pub use three_d::egui;

/// A color.
pub type Color = HexColor;

/// A trait for showing an option widget.
pub trait Show {
    /// Shows a widget allowing to modify self. Returns true if self was changed.
    fn show(&mut self, ui: &mut Ui) -> bool;

    /// Shows a widget with a name and description. Returns true if self was changed.
    fn show_with_name_and_description(
        &mut self,
        ui: &mut Ui,
        label: &str,
        description: &str,
    ) -> bool {
        let mut changed = false;

        ui.horizontal(|ui| {
            ui.label(label).on_hover_text(description);
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                changed = self.show(ui);
            });
        });

        changed
    }
}

/// A closed set of choices which can be shown as a combo box.
pub trait Choice: Copy + PartialEq + Display + 'static {
    /// All available choices in display order.
    const CHOICES: &'static [Self];
}

impl<T: Choice> Show for T {
    fn show(&mut self, ui: &mut Ui) -> bool {
        show_choice(ui, self, T::CHOICES)
    }
}

/// Shows a combo box for selecting one of the given choices. Returns true if the value changed.
pub fn show_choice<T>(ui: &mut Ui, value: &mut T, choices: &[T]) -> bool
where
    T: Copy + PartialEq + Display,
{
    let previous = *value;

    ComboBox::from_id_source(ui.next_auto_id())
        .selected_text(value.to_string())
        .show_ui(ui, |ui| {
            for &choice in choices {
                ui.selectable_value(value, choice, choice.to_string());
            }
        });

    previous != *value
}

/// Creates a collapseable section with a title and the given UI function as content.
pub fn parameters_section(ui: &mut Ui, title: &str, add_contents: impl FnOnce(&mut Ui)) {
    CollapsingHeader::new(RichText::new(title).size(14.0))
        .default_open(true)
        .show(ui, add_contents);
}

impl Show for Color {
    fn show(&mut self, ui: &mut Ui) -> bool {
        let Color { r, g, b, a } = *self;
        let mut color = [r, g, b];

        let changed = ui.color_edit_button_srgb(&mut color).changed();

        let [r, g, b] = color;
        *self = Color { r, g, b, a };

        changed
    }
}
