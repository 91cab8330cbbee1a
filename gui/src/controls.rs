use catalog::{
    BottomCase, Catalog, KeyboardModel, MountingAngle, RightShift, Side, VariantOption,
};
use config::{Colors, Config};
use model::Session;
use show::{
    egui::{Align, Frame, Layout, Margin, RichText, ScrollArea, Ui},
    parameters_section, show_choice, Show,
};

/// A command issued by the controls.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Select a variant option for a side.
    SetVariant(Side, VariantOption),
    /// Select the bottom case of both sides.
    SetBottomCase(BottomCase),
    /// Select the width of the right shift key.
    SetRightShift(RightShift),
    /// Select the mounting angle preset of a side.
    SetMountingAngle(Side, MountingAngle),
    /// Change the display colors.
    SetColors(Colors),
}

/// The selections of one side.
struct SideControls {
    side: Side,
    option: VariantOption,
    options: Vec<VariantOption>,
    mounting_angle: MountingAngle,
}

impl SideControls {
    fn show(&mut self, ui: &mut Ui, commands: &mut Vec<Command>) {
        let title = match self.side {
            Side::Left => "Left side",
            Side::Right => "Right side",
        };

        parameters_section(ui, title, |ui| {
            ui.horizontal(|ui| {
                ui.label("Layout")
                    .on_hover_text("Layout option of this side");
                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                    if show_choice(ui, &mut self.option, &self.options) {
                        commands.push(Command::SetVariant(self.side, self.option));
                    }
                });
            });
            if self.mounting_angle.show_with_name_and_description(
                ui,
                "Mounting angle",
                "Tilt of this side in degrees",
            ) {
                commands.push(Command::SetMountingAngle(self.side, self.mounting_angle));
            }
        });
    }
}

/// The controls for configuring the keyboard.
pub struct Controls {
    model: KeyboardModel,
    left: SideControls,
    right: SideControls,
    bottom_case: BottomCase,
    right_shift: RightShift,
    colors: Colors,
}

impl Controls {
    /// Creates the controls for the configured keyboard.
    ///
    /// # Errors
    ///
    /// Returns an [`catalog::Error`] if the catalog does not contain the configured keyboard.
    pub fn new(catalog: &Catalog, config: &Config) -> Result<Self, catalog::Error> {
        let side = |side| -> Result<SideControls, catalog::Error> {
            let entry = catalog.side(config.keyboard, side)?;
            let option = config.selection(side).option;

            Ok(SideControls {
                side,
                option: if entry.supports(option) {
                    option
                } else {
                    entry.default
                },
                options: entry.options.clone(),
                mounting_angle: config.mounting_angle,
            })
        };

        Ok(Self {
            model: config.keyboard,
            left: side(Side::Left)?,
            right: side(Side::Right)?,
            bottom_case: config.bottom_case,
            right_shift: config.right_shift,
            colors: config.colors.clone(),
        })
    }

    /// Shows the controls. Returns the commands issued by the user.
    pub fn show(&mut self, ui: &mut Ui) -> Vec<Command> {
        const MARGIN: Margin = Margin {
            left: 0.0,
            right: 8.0,
            top: 4.0,
            bottom: 8.0,
        };

        let mut commands = Vec::new();

        ui.add_space(8.0);
        ui.label(RichText::new(self.model.to_string().to_uppercase()).strong().size(16.0));
        ScrollArea::vertical().show(ui, |ui| {
            Frame::default().inner_margin(MARGIN).show(ui, |ui| {
                self.left.show(ui, &mut commands);
                self.right.show(ui, &mut commands);

                parameters_section(ui, "Case", |ui| {
                    if self.bottom_case.show_with_name_and_description(
                        ui,
                        "Bottom case",
                        "Style of the bottom case",
                    ) {
                        commands.push(Command::SetBottomCase(self.bottom_case));
                    }
                    if self.right_shift.show_with_name_and_description(
                        ui,
                        "Right shift",
                        "Width of the right shift key in units times 100",
                    ) {
                        commands.push(Command::SetRightShift(self.right_shift));
                    }
                });

                if self.colors.show(ui) {
                    commands.push(Command::SetColors(self.colors.clone()));
                }
            });
        });

        commands
    }

    /// Updates the shown selections to the ones of the session, e.g. after a failed load.
    pub fn sync(&mut self, session: &Session) {
        self.left.option = session.assembly(Side::Left).selected();
        self.right.option = session.assembly(Side::Right).selected();
    }
}

#[cfg(test)]
mod tests {
    use catalog::{CaseType, OptionCategory};
    use config::SideSelection;

    use super::*;

    #[test]
    fn unsupported_options_show_side_default() {
        let config = Config {
            keyboard: KeyboardModel::Sinc,
            case_type: CaseType::Two,
            right: SideSelection::new(OptionCategory::Macro, VariantOption::Sixty),
            ..Config::default()
        };

        let controls =
            Controls::new(&Catalog::default(), &config).expect("controls should be created");

        assert_eq!(controls.right.option, VariantOption::SixtyFive);
        assert_eq!(
            controls.right.options,
            vec![VariantOption::SixtyFive, VariantOption::SixtyFiveBlocked]
        );
        assert_eq!(controls.left.option, VariantOption::Macro);
    }
}
