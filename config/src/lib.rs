//! The `config` crate contains the closed option enumerations and the configurator settings.

mod options;

use std::{fs::read_to_string, io, path::Path};

use serde::{Deserialize, Serialize};
use show::{egui::Ui, parameters_section, Show};

pub use options::{
    BottomCase, CaseType, KeyboardModel, MountingAngle, OptionCategory, RightShift, Side,
    VariantOption,
};
pub use show::Color;

/// A configuration of the configurator session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// The keyboard model to configure.
    pub keyboard: KeyboardModel,
    /// The case type used for the case assets.
    pub case_type: CaseType,
    /// The initial selection of the left side.
    pub left: SideSelection,
    /// The initial selection of the right side.
    pub right: SideSelection,
    /// The initial bottom case style.
    #[serde(default)]
    pub bottom_case: BottomCase,
    /// The initial right shift width.
    #[serde(default)]
    pub right_shift: RightShift,
    /// The initial mounting angle preset.
    #[serde(default)]
    pub mounting_angle: MountingAngle,
    /// The colors used for displaying the keyboard.
    pub colors: Colors,
    /// The asset settings.
    pub assets: Assets,
}

/// The selected variant of one keyboard side together with its category.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SideSelection {
    /// The category of the selected option.
    pub category: OptionCategory,
    /// The selected option.
    pub option: VariantOption,
}

impl SideSelection {
    /// Creates a new selection.
    #[must_use]
    pub fn new(category: OptionCategory, option: VariantOption) -> Self {
        Self { category, option }
    }
}

/// The colors used for displaying the keyboard.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Colors {
    /// The color of the case shell.
    pub case: Color,
    /// The color of the keycaps.
    pub keycap: Color,
    /// The color of the switches and the plate.
    pub switch: Color,
    /// The color of the PCB.
    pub pcb: Color,
    /// The color of the USB connectors.
    pub usb: Color,
    /// The color of the background.
    pub background: Color,
}

/// The settings for locating assets.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Assets {
    /// The directory all asset paths are relative to.
    pub root: String,
}

impl Config {
    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the file cannot be read or is not a valid configuration.
    pub fn try_from_path(config_path: &Path) -> Result<Self, Error> {
        Self::try_from_toml(&read_to_string(config_path)?)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the string is not a valid configuration.
    pub fn try_from_toml(toml_string: &str) -> Result<Self, Error> {
        Ok(toml::from_str(toml_string)?)
    }

    /// Returns the initial selection of the given side.
    #[must_use]
    pub fn selection(&self, side: Side) -> SideSelection {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let toml_string = include_str!("default.toml");
        toml::from_str(toml_string).expect("default configuration should always be deserializable")
    }
}

impl Show for Colors {
    fn show(&mut self, ui: &mut Ui) -> bool {
        let mut changed = false;

        parameters_section(ui, "Colors", |ui| {
            changed |= self
                .case
                .show_with_name_and_description(ui, "Case", "Color of the case shell");
            changed |= self
                .keycap
                .show_with_name_and_description(ui, "Keycaps", "Color of the keycaps");
            changed |= self.switch.show_with_name_and_description(
                ui,
                "Switches",
                "Color of the switches and the plate",
            );
            changed |= self
                .pcb
                .show_with_name_and_description(ui, "PCB", "Color of the PCB");
            changed |= self.usb.show_with_name_and_description(
                ui,
                "Hardware",
                "Color of the USB connector and mounting hardware",
            );
            changed |= self.background.show_with_name_and_description(
                ui,
                "Background",
                "Color of the background",
            );
        });

        changed
    }
}

/// The error type for errors regarding parsing configurations and options.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to open file.
    #[error("failed to open file")]
    FileOpen(#[from] io::Error),
    /// Failed to parse TOML.
    #[error("failed to parse TOML")]
    TomlParse(#[from] toml::de::Error),
    /// A string is not one of the enumerated options.
    #[error("unknown {kind} `{value}`")]
    UnknownOption {
        /// The name of the enumeration.
        kind: &'static str,
        /// The rejected string.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        let config = Config::default();

        assert_eq!(config.keyboard, KeyboardModel::Quefrency);
        assert_eq!(
            config.selection(Side::Left),
            SideSelection::new(OptionCategory::Macro, VariantOption::Macro)
        );
        assert_eq!(config.bottom_case, BottomCase::Standard);
    }

    #[test]
    fn rejects_unknown_option_in_file() {
        let toml_string =
            include_str!("default.toml").replace("option = \"macro\"", "option = \"tkl\"");

        assert!(matches!(
            Config::try_from_toml(&toml_string),
            Err(Error::TomlParse(_))
        ));
    }

    #[test]
    fn optional_fields_fall_back_to_defaults() {
        let toml_string = include_str!("default.toml")
            .lines()
            .filter(|line| !line.starts_with("bottom_case") && !line.starts_with("right_shift"))
            .collect::<Vec<_>>()
            .join("\n");

        let config = Config::try_from_toml(&toml_string).expect("configuration should parse");

        assert_eq!(config.bottom_case, BottomCase::Standard);
        assert_eq!(config.right_shift, RightShift::U2_75);
    }
}
