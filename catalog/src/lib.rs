//! The `catalog` crate contains the geometry catalog of all supported keyboards.

mod layout;
mod raw;

use std::{collections::BTreeMap, fs::read_to_string, io, path::Path};

pub use config::{
    BottomCase, CaseType, KeyboardModel, MountingAngle, OptionCategory, RightShift, Side,
    VariantOption,
};
pub use layout::{Anchor, LayoutError, PlateOutline, RowMapping, SwitchLayout};

/// The catalog embedded into the binary.
pub const EMBEDDED_CATALOG: &str = include_str!("catalog.toml");

/// The plate key shared by all blocker variants.
pub const BASE_PLATE: &str = "base";

/// An immutable lookup table of the geometry of all keyboard models and sides.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    keyboards: BTreeMap<KeyboardModel, KeyboardEntry>,
}

/// The catalog entries of both sides of one keyboard model.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardEntry {
    /// The left side.
    pub left: SideEntry,
    /// The right side.
    pub right: SideEntry,
}

/// The catalog entry of one keyboard side.
#[derive(Clone, Debug, PartialEq)]
pub struct SideEntry {
    /// The category of all options of this side.
    pub category: OptionCategory,
    /// The selectable options in display order.
    pub options: Vec<VariantOption>,
    /// The option used when a selection is not supported by this side.
    pub default: VariantOption,
    /// The switch layouts.
    pub storage: LayoutStorage,
    /// The anchors of the two USB connector instances.
    pub usb: [Anchor; 2],
    /// The plate key of each structural option.
    pub plate_keys: BTreeMap<VariantOption, String>,
    /// The plate outlines by plate key.
    pub plates: BTreeMap<String, PlateOutline>,
    /// The mounting angles in degrees by mounting key and angle preset.
    pub mounting_angles: BTreeMap<VariantOption, BTreeMap<MountingAngle, f32>>,
    /// The mounting hardware anchors by mounting key.
    pub mounting_positions: BTreeMap<VariantOption, Vec<Anchor>>,
    /// The alternate positions of the right shift switch, if supported.
    pub shift: Option<ShiftTable>,
}

/// The way the switch layouts of a side are stored.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutStorage {
    /// One complete layout per option.
    Enumerated(BTreeMap<VariantOption, SwitchLayout>),
    /// A base layout extended by an optional fragment per option.
    Composite {
        /// The layout shared by all options.
        base: SwitchLayout,
        /// The fragments appended to the base layout.
        fragments: BTreeMap<VariantOption, SwitchLayout>,
    },
}

/// The alternate positions of the right shift switch.
#[derive(Clone, Debug, PartialEq)]
pub struct ShiftTable {
    /// The index of the shift anchor in the base layout.
    pub index: usize,
    /// The anchor position per shift width.
    pub positions: BTreeMap<RightShift, Anchor>,
}

impl ShiftTable {
    /// Returns the anchor of the shift switch with the given width.
    #[must_use]
    pub fn position(&self, width: RightShift) -> Option<Anchor> {
        self.positions.get(&width).copied()
    }

    /// Returns the name of the keycap row of the shift key with the given width.
    #[must_use]
    pub fn row_name(width: RightShift) -> String {
        format!("r4-{width}")
    }
}

impl Catalog {
    /// Parses a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the file cannot be read or the catalog is invalid.
    pub fn try_from_path(catalog_path: &Path) -> Result<Self, Error> {
        Self::try_from_toml(&read_to_string(catalog_path)?)
    }

    /// Parses and validates a catalog from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the string is not a valid catalog.
    pub fn try_from_toml(toml_string: &str) -> Result<Self, Error> {
        let raw: raw::RawCatalog = toml::from_str(toml_string)?;
        raw.try_into()
    }

    /// Returns the entries of both sides of a keyboard model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingKeyboard`] if the model is not part of the catalog.
    pub fn keyboard(&self, model: KeyboardModel) -> Result<&KeyboardEntry, Error> {
        self.keyboards
            .get(&model)
            .ok_or(Error::MissingKeyboard { model })
    }

    /// Returns the entry of one side of a keyboard model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingKeyboard`] if the model is not part of the catalog.
    pub fn side(&self, model: KeyboardModel, side: Side) -> Result<&SideEntry, Error> {
        let keyboard = self.keyboard(model)?;

        Ok(match side {
            Side::Left => &keyboard.left,
            Side::Right => &keyboard.right,
        })
    }

    /// Returns the stored layout of a side and option.
    ///
    /// For composite sides only the `base` layout is stored.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the triple is not part of the catalog.
    pub fn layout(
        &self,
        model: KeyboardModel,
        side: Side,
        option: VariantOption,
    ) -> Result<&SwitchLayout, Error> {
        let entry = self.side(model, side)?;
        let layout = match &entry.storage {
            LayoutStorage::Enumerated(layouts) => layouts.get(&option),
            LayoutStorage::Composite { base, .. } => {
                (option == VariantOption::Base).then_some(base)
            }
        };

        layout.ok_or(Error::MissingLayout {
            model,
            side,
            option,
        })
    }

    /// Returns the plate outline stored under the given plate key.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the plate is not part of the catalog.
    pub fn plate_outline(
        &self,
        model: KeyboardModel,
        side: Side,
        key: &str,
    ) -> Result<&PlateOutline, Error> {
        self.side(model, side)?
            .plates
            .get(key)
            .ok_or_else(|| Error::MissingPlate {
                model,
                side,
                key: key.to_owned(),
            })
    }

    /// Returns the anchors of the two USB connectors of a side.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingKeyboard`] if the model is not part of the catalog.
    pub fn usb_anchors(&self, model: KeyboardModel, side: Side) -> Result<[Anchor; 2], Error> {
        Ok(self.side(model, side)?.usb)
    }

    /// Returns all keyboard models of the catalog.
    pub fn models(&self) -> impl Iterator<Item = KeyboardModel> + '_ {
        self.keyboards.keys().copied()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::try_from_toml(EMBEDDED_CATALOG).expect("embedded catalog should always be valid")
    }
}

impl SideEntry {
    /// Returns true if the option can be selected on this side.
    #[must_use]
    pub fn supports(&self, option: VariantOption) -> bool {
        self.options.contains(&option)
    }

    /// Returns every layout and fragment stored for this side, with its name.
    pub fn stored_layouts(&self) -> Box<dyn Iterator<Item = (VariantOption, &SwitchLayout)> + '_> {
        match &self.storage {
            LayoutStorage::Enumerated(layouts) => {
                Box::new(layouts.iter().map(|(&option, layout)| (option, layout)))
            }
            LayoutStorage::Composite { base, fragments } => Box::new(
                std::iter::once((VariantOption::Base, base))
                    .chain(fragments.iter().map(|(&option, layout)| (option, layout))),
            ),
        }
    }
}

/// The error type for errors regarding loading and querying the catalog.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to open file.
    #[error("failed to open file")]
    FileOpen(#[from] io::Error),
    /// Failed to parse TOML.
    #[error("failed to parse TOML")]
    TomlParse(#[from] toml::de::Error),
    /// A string in the catalog is not one of the enumerated options.
    #[error(transparent)]
    Option(#[from] config::Error),
    /// The keyboard model is not part of the catalog.
    #[error("keyboard `{model}` is not part of the catalog")]
    MissingKeyboard {
        /// The requested model.
        model: KeyboardModel,
    },
    /// The layout is not part of the catalog.
    #[error("no layout `{option}` for {model} {side}")]
    MissingLayout {
        /// The requested model.
        model: KeyboardModel,
        /// The requested side.
        side: Side,
        /// The requested option.
        option: VariantOption,
    },
    /// The plate outline is not part of the catalog.
    #[error("no plate `{key}` for {model} {side}")]
    MissingPlate {
        /// The requested model.
        model: KeyboardModel,
        /// The requested side.
        side: Side,
        /// The requested plate key.
        key: String,
    },
    /// A layout violates the row mapping invariant.
    #[error("invalid layout {location}")]
    InvalidLayout {
        /// The path of the layout in the catalog.
        location: String,
        /// The violated invariant.
        #[source]
        source: LayoutError,
    },
    /// A side entry is inconsistent.
    #[error("invalid entry {location}: {reason}")]
    InvalidEntry {
        /// The path of the entry in the catalog.
        location: String,
        /// The reason the entry was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_is_valid() {
        let catalog = Catalog::try_from_toml(EMBEDDED_CATALOG).expect("catalog should be valid");

        assert_eq!(
            catalog.models().collect::<Vec<_>>(),
            vec![
                KeyboardModel::Quefrency,
                KeyboardModel::Sinc,
                KeyboardModel::Kbo
            ]
        );
    }

    #[test]
    fn looks_up_enumerated_layouts() {
        let catalog = Catalog::default();

        let macro_layout = catalog
            .layout(KeyboardModel::Quefrency, Side::Left, VariantOption::Macro)
            .expect("layout should exist");
        let no_macro_layout = catalog
            .layout(KeyboardModel::Quefrency, Side::Left, VariantOption::NoMacro)
            .expect("layout should exist");

        assert_eq!(macro_layout.anchors.len(), 39);
        assert_eq!(no_macro_layout.anchors.len(), 29);
    }

    #[test]
    fn missing_triples_are_errors() {
        let catalog = Catalog::default();

        assert!(matches!(
            catalog.layout(KeyboardModel::Quefrency, Side::Right, VariantOption::Macro),
            Err(Error::MissingLayout {
                option: VariantOption::Macro,
                ..
            })
        ));
        assert!(matches!(
            catalog.layout(KeyboardModel::Kbo, Side::Left, VariantOption::Blocker1),
            Err(Error::MissingLayout { .. })
        ));
        assert!(matches!(
            catalog.plate_outline(KeyboardModel::Sinc, Side::Right, "no-macro"),
            Err(Error::MissingPlate { .. })
        ));
    }

    #[test]
    fn composite_sides_store_base_and_fragments() {
        let catalog = Catalog::default();
        let entry = catalog
            .side(KeyboardModel::Kbo, Side::Right)
            .expect("side should exist");

        let LayoutStorage::Composite { base, fragments } = &entry.storage else {
            panic!("kbo should be stored as composite");
        };

        assert_eq!(base.anchors.len(), 43);
        assert_eq!(fragments[&VariantOption::NoBlocker].anchors.len(), 5);
        assert!(!fragments.contains_key(&VariantOption::Blocker2));
        assert_eq!(entry.shift.as_ref().map(|shift| shift.index), Some(42));
    }

    #[test]
    fn usb_anchors_per_side() {
        let catalog = Catalog::default();

        for model in catalog.models() {
            for side in Side::ALL {
                assert!(catalog.usb_anchors(model, *side).is_ok());
            }
        }
    }

    #[test]
    fn rejects_invalid_row_mapping() {
        let toml_string = EMBEDDED_CATALOG.replacen(
            "r2-150 = { length = 1, matrix = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,",
            "r2-150 = { length = 2, matrix = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,",
            1,
        );

        assert!(matches!(
            Catalog::try_from_toml(&toml_string),
            Err(Error::InvalidLayout {
                source: LayoutError::MissingSlot { slot: 2, .. },
                ..
            })
        ));
    }

    #[test]
    fn rejects_default_outside_of_options() {
        let toml_string =
            EMBEDDED_CATALOG.replacen("options = [\"65\", \"65-b\"]", "options = [\"65-b\"]", 1);

        assert!(matches!(
            Catalog::try_from_toml(&toml_string),
            Err(Error::InvalidEntry { .. })
        ));
    }

    #[test]
    fn rejects_unknown_option() {
        let toml_string = EMBEDDED_CATALOG.replacen("default = \"macro\"", "default = \"tkl\"", 1);

        assert!(Catalog::try_from_toml(&toml_string).is_err());
    }
}
