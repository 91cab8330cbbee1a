use std::sync::Arc;

use catalog::{
    Anchor, CaseType, Catalog, KeyboardModel, LayoutStorage, MountingAngle, OptionCategory,
    PlateOutline, RightShift, RowMapping, ShiftTable, Side, SideEntry, SwitchLayout,
    VariantOption, BASE_PLATE,
};
use log::warn;

use crate::Error;

/// The shared template asset containing the switch mesh.
pub const SWITCH_ASSET: &str = "models/switch.glb";
/// The shared template asset containing one keycap mesh per row.
pub const KEYCAPS_ASSET: &str = "models/keycaps.glb";
/// The shared template asset containing the mounting hardware mesh.
pub const MOUNTING_ASSET: &str = "models/mounting.glb";
/// The shared template asset containing the USB connector mesh.
pub const USB_ASSET: &str = "models/usb.glb";

/// The asset paths needed to display one side in one variant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssetNames {
    /// The path of the case asset.
    pub case: String,
    /// The path of the plate asset.
    pub plate: String,
}

/// The mounting hardware of one side in one variant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mounting {
    /// The tilt of the side in degrees.
    pub angle: f32,
    /// The anchors of the mounting hardware.
    pub positions: Vec<Anchor>,
}

/// A resolver translating user selections into concrete geometry and asset names.
#[derive(Clone, Debug)]
pub struct Resolver {
    catalog: Arc<Catalog>,
}

impl Resolver {
    /// Creates a new resolver for the given catalog.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Returns the underlying catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the catalog entry of a side.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the model is not part of the catalog.
    pub fn entry(&self, model: KeyboardModel, side: Side) -> Result<&SideEntry, Error> {
        Ok(self.catalog.side(model, side)?)
    }

    /// Returns the option actually displayed for a selection.
    ///
    /// Options not supported by the side fall back to the side's default option.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the model is not part of the catalog.
    pub fn effective_option(
        &self,
        model: KeyboardModel,
        side: Side,
        option: VariantOption,
    ) -> Result<VariantOption, Error> {
        let entry = self.entry(model, side)?;

        if entry.supports(option) {
            Ok(option)
        } else {
            warn!(
                "Option `{option}` is not available for {model} {side}, using `{}`",
                entry.default
            );
            Ok(entry.default)
        }
    }

    /// Returns the switch layout of a side in the given option.
    ///
    /// The returned layout is an owned copy, composite layouts are merged from the base
    /// layout and the fragment of the option or consist of the base layout alone.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the layout is not part of the catalog.
    pub fn resolve_switch_layout(
        &self,
        model: KeyboardModel,
        side: Side,
        option: VariantOption,
    ) -> Result<SwitchLayout, Error> {
        let option = self.effective_option(model, side, option)?;

        match &self.entry(model, side)?.storage {
            LayoutStorage::Enumerated(layouts) => layouts.get(&option).cloned().ok_or(
                catalog::Error::MissingLayout {
                    model,
                    side,
                    option,
                }
                .into(),
            ),
            LayoutStorage::Composite { base, fragments } => Ok(match fragments.get(&option) {
                Some(fragment) => merge(base, fragment),
                None => base.clone(),
            }),
        }
    }

    /// Returns the switch layout of a side with the right shift switch at the given width.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the layout is not part of the catalog.
    pub fn resolve_shifted_layout(
        &self,
        model: KeyboardModel,
        side: Side,
        option: VariantOption,
        width: RightShift,
    ) -> Result<SwitchLayout, Error> {
        let layout = self.resolve_switch_layout(model, side, option)?;

        Ok(match &self.entry(model, side)?.shift {
            Some(shift) => with_right_shift(&layout, shift, width),
            None => layout,
        })
    }

    /// Returns the key of the plate outline of a side in the given option.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the model is not part of the catalog.
    pub fn plate_key(
        &self,
        model: KeyboardModel,
        side: Side,
        category: OptionCategory,
        option: VariantOption,
    ) -> Result<String, Error> {
        if category == OptionCategory::Blocker {
            return Ok(BASE_PLATE.to_owned());
        }

        let option = self.effective_option(model, side, option)?;
        let entry = self.entry(model, side)?;

        entry
            .plate_keys
            .get(&option)
            .cloned()
            .ok_or_else(|| {
                catalog::Error::MissingPlate {
                    model,
                    side,
                    key: option.to_string(),
                }
                .into()
            })
    }

    /// Returns the plate outline of a side in the given option.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the plate is not part of the catalog.
    pub fn resolve_plate_outline(
        &self,
        model: KeyboardModel,
        side: Side,
        category: OptionCategory,
        option: VariantOption,
    ) -> Result<&PlateOutline, Error> {
        let key = self.plate_key(model, side, category, option)?;

        Ok(self.catalog.plate_outline(model, side, &key)?)
    }

    /// Returns the asset names of a side in the given option.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the model is not part of the catalog.
    pub fn resolve_asset_names(
        &self,
        model: KeyboardModel,
        side: Side,
        option: VariantOption,
        case_type: CaseType,
    ) -> Result<AssetNames, Error> {
        let category = self.entry(model, side)?.category;
        let option = self.effective_option(model, side, option)?;

        Ok(asset_names(model, side, category, option, case_type))
    }

    /// Returns the mounting hardware of a side in the given option and angle preset.
    ///
    /// Missing catalog data resolves to a flat side without mounting hardware.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the model is not part of the catalog.
    pub fn resolve_mounting(
        &self,
        model: KeyboardModel,
        side: Side,
        category: OptionCategory,
        option: VariantOption,
        angle: MountingAngle,
    ) -> Result<Mounting, Error> {
        let key = match category {
            OptionCategory::Blocker => VariantOption::Base,
            OptionCategory::Macro => self.effective_option(model, side, option)?,
        };
        let entry = self.entry(model, side)?;

        let angle = entry
            .mounting_angles
            .get(&key)
            .and_then(|angles| angles.get(&angle))
            .copied()
            .unwrap_or_default();
        let positions = entry
            .mounting_positions
            .get(&key)
            .cloned()
            .unwrap_or_default();

        Ok(Mounting { angle, positions })
    }
}

/// Returns the asset names of a side.
///
/// The left case and plate get a `-macro` suffix for the macro option. The right case gets
/// a `-60` or `-65` suffix for structural options, the plate only the `-65` suffix.
#[must_use]
pub fn asset_names(
    model: KeyboardModel,
    side: Side,
    category: OptionCategory,
    option: VariantOption,
    case_type: CaseType,
) -> AssetNames {
    let initial = model.initial();
    let mut case = format!("models/type{case_type}/t{case_type}-{initial}-{side}");
    let mut plate = format!("models/plates/{initial}-{side}");

    match side {
        Side::Left => {
            if option == VariantOption::Macro {
                case.push_str("-macro");
                plate.push_str("-macro");
            }
        }
        Side::Right => {
            if category == OptionCategory::Macro {
                if option == VariantOption::Sixty {
                    case.push_str("-60");
                } else {
                    case.push_str("-65");
                    plate.push_str("-65");
                }
            }
        }
    }

    AssetNames {
        case: case + ".glb",
        plate: plate + ".glb",
    }
}

/// Merges a base layout with a fragment into a new layout.
///
/// The fragment anchors are appended to the base anchors. Rows present in both parts are
/// joined with the fragment slots following the base slots.
#[must_use]
pub fn merge(base: &SwitchLayout, fragment: &SwitchLayout) -> SwitchLayout {
    let base_count = base.anchors.len();
    let fragment_count = fragment.anchors.len();

    let anchors = base
        .anchors
        .iter()
        .chain(&fragment.anchors)
        .copied()
        .collect();

    let mut rows = base.rows.clone();
    for row in rows.values_mut() {
        row.matrix.resize(base_count + fragment_count, 0);
    }

    for (name, fragment_row) in &fragment.rows {
        let row = rows.entry(name.clone()).or_insert_with(|| RowMapping {
            length: 0,
            matrix: vec![0; base_count + fragment_count],
        });

        #[allow(clippy::cast_possible_truncation)]
        let offset = row.length as u32;
        for (index, &slot) in fragment_row.matrix.iter().enumerate() {
            if slot > 0 {
                row.matrix[base_count + index] = slot + offset;
            }
        }
        row.length += fragment_row.length;
    }

    SwitchLayout { anchors, rows }
}

/// Returns a copy of the layout with the right shift switch at the given width.
///
/// Layouts without an anchor at the shift index are returned unchanged.
#[must_use]
pub fn with_right_shift(
    layout: &SwitchLayout,
    shift: &ShiftTable,
    width: RightShift,
) -> SwitchLayout {
    let mut layout = layout.clone();

    let Some(position) = shift.position(width) else {
        return layout;
    };
    let Some(anchor) = layout.anchors.get_mut(shift.index) else {
        return layout;
    };
    *anchor = position;

    for width in RightShift::ALL {
        layout.rows.remove(&ShiftTable::row_name(*width));
    }

    let mut matrix = vec![0; layout.anchors.len()];
    matrix[shift.index] = 1;
    layout
        .rows
        .insert(ShiftTable::row_name(width), RowMapping { length: 1, matrix });

    layout
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use glam::vec3;

    use super::*;

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(Catalog::default()))
    }

    #[test]
    fn merge_offsets_shared_rows() {
        let base = SwitchLayout {
            anchors: vec![vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0)],
            rows: BTreeMap::from([(
                "r1-100".to_owned(),
                RowMapping {
                    length: 2,
                    matrix: vec![2, 1],
                },
            )]),
        };
        let fragment = SwitchLayout {
            anchors: vec![vec3(2.0, 0.0, 0.0)],
            rows: BTreeMap::from([
                (
                    "r1-100".to_owned(),
                    RowMapping {
                        length: 1,
                        matrix: vec![1],
                    },
                ),
                (
                    "r1-150".to_owned(),
                    RowMapping {
                        length: 0,
                        matrix: vec![0],
                    },
                ),
            ]),
        };

        let merged = merge(&base, &fragment);

        assert_eq!(merged.anchors.len(), 3);
        assert_eq!(merged.rows["r1-100"].matrix, vec![2, 1, 3]);
        assert_eq!(merged.rows["r1-100"].length, 3);
        assert_eq!(merged.rows["r1-150"].matrix, vec![0, 0, 0]);
        assert_eq!(merged.validate(), Ok(()));
        assert_eq!(base.rows["r1-100"].matrix, vec![2, 1]);
    }

    #[test]
    fn composite_without_fragment_is_base() {
        let resolver = resolver();

        let layout = resolver
            .resolve_switch_layout(KeyboardModel::Kbo, Side::Right, VariantOption::Blocker2)
            .expect("layout should resolve");

        assert_eq!(layout.anchors.len(), 43);
    }

    #[test]
    fn unsupported_option_falls_back_to_default() {
        let resolver = resolver();

        let layout = resolver
            .resolve_switch_layout(KeyboardModel::Quefrency, Side::Left, VariantOption::Blocker1)
            .expect("layout should resolve");
        let effective = resolver
            .effective_option(KeyboardModel::Quefrency, Side::Right, VariantOption::Macro)
            .expect("model should exist");

        assert_eq!(layout.anchors.len(), 39);
        assert_eq!(effective, VariantOption::SixtyFive);
    }

    #[test]
    fn plate_keys_follow_catalog_table() {
        let resolver = resolver();
        let key = |model, side, category, option| {
            resolver
                .plate_key(model, side, category, option)
                .expect("plate key should exist")
        };

        assert_eq!(
            key(KeyboardModel::Quefrency, Side::Right, OptionCategory::Macro, VariantOption::SixtyFive),
            "macro"
        );
        assert_eq!(
            key(KeyboardModel::Quefrency, Side::Right, OptionCategory::Macro, VariantOption::Sixty),
            "no-macro"
        );
        assert_eq!(
            key(KeyboardModel::Kbo, Side::Left, OptionCategory::Blocker, VariantOption::Blocker1),
            BASE_PLATE
        );
        assert!(resolver
            .resolve_plate_outline(
                KeyboardModel::Sinc,
                Side::Right,
                OptionCategory::Macro,
                VariantOption::SixtyFiveBlocked
            )
            .is_ok());
    }

    #[test]
    fn asset_names_follow_suffix_rules() {
        let names = |side, category, option| {
            asset_names(KeyboardModel::Quefrency, side, category, option, CaseType::One)
        };

        assert_eq!(
            names(Side::Left, OptionCategory::Macro, VariantOption::Macro),
            AssetNames {
                case: "models/type1/t1-q-left-macro.glb".to_owned(),
                plate: "models/plates/q-left-macro.glb".to_owned(),
            }
        );
        assert_eq!(
            names(Side::Left, OptionCategory::Macro, VariantOption::NoMacro).case,
            "models/type1/t1-q-left.glb"
        );
        assert_eq!(
            names(Side::Right, OptionCategory::Macro, VariantOption::Sixty),
            AssetNames {
                case: "models/type1/t1-q-right-60.glb".to_owned(),
                plate: "models/plates/q-right.glb".to_owned(),
            }
        );
        assert_eq!(
            names(Side::Right, OptionCategory::Macro, VariantOption::SixtyFiveBlocked).plate,
            "models/plates/q-right-65.glb"
        );
        assert_eq!(
            asset_names(
                KeyboardModel::Kbo,
                Side::Right,
                OptionCategory::Blocker,
                VariantOption::Blocker1,
                CaseType::Gx
            )
            .case,
            "models/typegx/tgx-k-right.glb"
        );
    }

    #[test]
    fn right_shift_replaces_shift_row() {
        let resolver = resolver();
        let layout = resolver
            .resolve_switch_layout(KeyboardModel::Kbo, Side::Right, VariantOption::NoBlocker)
            .expect("layout should resolve");
        let entry = resolver
            .entry(KeyboardModel::Kbo, Side::Right)
            .expect("entry should exist");
        let shift = entry.shift.as_ref().expect("kbo should have a shift table");

        let shifted = with_right_shift(&layout, shift, RightShift::U1_75);

        assert_eq!(shifted.anchors.len(), layout.anchors.len());
        assert_eq!(shifted.anchors[42], shift.positions[&RightShift::U1_75]);
        assert!(!shifted.rows.contains_key("r4-275"));
        assert_eq!(shifted.rows["r4-175"].length, 1);
        assert_eq!(shifted.rows["r4-175"].slot(42), Some(0));
        assert_eq!(shifted.validate(), Ok(()));
    }

    #[test]
    fn mounting_of_blocker_sides_uses_base() {
        let resolver = resolver();

        let mounting = resolver
            .resolve_mounting(
                KeyboardModel::Kbo,
                Side::Left,
                OptionCategory::Blocker,
                VariantOption::Blocker1,
                MountingAngle::Six,
            )
            .expect("mounting should resolve");

        assert!((mounting.angle - 6.0).abs() < f32::EPSILON);
        assert_eq!(mounting.positions.len(), 4);
    }
}
