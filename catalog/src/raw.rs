use std::{collections::BTreeMap, str::FromStr};

use serde::Deserialize;

use crate::{
    Anchor, Catalog, Error, KeyboardEntry, KeyboardModel, LayoutStorage, MountingAngle,
    OptionCategory, PlateOutline, RightShift, ShiftTable, SideEntry, SwitchLayout,
    VariantOption, BASE_PLATE,
};

/// The catalog as written in TOML, keyed by plain strings.
#[derive(Deserialize)]
#[serde(transparent)]
pub(crate) struct RawCatalog(BTreeMap<String, RawKeyboard>);

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKeyboard {
    left: RawSide,
    right: RawSide,
}

#[derive(Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Storage {
    Enumerated,
    Composite,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSide {
    category: OptionCategory,
    storage: Storage,
    options: Vec<VariantOption>,
    default: VariantOption,
    usb: Vec<Anchor>,
    #[serde(default)]
    plate_keys: BTreeMap<String, String>,
    plates: BTreeMap<String, PlateOutline>,
    #[serde(default)]
    mounting_angles: BTreeMap<String, BTreeMap<String, f32>>,
    #[serde(default)]
    mounting_positions: BTreeMap<String, Vec<Anchor>>,
    layouts: BTreeMap<String, SwitchLayout>,
    #[serde(default)]
    fragments: BTreeMap<String, SwitchLayout>,
    shift: Option<RawShift>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawShift {
    index: usize,
    positions: BTreeMap<String, Anchor>,
}

impl TryFrom<RawCatalog> for Catalog {
    type Error = Error;

    fn try_from(raw: RawCatalog) -> Result<Self, Self::Error> {
        let keyboards = raw
            .0
            .into_iter()
            .map(|(name, keyboard)| -> Result<_, Error> {
                let model: KeyboardModel = name.parse()?;
                let left = keyboard.left.into_entry(&format!("{model}.left"))?;
                let right = keyboard.right.into_entry(&format!("{model}.right"))?;

                Ok((model, KeyboardEntry { left, right }))
            })
            .collect::<Result<_, Error>>()?;

        Ok(Self { keyboards })
    }
}

impl RawSide {
    fn into_entry(self, location: &str) -> Result<SideEntry, Error> {
        let invalid = |reason: String| Error::InvalidEntry {
            location: location.to_owned(),
            reason,
        };

        if !self.options.contains(&self.default) {
            return Err(invalid(format!(
                "default option `{}` is not selectable",
                self.default
            )));
        }

        let usb_count = self.usb.len();
        let usb: [Anchor; 2] = self
            .usb
            .try_into()
            .map_err(|_| invalid(format!("expected 2 USB anchors, found {usb_count}")))?;

        for (key, plate) in &self.plates {
            if plate.points.len() < 3 {
                return Err(invalid(format!(
                    "plate `{key}` has {} points, expected at least 3",
                    plate.points.len()
                )));
            }
        }

        let mut layouts = validate_layouts(self.layouts, &format!("{location}.layouts"))?;
        let fragments = validate_layouts(self.fragments, &format!("{location}.fragments"))?;

        let storage = match self.storage {
            Storage::Enumerated => {
                if !fragments.is_empty() {
                    return Err(invalid("enumerated storage cannot have fragments".to_owned()));
                }
                if let Some(option) = self.options.iter().find(|option| !layouts.contains_key(*option))
                {
                    return Err(invalid(format!("option `{option}` has no layout")));
                }
                LayoutStorage::Enumerated(layouts)
            }
            Storage::Composite => {
                let base = layouts
                    .remove(&VariantOption::Base)
                    .ok_or_else(|| invalid("composite storage needs a `base` layout".to_owned()))?;
                if let Some(option) = layouts.keys().next() {
                    return Err(invalid(format!(
                        "composite storage cannot have layout `{option}`"
                    )));
                }
                LayoutStorage::Composite { base, fragments }
            }
        };

        let plate_keys: BTreeMap<VariantOption, String> = parse_keys(self.plate_keys)?;
        match self.category {
            OptionCategory::Macro => {
                for option in &self.options {
                    let key = plate_keys
                        .get(option)
                        .ok_or_else(|| invalid(format!("option `{option}` has no plate key")))?;
                    if !self.plates.contains_key(key) {
                        return Err(invalid(format!("plate `{key}` of `{option}` is missing")));
                    }
                }
            }
            OptionCategory::Blocker => {
                if !self.plates.contains_key(BASE_PLATE) {
                    return Err(invalid(format!("blocker sides need a `{BASE_PLATE}` plate")));
                }
            }
        }

        let mounting_angles = parse_keys::<VariantOption, _>(self.mounting_angles)?
            .into_iter()
            .map(|(key, angles)| -> Result<_, Error> {
                Ok((key, parse_keys::<MountingAngle, f32>(angles)?))
            })
            .collect::<Result<_, Error>>()?;
        let mounting_positions = parse_keys(self.mounting_positions)?;

        let shift = self
            .shift
            .map(|shift| shift.into_table(&storage, location))
            .transpose()?;

        Ok(SideEntry {
            category: self.category,
            options: self.options,
            default: self.default,
            storage,
            usb,
            plate_keys,
            plates: self.plates,
            mounting_angles,
            mounting_positions,
            shift,
        })
    }
}

impl RawShift {
    fn into_table(self, storage: &LayoutStorage, location: &str) -> Result<ShiftTable, Error> {
        let invalid = |reason: String| Error::InvalidEntry {
            location: format!("{location}.shift"),
            reason,
        };

        let positions: BTreeMap<RightShift, Anchor> = parse_keys(self.positions)?;
        if let Some(width) = RightShift::ALL.iter().find(|width| !positions.contains_key(*width)) {
            return Err(invalid(format!("no position for width `{width}`")));
        }

        if let LayoutStorage::Composite { base, .. } = storage {
            if self.index >= base.anchors.len() {
                return Err(invalid(format!(
                    "index {} is out of range for {} anchors",
                    self.index,
                    base.anchors.len()
                )));
            }

            for width in RightShift::ALL {
                let name = ShiftTable::row_name(*width);
                let Some(row) = base.rows.get(&name) else {
                    continue;
                };
                if row.length != 1 || row.slot(self.index) != Some(0) {
                    return Err(invalid(format!(
                        "row `{name}` must be the single instance at index {}",
                        self.index
                    )));
                }
            }
        }

        Ok(ShiftTable {
            index: self.index,
            positions,
        })
    }
}

fn validate_layouts(
    layouts: BTreeMap<String, SwitchLayout>,
    location: &str,
) -> Result<BTreeMap<VariantOption, SwitchLayout>, Error> {
    for (name, layout) in &layouts {
        layout.validate().map_err(|source| Error::InvalidLayout {
            location: format!("{location}.{name}"),
            source,
        })?;
    }

    parse_keys(layouts)
}

fn parse_keys<K, V>(map: BTreeMap<String, V>) -> Result<BTreeMap<K, V>, Error>
where
    K: FromStr<Err = config::Error> + Ord,
{
    map.into_iter()
        .map(|(key, value)| -> Result<(K, V), Error> { Ok((key.parse()?, value)) })
        .collect()
}
