use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// The world-space center of one switch or connector instance.
pub type Anchor = Vec3;

/// The mapping of the anchors of a layout to the instance slots of one keycap row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowMapping {
    /// The number of instances in the row.
    pub length: usize,
    /// One entry per anchor, a 1-based slot index or 0 if the anchor is not part of the row.
    pub matrix: Vec<u32>,
}

impl RowMapping {
    /// Returns the 0-based slot of the anchor with the given index, if it belongs to the row.
    #[must_use]
    pub fn slot(&self, anchor_index: usize) -> Option<usize> {
        match self.matrix.get(anchor_index) {
            Some(&slot) if slot > 0 => Some(slot as usize - 1),
            _ => None,
        }
    }

    /// Returns the anchor indices paired with their 0-based slots.
    pub fn slots(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.matrix
            .iter()
            .enumerate()
            .filter(|(_, &slot)| slot > 0)
            .map(|(index, &slot)| (index, slot as usize - 1))
    }
}

/// The switch layout of one keyboard side in one variant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchLayout {
    /// The switch anchors.
    pub anchors: Vec<Anchor>,
    /// The keycap rows by name.
    #[serde(default)]
    pub rows: BTreeMap<String, RowMapping>,
}

impl SwitchLayout {
    /// Checks that every row maps its anchors bijectively onto its instance slots.
    ///
    /// # Errors
    ///
    /// Returns the first [`LayoutError`] found.
    pub fn validate(&self) -> Result<(), LayoutError> {
        for (name, row) in &self.rows {
            if row.matrix.len() != self.anchors.len() {
                return Err(LayoutError::MatrixLength {
                    row: name.clone(),
                    expected: self.anchors.len(),
                    actual: row.matrix.len(),
                });
            }

            let mut used = vec![false; row.length];
            for &slot in row.matrix.iter().filter(|&&slot| slot > 0) {
                let index = slot as usize - 1;
                match used.get_mut(index) {
                    None => {
                        return Err(LayoutError::SlotOutOfRange {
                            row: name.clone(),
                            slot,
                            length: row.length,
                        })
                    }
                    Some(true) => {
                        return Err(LayoutError::DuplicateSlot {
                            row: name.clone(),
                            slot,
                        })
                    }
                    Some(used) => *used = true,
                }
            }

            if let Some(index) = used.iter().position(|used| !used) {
                return Err(LayoutError::MissingSlot {
                    row: name.clone(),
                    slot: index + 1,
                });
            }
        }

        Ok(())
    }

    /// Returns the rows the anchor with the given index belongs to, with its 0-based slot.
    pub fn rows_at(&self, anchor_index: usize) -> impl Iterator<Item = (&str, usize)> {
        self.rows
            .iter()
            .filter_map(move |(name, row)| row.slot(anchor_index).map(|slot| (name.as_str(), slot)))
    }
}

/// A 2D outline extruded into the plate mesh.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlateOutline {
    /// The outline points in order.
    pub points: Vec<Vec2>,
}

/// The error type for switch layouts violating the row mapping invariant.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// A row matrix does not have one entry per anchor.
    #[error("row `{row}` has a matrix of length {actual}, expected {expected}")]
    MatrixLength {
        /// The row name.
        row: String,
        /// The number of anchors.
        expected: usize,
        /// The length of the matrix.
        actual: usize,
    },
    /// A row matrix references a slot beyond the row length.
    #[error("row `{row}` uses slot {slot} outside of 1..={length}")]
    SlotOutOfRange {
        /// The row name.
        row: String,
        /// The offending slot.
        slot: u32,
        /// The row length.
        length: usize,
    },
    /// A slot is used by more than one anchor.
    #[error("row `{row}` uses slot {slot} more than once")]
    DuplicateSlot {
        /// The row name.
        row: String,
        /// The offending slot.
        slot: u32,
    },
    /// A slot is not used by any anchor.
    #[error("row `{row}` leaves slot {slot} unused")]
    MissingSlot {
        /// The row name.
        row: String,
        /// The unused slot.
        slot: usize,
    },
}
