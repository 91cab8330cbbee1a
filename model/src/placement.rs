use std::collections::{BTreeMap, BTreeSet, HashMap};

use catalog::{Anchor, SwitchLayout};
use glam::Mat4;
use log::trace;

use crate::{mesh::MeshData, Error};

/// The name of the switch instance buffer.
pub const SWITCHES: &str = "switches";

/// The mesh templates shared by both sides.
#[derive(Clone, Debug, Default)]
pub struct Templates {
    /// The switch mesh.
    pub switch: Option<MeshData>,
    /// The USB connector mesh.
    pub usb: Option<MeshData>,
    /// The mounting hardware mesh.
    pub mounting: Option<MeshData>,
    /// The keycap mesh of every row.
    pub keycaps: HashMap<String, MeshData>,
}

impl Templates {
    /// Returns the template mesh with the given name.
    ///
    /// Rows are looked up in the keycaps, every other name in the fixed templates.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MeshData> {
        match name {
            SWITCHES => self.switch.as_ref(),
            "usb" => self.usb.as_ref(),
            "mounting" => self.mounting.as_ref(),
            row => self.keycaps.get(row),
        }
    }

    /// Returns true if the keycap template of a row is available.
    #[must_use]
    pub fn has_keycap(&self, row: &str) -> bool {
        self.keycaps.contains_key(row)
    }
}

/// A CPU-side buffer of instance transformations committed to one GPU instanced mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceBuffer {
    name: String,
    template: String,
    slots: Vec<Option<Mat4>>,
    writes: Vec<u32>,
    generation: u64,
    version: u64,
}

impl InstanceBuffer {
    fn new(name: &str, template: &str, capacity: usize, generation: u64) -> Self {
        Self {
            name: name.to_owned(),
            template: template.to_owned(),
            slots: vec![None; capacity],
            writes: vec![0; capacity],
            generation,
            version: 0,
        }
    }

    /// Returns the name of the buffer.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the template mesh drawn by the buffer.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns the number of instances.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the generation, which changes whenever the buffer is reallocated.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the version, which changes once per placement pass touching the buffer.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the transformation at a slot, if it was written.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<Mat4> {
        self.slots.get(index).copied().flatten()
    }

    /// Returns the transformations of all instances.
    #[must_use]
    pub fn transforms(&self) -> Vec<Mat4> {
        self.slots
            .iter()
            .map(|slot| slot.unwrap_or(Mat4::IDENTITY))
            .collect()
    }

    fn begin_pass(&mut self) {
        self.writes.fill(0);
    }

    fn write(&mut self, index: usize, transform: Mat4) -> Result<(), Error> {
        let (Some(slot), Some(writes)) = (self.slots.get_mut(index), self.writes.get_mut(index))
        else {
            return Err(Error::SlotOutOfRange {
                buffer: self.name.clone(),
                slot: index,
                capacity: self.slots.len(),
            });
        };

        *slot = Some(transform);
        *writes += 1;

        Ok(())
    }

    /// Checks that no slot was written twice in this pass and, for full passes, that every
    /// slot was written. Marks the buffer dirty if it was touched.
    fn commit(&mut self, full: bool) -> Result<bool, Error> {
        let incomplete = self.writes.iter().position(|&writes| {
            writes > 1 || (full && writes == 0)
        });
        let unwritten = self.slots.iter().position(Option::is_none);

        if let Some(slot) = incomplete.or(unwritten) {
            return Err(Error::IncompletePlacement {
                buffer: self.name.clone(),
                slot,
            });
        }

        let touched = self.writes.iter().any(|&writes| writes > 0);
        if touched {
            self.version += 1;
        }

        Ok(touched)
    }
}

/// The changes of one placement pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlacementReport {
    /// The buffers which were allocated or reallocated.
    pub allocated: Vec<String>,
    /// The buffers which were disposed.
    pub disposed: Vec<String>,
    /// The buffers which were marked dirty.
    pub committed: Vec<String>,
    /// The rows waiting for their keycap template.
    pub pending: Vec<String>,
}

impl PlacementReport {
    /// Appends the changes of a later pass.
    pub fn extend(&mut self, other: PlacementReport) {
        self.allocated.extend(other.allocated);
        self.disposed.extend(other.disposed);
        self.committed.extend(other.committed);
        self.pending = other.pending;
    }
}

/// The instance buffers of one side: switches, one buffer per keycap row and fixtures.
#[derive(Clone, Debug, Default)]
pub struct Placement {
    switches: Option<InstanceBuffer>,
    rows: BTreeMap<String, InstanceBuffer>,
    fixtures: BTreeMap<String, InstanceBuffer>,
    pending: BTreeSet<String>,
    next_generation: u64,
}

impl Placement {
    /// Returns the switch buffer, if placed.
    #[must_use]
    pub fn switches(&self) -> Option<&InstanceBuffer> {
        self.switches.as_ref()
    }

    /// Returns the buffer of a keycap row.
    #[must_use]
    pub fn row(&self, name: &str) -> Option<&InstanceBuffer> {
        self.rows.get(name)
    }

    /// Returns the buffers of all placed keycap rows.
    pub fn rows(&self) -> impl Iterator<Item = &InstanceBuffer> {
        self.rows.values()
    }

    /// Returns the buffer of a fixture.
    #[must_use]
    pub fn fixture(&self, name: &str) -> Option<&InstanceBuffer> {
        self.fixtures.get(name)
    }

    /// Returns every buffer.
    pub fn buffers(&self) -> impl Iterator<Item = &InstanceBuffer> {
        self.switches
            .iter()
            .chain(self.rows.values())
            .chain(self.fixtures.values())
    }

    /// Returns the rows waiting for their keycap template.
    pub fn pending_rows(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Places every anchor of the layout in the switch buffer and in its keycap row buffers.
    ///
    /// Buffers are only reallocated if their capacity changes. Rows without a keycap template
    /// are left pending until [`Placement::provide_templates`] is called.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the layout does not map every row slot exactly once.
    pub fn place(
        &mut self,
        layout: &SwitchLayout,
        templates: &Templates,
    ) -> Result<PlacementReport, Error> {
        layout.validate()?;

        let mut report = PlacementReport::default();
        let transforms: Vec<_> = layout.anchors.iter().copied().map(anchor_transform).collect();

        let previous = self.switches.take();
        let mut switches =
            self.take_buffer(previous, SWITCHES, SWITCHES, transforms.len(), &mut report);
        switches.begin_pass();
        for (index, &transform) in transforms.iter().enumerate() {
            switches.write(index, transform)?;
        }
        if switches.commit(true)? {
            report.committed.push(SWITCHES.to_owned());
        }
        self.switches = Some(switches);

        self.dispose_stale_rows(layout, &mut report);
        self.pending.clear();

        for (name, row) in &layout.rows {
            if !templates.has_keycap(name) {
                if let Some(buffer) = self.rows.remove(name) {
                    report.disposed.push(buffer.name);
                }
                self.pending.insert(name.clone());
                continue;
            }

            let previous = self.rows.remove(name);
            let mut buffer = self.take_buffer(previous, name, name, row.length, &mut report);
            buffer.begin_pass();
            for (index, slot) in row.slots() {
                buffer.write(slot, transforms[index])?;
            }
            if buffer.commit(true)? {
                report.committed.push(name.clone());
            }
            self.rows.insert(name.clone(), buffer);
        }

        report.pending = self.pending.iter().cloned().collect();
        trace!(
            "Placed {} switches in {} rows, {} rows pending",
            transforms.len(),
            self.rows.len(),
            self.pending.len()
        );

        Ok(report)
    }

    /// Updates the transformation of a single anchor without reallocating the switch buffer.
    ///
    /// Rows which are new in the layout are placed completely, rows which no longer exist are
    /// disposed and only the affected slot of every other row is rewritten. Falls back to a
    /// full placement if the anchor count changed.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the index is out of range or the layout is inconsistent.
    pub fn update_anchor(
        &mut self,
        layout: &SwitchLayout,
        index: usize,
        templates: &Templates,
    ) -> Result<PlacementReport, Error> {
        layout.validate()?;

        let Some(&anchor) = layout.anchors.get(index) else {
            return Err(Error::AnchorOutOfRange {
                index,
                count: layout.anchors.len(),
            });
        };

        let mut switches = match self.switches.take() {
            Some(switches) if switches.capacity() == layout.anchors.len() => switches,
            previous => {
                self.switches = previous;
                return self.place(layout, templates);
            }
        };

        let mut report = PlacementReport::default();
        let transform = anchor_transform(anchor);

        switches.begin_pass();
        switches.write(index, transform)?;
        if switches.commit(false)? {
            report.committed.push(SWITCHES.to_owned());
        }
        self.switches = Some(switches);

        self.dispose_stale_rows(layout, &mut report);

        for (name, row) in &layout.rows {
            if let Some(buffer) = self.rows.get_mut(name) {
                if buffer.capacity() == row.length {
                    if let Some(slot) = row.slot(index) {
                        buffer.begin_pass();
                        buffer.write(slot, transform)?;
                        if buffer.commit(false)? {
                            report.committed.push(name.clone());
                        }
                    }
                    continue;
                }
            }

            if templates.has_keycap(name) {
                self.pending.remove(name);
                let previous = self.rows.remove(name);
                let mut buffer = self.take_buffer(previous, name, name, row.length, &mut report);
                buffer.begin_pass();
                for (anchor_index, slot) in row.slots() {
                    buffer.write(slot, anchor_transform(layout.anchors[anchor_index]))?;
                }
                if buffer.commit(true)? {
                    report.committed.push(name.clone());
                }
                self.rows.insert(name.clone(), buffer);
            } else {
                self.pending.insert(name.clone());
            }
        }

        report.pending = self.pending.iter().cloned().collect();
        trace!("Updated anchor {index}, committed {:?}", report.committed);

        Ok(report)
    }

    /// Places the pending rows whose keycap templates became available.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the layout does not map every row slot exactly once.
    pub fn provide_templates(
        &mut self,
        layout: &SwitchLayout,
        templates: &Templates,
    ) -> Result<PlacementReport, Error> {
        layout.validate()?;

        let mut report = PlacementReport::default();
        let ready: Vec<_> = self
            .pending
            .iter()
            .filter(|name| templates.has_keycap(name))
            .cloned()
            .collect();

        for name in ready {
            self.pending.remove(&name);
            let Some(row) = layout.rows.get(&name) else {
                continue;
            };

            let mut buffer = self.take_buffer(None, &name, &name, row.length, &mut report);
            buffer.begin_pass();
            for (index, slot) in row.slots() {
                buffer.write(slot, anchor_transform(layout.anchors[index]))?;
            }
            if buffer.commit(true)? {
                report.committed.push(name.clone());
            }
            self.rows.insert(name, buffer);
        }

        report.pending = self.pending.iter().cloned().collect();

        Ok(report)
    }

    /// Places a fixture drawing the given template at every transformation.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the buffer could not be written completely.
    pub fn place_fixture(
        &mut self,
        name: &str,
        template: &str,
        transforms: &[Mat4],
    ) -> Result<PlacementReport, Error> {
        let mut report = PlacementReport::default();

        if transforms.is_empty() {
            if let Some(buffer) = self.fixtures.remove(name) {
                report.disposed.push(buffer.name);
            }
            return Ok(report);
        }

        let previous = self.fixtures.remove(name);
        let mut buffer =
            self.take_buffer(previous, name, template, transforms.len(), &mut report);
        buffer.begin_pass();
        for (index, &transform) in transforms.iter().enumerate() {
            buffer.write(index, transform)?;
        }
        if buffer.commit(true)? {
            report.committed.push(name.to_owned());
        }
        self.fixtures.insert(name.to_owned(), buffer);

        Ok(report)
    }

    /// Reuses the given buffer if its capacity matches, otherwise allocates a new one.
    fn take_buffer(
        &mut self,
        previous: Option<InstanceBuffer>,
        name: &str,
        template: &str,
        capacity: usize,
        report: &mut PlacementReport,
    ) -> InstanceBuffer {
        match previous {
            Some(buffer) if buffer.capacity() == capacity => buffer,
            previous => {
                if let Some(previous) = previous {
                    report.disposed.push(previous.name);
                }
                report.allocated.push(name.to_owned());
                self.next_generation += 1;

                InstanceBuffer::new(name, template, capacity, self.next_generation)
            }
        }
    }

    fn dispose_stale_rows(&mut self, layout: &SwitchLayout, report: &mut PlacementReport) {
        let stale: Vec<_> = self
            .rows
            .keys()
            .filter(|name| !layout.rows.contains_key(*name))
            .cloned()
            .collect();

        for name in stale {
            self.rows.remove(&name);
            report.disposed.push(name);
        }
        self.pending.retain(|name| layout.rows.contains_key(name));
    }
}

/// Returns the transformation of an instance at the given anchor.
#[must_use]
pub fn anchor_transform(anchor: Anchor) -> Mat4 {
    Mat4::from_translation(anchor)
}
