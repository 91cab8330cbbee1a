use std::{collections::BTreeMap, sync::Arc};

use catalog::{
    BottomCase, CaseType, Catalog, KeyboardModel, MountingAngle, OptionCategory, RightShift,
    Side, SwitchLayout, VariantOption,
};
use config::SideSelection;
use glam::Mat4;
use log::{debug, warn};

use crate::{
    asset::{AssetNode, CaseShell, ShellState, VisibilityEvent},
    mesh::{Bounds, MeshData},
    placement::{anchor_transform, Placement, PlacementReport, Templates},
    plate::plate_mesh,
    resolve::{with_right_shift, AssetNames, Mounting, Resolver},
    Error,
};

/// The fixture drawing the USB connectors.
const USB_FIXTURE: &str = "usb";
/// The fixture drawing the mounting hardware.
const MOUNTING_FIXTURE: &str = "mounting";

/// A ticket identifying a load request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    /// Returns the ticket following `previous`.
    pub(crate) fn next(previous: &mut u64) -> Self {
        *previous += 1;
        Self(*previous)
    }
}

/// The kind of a requested asset.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    /// The case shell of one side.
    Case,
    /// The plate and PCB of one side.
    Plate,
    /// The shared switch template.
    Switch,
    /// The shared keycap templates.
    Keycaps,
    /// The shared USB connector template.
    Usb,
    /// The shared mounting hardware template.
    Mounting,
}

/// A request to load an asset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LoadRequest {
    /// The side the asset belongs to, none for shared templates.
    pub side: Option<Side>,
    /// The kind of the asset.
    pub kind: AssetKind,
    /// The path of the asset relative to the asset root.
    pub path: String,
    /// The ticket identifying the request.
    pub ticket: Ticket,
}

/// The error reported by the asset loader for a failed request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("failed to load `{path}`: {reason}")]
pub struct LoadError {
    /// The path of the asset.
    pub path: String,
    /// The reason of the failure.
    pub reason: String,
}

/// The loading state of an assembly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssemblyState {
    /// No case has been loaded yet.
    Unloaded,
    /// A case is loaded but the switches have not been placed yet.
    CaseLoaded,
    /// The case is loaded and the switches are placed.
    Placed,
}

/// The plate of one side.
#[derive(Clone, Debug, PartialEq)]
pub struct PlateMesh {
    /// The plate extruded from the catalog outline.
    pub outline: MeshData,
    /// The loaded plate asset, if available.
    pub asset: Option<AssetNode>,
}

impl PlateMesh {
    /// Returns the plate mesh of the asset or the extruded outline.
    #[must_use]
    pub fn plate(&self) -> &MeshData {
        self.asset
            .as_ref()
            .and_then(|asset| asset.find_mesh("plate"))
            .unwrap_or(&self.outline)
    }

    /// Returns the PCB mesh of the asset, if available.
    #[must_use]
    pub fn pcb(&self) -> Option<&MeshData> {
        self.asset.as_ref().and_then(|asset| asset.find_mesh("pcb"))
    }
}

/// The visibility mutations fired by a command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisibilityChange {
    /// The fired events, empty for a no-op.
    pub events: Vec<VisibilityEvent>,
}

impl VisibilityChange {
    /// Returns true if no visibility was changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// The result of changing the variant of a side.
#[derive(Clone, Debug, PartialEq)]
pub enum VariantChange {
    /// The selection did not change.
    Unchanged,
    /// The case and plate stay, only the switch population and visibility changed.
    Population {
        /// The placement pass, if the side was placed.
        placement: Option<PlacementReport>,
        /// The visibility mutations.
        visibility: VisibilityChange,
    },
    /// New case and plate assets have to be loaded.
    Structural(Vec<LoadRequest>),
}

/// The outcome of completing a load request.
#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    /// The result was applied, possibly followed by a placement pass.
    Applied(Option<PlacementReport>),
    /// The load failed and the previous state was kept.
    Failed(LoadError),
    /// The request was superseded by a newer one and its result was dropped.
    Stale,
}

/// The full sub-assembly of one keyboard side.
#[derive(Clone, Debug)]
pub struct Assembly {
    resolver: Resolver,
    model: KeyboardModel,
    side: Side,
    case_type: CaseType,
    category: OptionCategory,
    selected: VariantOption,
    applied: VariantOption,
    requested_assets: AssetNames,
    shell_state: ShellState,
    mounting_angle: MountingAngle,
    mounting: Mounting,
    layout: SwitchLayout,
    case: Option<CaseShell>,
    plate: PlateMesh,
    staged_plate: Option<AssetNode>,
    placement: Placement,
    revision: u64,
    last_ticket: u64,
    pending: BTreeMap<AssetKind, Ticket>,
}

impl Assembly {
    /// Creates the assembly of one side with the given initial selection.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the catalog does not contain the geometry of the selection.
    pub fn new(
        catalog: Arc<Catalog>,
        model: KeyboardModel,
        side: Side,
        case_type: CaseType,
        initial: SideSelection,
    ) -> Result<Self, Error> {
        let resolver = Resolver::new(catalog);
        let category = resolver.entry(model, side)?.category;
        if initial.category != category {
            warn!(
                "Initial category `{}` does not match {model} {side}, using `{category}`",
                initial.category
            );
        }

        let selected = resolver.effective_option(model, side, initial.option)?;
        let shell_state = ShellState {
            bottom_case: BottomCase::default(),
            blocker: ShellState::blocker_group(category, selected),
            right_shift: RightShift::default(),
        };
        let mounting_angle = MountingAngle::default();

        let requested_assets = resolver.resolve_asset_names(model, side, selected, case_type)?;
        let layout =
            resolver.resolve_shifted_layout(model, side, selected, shell_state.right_shift)?;
        let mounting =
            resolver.resolve_mounting(model, side, category, selected, mounting_angle)?;
        let outline = plate_mesh(resolver.resolve_plate_outline(model, side, category, selected)?)?;

        Ok(Self {
            resolver,
            model,
            side,
            case_type,
            category,
            selected,
            applied: selected,
            requested_assets,
            shell_state,
            mounting_angle,
            mounting,
            layout,
            case: None,
            plate: PlateMesh {
                outline,
                asset: None,
            },
            staged_plate: None,
            placement: Placement::default(),
            revision: 0,
            last_ticket: 0,
            pending: BTreeMap::new(),
        })
    }

    /// Returns the load requests of the initial case and plate.
    pub fn start(&mut self) -> Vec<LoadRequest> {
        let AssetNames { case, plate } = self.requested_assets.clone();

        vec![
            self.request(AssetKind::Case, case),
            self.request(AssetKind::Plate, plate),
        ]
    }

    /// Changes the selected variant.
    ///
    /// Structural changes return the load requests of the new assets and are applied once
    /// the case arrives. Population changes are applied immediately. A side without a case
    /// and without a case load in flight requests its assets again, even for the same option.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the new layout cannot be resolved or placed.
    pub fn set_variant(
        &mut self,
        option: VariantOption,
        templates: &Templates,
    ) -> Result<VariantChange, Error> {
        let option = self
            .resolver
            .effective_option(self.model, self.side, option)?;
        let has_case = self.case.is_some() || self.is_loading(AssetKind::Case);
        if option == self.selected && has_case {
            return Ok(VariantChange::Unchanged);
        }

        let names =
            self.resolver
                .resolve_asset_names(self.model, self.side, option, self.case_type)?;
        self.selected = option;

        if !has_case {
            self.requested_assets = names;
            return Ok(VariantChange::Structural(self.start()));
        }

        if names != self.requested_assets {
            let mut requests = Vec::new();
            if names.case != self.requested_assets.case {
                requests.push(self.request(AssetKind::Case, names.case.clone()));
            }
            if names.plate != self.requested_assets.plate {
                requests.push(self.request(AssetKind::Plate, names.plate.clone()));
            }
            self.requested_assets = names;

            return Ok(VariantChange::Structural(requests));
        }

        if self.pending.contains_key(&AssetKind::Case) {
            return Ok(VariantChange::Population {
                placement: None,
                visibility: VisibilityChange::default(),
            });
        }

        self.apply_selection()?;
        let visibility = self.apply_shell();
        let placement = self.place(templates)?;

        Ok(VariantChange::Population {
            placement,
            visibility,
        })
    }

    /// Switches between the standard and vented bottom case.
    pub fn set_bottom_case(&mut self, bottom_case: BottomCase) -> VisibilityChange {
        if self.shell_state.bottom_case == bottom_case {
            return VisibilityChange::default();
        }

        self.shell_state.bottom_case = bottom_case;
        self.apply_shell()
    }

    /// Shows the blocker group of the given option and hides the previous one.
    pub fn set_blocker_visibility(&mut self, option: VariantOption) -> VisibilityChange {
        let blocker = ShellState::blocker_group(self.category, option);
        if self.shell_state.blocker == blocker {
            return VisibilityChange::default();
        }

        self.shell_state.blocker = blocker;
        self.apply_shell()
    }

    /// Changes the width of the right shift key.
    ///
    /// Moves the shift switch without reallocating the switch buffer and toggles the `175`
    /// case group.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the placement of the moved switch fails.
    pub fn set_right_shift(
        &mut self,
        width: RightShift,
        templates: &Templates,
    ) -> Result<VariantChange, Error> {
        if self.shell_state.right_shift == width {
            return Ok(VariantChange::Unchanged);
        }

        self.shell_state.right_shift = width;
        let visibility = self.apply_shell();

        let mut placement = None;
        let shift = self.resolver.entry(self.model, self.side)?.shift.clone();
        if let Some(shift) = shift.filter(|shift| shift.index < self.layout.anchors.len()) {
            self.layout = with_right_shift(&self.layout, &shift, width);

            if self.state() == AssemblyState::Placed {
                placement = Some(
                    self.placement
                        .update_anchor(&self.layout, shift.index, templates)?,
                );
            }
        }

        Ok(VariantChange::Population {
            placement,
            visibility,
        })
    }

    /// Changes the mounting angle preset.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the mounting hardware cannot be placed.
    pub fn set_mounting_angle(
        &mut self,
        angle: MountingAngle,
    ) -> Result<Option<PlacementReport>, Error> {
        if self.mounting_angle == angle {
            return Ok(None);
        }

        self.mounting_angle = angle;
        self.mounting = self.resolver.resolve_mounting(
            self.model,
            self.side,
            self.category,
            self.applied,
            angle,
        )?;

        if self.state() == AssemblyState::Placed {
            self.place_fixtures().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Applies the result of a load request.
    ///
    /// Only the latest request of every kind is applied, older results are dropped.
    /// Failed case loads keep the previous case and revert the selection to it.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the geometry of the loaded selection cannot be resolved or
    /// placed.
    pub fn complete(
        &mut self,
        request: &LoadRequest,
        result: Result<AssetNode, LoadError>,
        templates: &Templates,
    ) -> Result<Completion, Error> {
        if self.pending.get(&request.kind) != Some(&request.ticket) {
            debug!(
                "Dropping stale {:?} result `{}` for {} side",
                request.kind, request.path, self.side
            );
            return Ok(Completion::Stale);
        }
        self.pending.remove(&request.kind);

        match (request.kind, result) {
            (AssetKind::Case, Ok(asset)) => {
                self.apply_selection()?;
                self.case = Some(CaseShell::new(self.side, asset, &self.shell_state));

                if let Some(plate) = self.staged_plate.take() {
                    self.plate.asset = Some(plate);
                }
                self.revision += 1;

                self.place(templates).map(Completion::Applied)
            }
            (AssetKind::Plate, Ok(asset)) => {
                if self.pending.contains_key(&AssetKind::Case) {
                    self.staged_plate = Some(asset);
                } else {
                    self.plate.asset = Some(asset);
                    self.revision += 1;
                }

                Ok(Completion::Applied(None))
            }
            (AssetKind::Case, Err(error)) => {
                warn!("{error}, keeping the {} side unchanged", self.side);

                self.selected = self.applied;
                self.requested_assets = self.resolver.resolve_asset_names(
                    self.model,
                    self.side,
                    self.applied,
                    self.case_type,
                )?;
                self.pending.remove(&AssetKind::Plate);
                self.staged_plate = None;

                Ok(Completion::Failed(error))
            }
            (AssetKind::Plate, Err(error)) => {
                warn!("{error}, using the plate outline");
                self.staged_plate = None;

                Ok(Completion::Failed(error))
            }
            (kind, _) => {
                debug!("Ignoring {kind:?} result for the {} side", self.side);
                Ok(Completion::Stale)
            }
        }
    }

    /// Places pending switches and rows after new templates became available.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the placement fails.
    pub fn provide_templates(
        &mut self,
        templates: &Templates,
    ) -> Result<Option<PlacementReport>, Error> {
        match self.state() {
            AssemblyState::Unloaded => Ok(None),
            AssemblyState::CaseLoaded => self.place(templates),
            AssemblyState::Placed => self
                .placement
                .provide_templates(&self.layout, templates)
                .map(Some),
        }
    }

    /// Returns the loading state.
    #[must_use]
    pub fn state(&self) -> AssemblyState {
        match (&self.case, self.placement.switches()) {
            (None, _) => AssemblyState::Unloaded,
            (Some(_), None) => AssemblyState::CaseLoaded,
            (Some(_), Some(_)) => AssemblyState::Placed,
        }
    }

    /// Returns the keyboard model.
    #[must_use]
    pub fn model(&self) -> KeyboardModel {
        self.model
    }

    /// Returns the side.
    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Returns the option category of the side.
    #[must_use]
    pub fn category(&self) -> OptionCategory {
        self.category
    }

    /// Returns the latest selected option.
    #[must_use]
    pub fn selected(&self) -> VariantOption {
        self.selected
    }

    /// Returns the option currently displayed.
    #[must_use]
    pub fn applied(&self) -> VariantOption {
        self.applied
    }

    /// Returns the selected mounting angle preset.
    #[must_use]
    pub fn mounting_angle(&self) -> MountingAngle {
        self.mounting_angle
    }

    /// Returns the asset names of the latest selection.
    #[must_use]
    pub fn requested_assets(&self) -> &AssetNames {
        &self.requested_assets
    }

    /// Returns the switch layout currently displayed.
    #[must_use]
    pub fn layout(&self) -> &SwitchLayout {
        &self.layout
    }

    /// Returns the state deciding the visible case groups.
    #[must_use]
    pub fn shell_state(&self) -> &ShellState {
        &self.shell_state
    }

    /// Returns the loaded case, if any.
    #[must_use]
    pub fn case(&self) -> Option<&CaseShell> {
        self.case.as_ref()
    }

    /// Returns the plate.
    #[must_use]
    pub fn plate(&self) -> &PlateMesh {
        &self.plate
    }

    /// Returns the instance buffers.
    #[must_use]
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Returns the mounting hardware.
    #[must_use]
    pub fn mounting(&self) -> &Mounting {
        &self.mounting
    }

    /// Returns the revision, which changes whenever the case or plate changes.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns true if a load request of the given kind is in flight.
    #[must_use]
    pub fn is_loading(&self, kind: AssetKind) -> bool {
        self.pending.contains_key(&kind)
    }

    /// Returns the transformation of the whole side, tilted by the mounting angle.
    #[must_use]
    pub fn transformation(&self) -> Mat4 {
        Mat4::from_rotation_x(self.mounting.angle.to_radians())
    }

    /// Returns the bounds of the displayed switches.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.layout.anchors.iter().copied())
            .map(|bounds| bounds.transformed(self.transformation()))
    }

    fn request(&mut self, kind: AssetKind, path: String) -> LoadRequest {
        let ticket = Ticket::next(&mut self.last_ticket);
        self.pending.insert(kind, ticket);

        LoadRequest {
            side: Some(self.side),
            kind,
            path,
            ticket,
        }
    }

    /// Makes the latest selection the displayed one.
    fn apply_selection(&mut self) -> Result<(), Error> {
        let (model, side, option) = (self.model, self.side, self.selected);

        self.layout = self.resolver.resolve_shifted_layout(
            model,
            side,
            option,
            self.shell_state.right_shift,
        )?;
        self.mounting = self.resolver.resolve_mounting(
            model,
            side,
            self.category,
            option,
            self.mounting_angle,
        )?;
        self.shell_state.blocker = ShellState::blocker_group(self.category, option);

        if self.applied != option {
            let outline = self
                .resolver
                .resolve_plate_outline(model, side, self.category, option)?;
            let outline = plate_mesh(outline)?;
            if outline != self.plate.outline {
                self.plate = PlateMesh {
                    outline,
                    asset: None,
                };
            }
        }
        self.applied = option;

        Ok(())
    }

    fn apply_shell(&mut self) -> VisibilityChange {
        let events = match &mut self.case {
            Some(case) => case.apply(&self.shell_state),
            None => Vec::new(),
        };

        VisibilityChange { events }
    }

    fn place(&mut self, templates: &Templates) -> Result<Option<PlacementReport>, Error> {
        if self.case.is_none() || templates.switch.is_none() {
            return Ok(None);
        }

        let mut report = self.placement.place(&self.layout, templates)?;
        report.extend(self.place_fixtures()?);

        Ok(Some(report))
    }

    fn place_fixtures(&mut self) -> Result<PlacementReport, Error> {
        let usb: Vec<_> = self
            .resolver
            .catalog()
            .usb_anchors(self.model, self.side)?
            .into_iter()
            .map(anchor_transform)
            .collect();
        let mounting: Vec<_> = self
            .mounting
            .positions
            .iter()
            .copied()
            .map(anchor_transform)
            .collect();

        let mut report = self.placement.place_fixture(USB_FIXTURE, USB_FIXTURE, &usb)?;
        report.extend(self.placement.place_fixture(
            MOUNTING_FIXTURE,
            MOUNTING_FIXTURE,
            &mounting,
        )?);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use catalog::{LayoutStorage, ShiftTable};

    use super::*;
    use crate::placement::InstanceBuffer;

    /// A loader answering every request synchronously while recording the requested paths.
    #[derive(Default)]
    struct RecordingLoader {
        loaded: Vec<String>,
        failing: Vec<String>,
    }

    impl RecordingLoader {
        fn load(&mut self, request: &LoadRequest) -> Result<AssetNode, LoadError> {
            self.loaded.push(request.path.clone());

            if self.failing.contains(&request.path) {
                Err(LoadError {
                    path: request.path.clone(),
                    reason: "not found".to_owned(),
                })
            } else {
                Ok(case_asset())
            }
        }

        fn run(
            &mut self,
            assembly: &mut Assembly,
            requests: &[LoadRequest],
            templates: &Templates,
        ) -> Vec<Completion> {
            requests
                .iter()
                .map(|request| {
                    let result = self.load(request);
                    assembly
                        .complete(request, result, templates)
                        .expect("completion should succeed")
                })
                .collect()
        }

        fn cases(&self) -> Vec<&str> {
            self.loaded
                .iter()
                .filter(|path| path.starts_with("models/type"))
                .map(String::as_str)
                .collect()
        }
    }

    fn case_asset() -> AssetNode {
        let group = |name: &str| AssetNode::Group {
            name: name.to_owned(),
            children: vec![AssetNode::Mesh {
                name: format!("{name}_1"),
                mesh: MeshData::default(),
            }],
        };

        AssetNode::Group {
            name: "Scene".to_owned(),
            children: ["top", "standard", "vented", "175", "blocker-1", "blocker-2", "65-b"]
                .into_iter()
                .map(group)
                .collect(),
        }
    }

    fn templates() -> Templates {
        let catalog = Catalog::default();
        let mut keycaps: std::collections::HashMap<_, _> = RightShift::ALL
            .iter()
            .map(|width| (ShiftTable::row_name(*width), MeshData::default()))
            .collect();

        for model in catalog.models() {
            for side in Side::ALL {
                let entry = catalog.side(model, *side).expect("side should exist");
                for (_, layout) in entry.stored_layouts() {
                    keycaps.extend(
                        layout
                            .rows
                            .keys()
                            .map(|row| (row.clone(), MeshData::default())),
                    );
                }
            }
        }

        Templates {
            switch: Some(MeshData::default()),
            keycaps,
            ..Default::default()
        }
    }

    fn assembly(model: KeyboardModel, side: Side, option: VariantOption) -> Assembly {
        let category = Catalog::default()
            .side(model, side)
            .expect("side should exist")
            .category;

        Assembly::new(
            Arc::new(Catalog::default()),
            model,
            side,
            CaseType::One,
            SideSelection::new(category, option),
        )
        .expect("assembly should be created")
    }

    fn loaded(model: KeyboardModel, side: Side, option: VariantOption) -> (Assembly, Templates) {
        let mut assembly = assembly(model, side, option);
        let templates = templates();
        let requests = assembly.start();
        RecordingLoader::default().run(&mut assembly, &requests, &templates);

        (assembly, templates)
    }

    fn switch_count(assembly: &Assembly) -> usize {
        assembly
            .placement()
            .switches()
            .map_or(0, InstanceBuffer::capacity)
    }

    #[test]
    fn every_layout_places_completely() {
        let catalog = Catalog::default();

        for model in catalog.models() {
            for side in Side::ALL {
                let entry = catalog.side(model, *side).expect("side should exist");
                for option in entry.options.clone() {
                    let (assembly, _) = loaded(model, *side, option);
                    let layout = assembly.layout();

                    assert_eq!(layout.validate(), Ok(()), "{model} {side} {option}");
                    assert_eq!(assembly.state(), AssemblyState::Placed);
                    assert_eq!(switch_count(&assembly), layout.anchors.len());

                    let keycaps: usize = assembly
                        .placement()
                        .rows()
                        .map(InstanceBuffer::capacity)
                        .sum();
                    assert_eq!(keycaps, layout.anchors.len(), "{model} {side} {option}");
                }
            }
        }
    }

    #[test]
    fn composite_layouts_append_fragment_anchors() {
        let catalog = Catalog::default();
        let Ok(LayoutStorage::Composite { base, fragments }) = catalog
            .side(KeyboardModel::Kbo, Side::Left)
            .map(|entry| &entry.storage)
        else {
            panic!("kbo left should be composite");
        };
        let fragment = &fragments[&VariantOption::NoBlocker];

        let (assembly, _) = loaded(KeyboardModel::Kbo, Side::Left, VariantOption::NoBlocker);

        assert_eq!(
            assembly.layout().anchors.len(),
            base.anchors.len() + fragment.anchors.len()
        );
    }

    #[test]
    fn loading_reaches_placed_state() {
        let mut assembly = assembly(KeyboardModel::Sinc, Side::Left, VariantOption::Macro);
        let mut templates = templates();
        let switch = templates.switch.take();
        let requests = assembly.start();
        assert_eq!(assembly.state(), AssemblyState::Unloaded);

        RecordingLoader::default().run(&mut assembly, &requests, &templates);
        assert_eq!(assembly.state(), AssemblyState::CaseLoaded);

        templates.switch = switch;
        let report = assembly
            .provide_templates(&templates)
            .expect("placement should succeed");

        assert_eq!(assembly.state(), AssemblyState::Placed);
        assert!(report.is_some_and(|report| report.pending.is_empty()));
    }

    #[test]
    fn reselecting_the_same_option_is_unchanged() {
        let (mut assembly, templates) =
            loaded(KeyboardModel::Quefrency, Side::Left, VariantOption::Macro);
        let version = assembly.placement().switches().map(InstanceBuffer::version);

        let change = assembly
            .set_variant(VariantOption::Macro, &templates)
            .expect("change should succeed");

        assert_eq!(change, VariantChange::Unchanged);
        assert_eq!(
            assembly.placement().switches().map(InstanceBuffer::version),
            version
        );
    }

    #[test]
    fn structural_changes_reload_case_and_plate() {
        let (mut assembly, templates) =
            loaded(KeyboardModel::Quefrency, Side::Left, VariantOption::NoMacro);
        let mut loader = RecordingLoader::default();
        assert_eq!(switch_count(&assembly), 29);

        for (option, count) in [
            (VariantOption::Macro, 39),
            (VariantOption::NoMacro, 29),
            (VariantOption::Macro, 39),
        ] {
            let change = assembly
                .set_variant(option, &templates)
                .expect("change should succeed");
            let VariantChange::Structural(requests) = change else {
                panic!("changing the macro option should be structural");
            };

            loader.run(&mut assembly, &requests, &templates);
            assert_eq!(switch_count(&assembly), count);
            assert_eq!(assembly.applied(), option);
        }

        assert_eq!(
            loader.cases(),
            vec![
                "models/type1/t1-q-left-macro.glb",
                "models/type1/t1-q-left.glb",
                "models/type1/t1-q-left-macro.glb",
            ]
        );
    }

    #[test]
    fn blocker_changes_keep_the_case() {
        let (mut assembly, templates) =
            loaded(KeyboardModel::Kbo, Side::Left, VariantOption::NoBlocker);
        assert_eq!(switch_count(&assembly), 39);

        let change = assembly
            .set_variant(VariantOption::Blocker1, &templates)
            .expect("change should succeed");

        let VariantChange::Population {
            placement,
            visibility,
        } = change
        else {
            panic!("changing the blocker should only change the population");
        };
        assert!(placement.is_some());
        assert_eq!(
            visibility.events,
            vec![VisibilityEvent {
                side: Side::Left,
                group: "blocker-1".to_owned(),
                visible: true,
            }]
        );
        assert_eq!(switch_count(&assembly), 34);
        assert!(!assembly.is_loading(AssetKind::Case));
    }

    #[test]
    fn right_shift_moves_one_switch() {
        let (mut assembly, templates) =
            loaded(KeyboardModel::Kbo, Side::Right, VariantOption::NoBlocker);
        let switches = assembly.placement().switches().cloned();
        let switches = switches.expect("switches should be placed");

        let change = assembly
            .set_right_shift(RightShift::U1_75, &templates)
            .expect("change should succeed");

        let VariantChange::Population {
            placement: Some(report),
            visibility,
        } = change
        else {
            panic!("the shift change should be placed");
        };
        let moved = assembly.placement().switches().expect("switches should be placed");
        assert_eq!(moved.capacity(), switches.capacity());
        assert_eq!(moved.generation(), switches.generation());
        assert_ne!(moved.slot(42), switches.slot(42));
        assert_eq!(moved.slot(0), switches.slot(0));
        assert_eq!(report.allocated, vec!["r4-175"]);
        assert_eq!(report.disposed, vec!["r4-275"]);
        assert!(visibility.events.iter().any(|event| event.group == "175" && event.visible));
    }

    #[test]
    fn bottom_case_change_is_idempotent() {
        let (mut assembly, _) = loaded(KeyboardModel::Sinc, Side::Right, VariantOption::SixtyFive);

        let first = assembly.set_bottom_case(BottomCase::Vented);
        let second = assembly.set_bottom_case(BottomCase::Vented);

        assert_eq!(first.events.len(), 2);
        assert!(second.is_empty());
        let case = assembly.case().expect("case should be loaded");
        assert!(case.is_visible("vented"));
        assert!(!case.is_visible("standard"));
    }

    #[test]
    fn failed_case_keeps_previous_variant() {
        let (mut assembly, templates) =
            loaded(KeyboardModel::Quefrency, Side::Right, VariantOption::SixtyFive);
        let mut loader = RecordingLoader {
            failing: vec!["models/type1/t1-q-right-60.glb".to_owned()],
            ..Default::default()
        };

        let VariantChange::Structural(requests) = assembly
            .set_variant(VariantOption::Sixty, &templates)
            .expect("change should succeed")
        else {
            panic!("changing the right option should be structural");
        };
        let completions = loader.run(&mut assembly, &requests, &templates);

        assert!(matches!(completions[0], Completion::Failed(_)));
        assert_eq!(completions[1], Completion::Stale);
        assert_eq!(assembly.selected(), VariantOption::SixtyFive);
        assert_eq!(assembly.applied(), VariantOption::SixtyFive);
        assert_eq!(switch_count(&assembly), 36);
        assert_eq!(
            assembly.requested_assets().case,
            "models/type1/t1-q-right-65.glb"
        );
    }

    #[test]
    fn only_the_latest_request_is_applied() {
        let (mut assembly, templates) =
            loaded(KeyboardModel::Quefrency, Side::Left, VariantOption::Macro);
        let mut loader = RecordingLoader::default();

        let VariantChange::Structural(first) = assembly
            .set_variant(VariantOption::NoMacro, &templates)
            .expect("change should succeed")
        else {
            panic!("changing the left option should be structural");
        };
        let VariantChange::Structural(second) = assembly
            .set_variant(VariantOption::Macro, &templates)
            .expect("change should succeed")
        else {
            panic!("changing the left option should be structural");
        };

        let stale = loader.run(&mut assembly, &first, &templates);
        assert!(stale.iter().all(|completion| *completion == Completion::Stale));
        assert_eq!(assembly.applied(), VariantOption::Macro);

        loader.run(&mut assembly, &second, &templates);
        assert_eq!(assembly.applied(), VariantOption::Macro);
        assert_eq!(switch_count(&assembly), 39);
        assert!(!assembly.is_loading(AssetKind::Case));
    }

    #[test]
    fn failed_first_case_can_be_retried() {
        let mut assembly = assembly(KeyboardModel::Quefrency, Side::Left, VariantOption::Macro);
        let templates = templates();
        let mut loader = RecordingLoader {
            failing: vec!["models/type1/t1-q-left-macro.glb".to_owned()],
            ..Default::default()
        };
        let requests = assembly.start();
        loader.run(&mut assembly, &requests, &templates);
        assert_eq!(assembly.state(), AssemblyState::Unloaded);

        let VariantChange::Structural(requests) = assembly
            .set_variant(VariantOption::Macro, &templates)
            .expect("change should succeed")
        else {
            panic!("a side without case should request its assets again");
        };
        let kinds: Vec<_> = requests.iter().map(|request| request.kind).collect();
        assert_eq!(kinds, vec![AssetKind::Case, AssetKind::Plate]);

        RecordingLoader::default().run(&mut assembly, &requests, &templates);
        assert_eq!(assembly.state(), AssemblyState::Placed);
        assert_eq!(switch_count(&assembly), 39);
        assert!(matches!(
            assembly.set_variant(VariantOption::Macro, &templates),
            Ok(VariantChange::Unchanged)
        ));
    }

    #[test]
    fn blocker_visibility_swaps_groups() {
        let (mut assembly, _) = loaded(KeyboardModel::Kbo, Side::Left, VariantOption::NoBlocker);
        let event = |group: &str, visible| VisibilityEvent {
            side: Side::Left,
            group: group.to_owned(),
            visible,
        };

        let shown = assembly.set_blocker_visibility(VariantOption::Blocker1);
        assert_eq!(shown.events, vec![event("blocker-1", true)]);

        let swapped = assembly.set_blocker_visibility(VariantOption::Blocker2);
        assert_eq!(swapped.events.len(), 2);
        assert!(swapped.events.contains(&event("blocker-1", false)));
        assert!(swapped.events.contains(&event("blocker-2", true)));
        assert!(assembly
            .set_blocker_visibility(VariantOption::Blocker2)
            .is_empty());

        let hidden = assembly.set_blocker_visibility(VariantOption::NoBlocker);
        assert_eq!(hidden.events, vec![event("blocker-2", false)]);
        let case = assembly.case().expect("case should be loaded");
        assert!(["blocker-1", "blocker-2", "65-b"]
            .iter()
            .all(|group| !case.is_visible(group)));
    }

    #[test]
    fn mounting_angle_tilts_side_and_places_hardware() {
        let (mut assembly, _) = loaded(KeyboardModel::Kbo, Side::Left, VariantOption::NoBlocker);
        let positions = Catalog::default()
            .side(KeyboardModel::Kbo, Side::Left)
            .expect("side should exist")
            .mounting_positions[&VariantOption::Base]
            .clone();
        assert_eq!(assembly.transformation(), Mat4::IDENTITY);

        let report = assembly
            .set_mounting_angle(MountingAngle::Six)
            .expect("mounting should be placed")
            .expect("placed sides should report the fixture pass");

        assert!(report.committed.contains(&MOUNTING_FIXTURE.to_owned()));
        assert_eq!(assembly.mounting_angle(), MountingAngle::Six);
        assert_eq!(
            assembly.transformation(),
            Mat4::from_rotation_x(6.0_f32.to_radians())
        );
        let mounting = assembly
            .placement()
            .fixture(MOUNTING_FIXTURE)
            .expect("mounting should be placed");
        assert_eq!(mounting.capacity(), 4);
        for (index, position) in positions.into_iter().enumerate() {
            assert_eq!(mounting.slot(index), Some(anchor_transform(position)));
        }
        assert!(matches!(
            assembly.set_mounting_angle(MountingAngle::Six),
            Ok(None)
        ));
    }

    #[test]
    fn usb_connectors_are_placed_at_catalog_anchors() {
        let (assembly, _) = loaded(KeyboardModel::Quefrency, Side::Right, VariantOption::SixtyFive);
        let anchors = Catalog::default()
            .usb_anchors(KeyboardModel::Quefrency, Side::Right)
            .expect("side should exist");

        let usb = assembly
            .placement()
            .fixture(USB_FIXTURE)
            .expect("usb should be placed");

        assert_eq!(usb.capacity(), 2);
        assert_eq!(usb.slot(0), Some(anchor_transform(anchors[0])));
        assert_eq!(usb.slot(1), Some(anchor_transform(anchors[1])));
    }

    #[test]
    fn plates_fall_back_to_outline() {
        let (assembly, _) = loaded(KeyboardModel::Sinc, Side::Left, VariantOption::Macro);

        assert_eq!(assembly.plate().plate(), &assembly.plate().outline);
        assert!(assembly.plate().pcb().is_none());
    }
}
