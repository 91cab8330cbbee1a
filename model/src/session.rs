use std::{collections::BTreeMap, sync::Arc};

use catalog::{
    BottomCase, Catalog, KeyboardModel, MountingAngle, RightShift, Side, SwitchLayout,
    VariantOption,
};
use config::{Colors, Config};
use log::{debug, info, warn};

use crate::{
    assembly::{
        AssetKind, Assembly, Completion, LoadError, LoadRequest, Ticket, VariantChange,
        VisibilityChange,
    },
    asset::AssetNode,
    mesh::Bounds,
    placement::{PlacementReport, Templates},
    resolve::{KEYCAPS_ASSET, MOUNTING_ASSET, SWITCH_ASSET, USB_ASSET},
    Error,
};

/// A configurator session displaying both sides of one keyboard.
#[derive(Clone, Debug)]
pub struct Session {
    model: KeyboardModel,
    left: Assembly,
    right: Assembly,
    templates: Templates,
    last_ticket: u64,
    pending: BTreeMap<AssetKind, Ticket>,
    colors: Colors,
    dirty: bool,
}

impl Session {
    /// Creates a session from the given catalog and configuration.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the catalog does not contain the configured keyboard.
    pub fn new(catalog: Arc<Catalog>, config: &Config) -> Result<Self, Error> {
        let assembly = |side| {
            Assembly::new(
                catalog.clone(),
                config.keyboard,
                side,
                config.case_type,
                config.selection(side),
            )
        };
        let mut left = assembly(Side::Left)?;
        let mut right = assembly(Side::Right)?;
        let templates = Templates::default();

        for assembly in [&mut left, &mut right] {
            assembly.set_bottom_case(config.bottom_case);
            assembly.set_mounting_angle(config.mounting_angle)?;
        }
        right.set_right_shift(config.right_shift, &templates)?;

        Ok(Self {
            model: config.keyboard,
            left,
            right,
            templates,
            last_ticket: 0,
            pending: BTreeMap::new(),
            colors: config.colors.clone(),
            dirty: true,
        })
    }

    /// Returns the load requests of the shared templates and the initial assets of both sides.
    pub fn start(&mut self) -> Vec<LoadRequest> {
        info!("Configuring {}", self.model);

        let mut requests: Vec<_> = [
            (AssetKind::Switch, SWITCH_ASSET),
            (AssetKind::Keycaps, KEYCAPS_ASSET),
            (AssetKind::Usb, USB_ASSET),
            (AssetKind::Mounting, MOUNTING_ASSET),
        ]
        .into_iter()
        .map(|(kind, path)| {
            let ticket = Ticket::next(&mut self.last_ticket);
            self.pending.insert(kind, ticket);

            LoadRequest {
                side: None,
                kind,
                path: path.to_owned(),
                ticket,
            }
        })
        .collect();

        requests.extend(self.left.start());
        requests.extend(self.right.start());

        requests
    }

    /// Applies the result of a load request to the side or templates it belongs to.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the loaded selection cannot be resolved or placed.
    pub fn complete(
        &mut self,
        request: &LoadRequest,
        result: Result<AssetNode, LoadError>,
    ) -> Result<Completion, Error> {
        let completion = match request.side {
            Some(side) => {
                let assembly = match side {
                    Side::Left => &mut self.left,
                    Side::Right => &mut self.right,
                };
                assembly.complete(request, result, &self.templates)?
            }
            None => self.complete_template(request, result)?,
        };

        // Failed side loads revert the selection shown in the controls
        match completion {
            Completion::Applied(_) => self.dirty = true,
            Completion::Failed(_) if request.side.is_some() => self.dirty = true,
            _ => {}
        }

        Ok(completion)
    }

    /// Changes the selected variant of a side.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the new selection cannot be resolved or placed.
    pub fn set_variant(
        &mut self,
        side: Side,
        option: VariantOption,
    ) -> Result<VariantChange, Error> {
        let assembly = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        let change = assembly.set_variant(option, &self.templates)?;

        if let VariantChange::Population { .. } = change {
            self.dirty = true;
        }

        Ok(change)
    }

    /// Shows the blocker group of the given option on one side.
    pub fn set_blocker_visibility(
        &mut self,
        side: Side,
        option: VariantOption,
    ) -> VisibilityChange {
        let change = self.assembly_mut(side).set_blocker_visibility(option);
        self.dirty |= !change.is_empty();

        change
    }

    /// Changes the bottom case of both sides.
    pub fn set_bottom_case(&mut self, bottom_case: BottomCase) -> VisibilityChange {
        let mut change = self.left.set_bottom_case(bottom_case);
        change
            .events
            .extend(self.right.set_bottom_case(bottom_case).events);
        self.dirty |= !change.is_empty();

        change
    }

    /// Changes the width of the right shift key.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the shift switch cannot be placed.
    pub fn set_right_shift(&mut self, width: RightShift) -> Result<VariantChange, Error> {
        let change = self.right.set_right_shift(width, &self.templates)?;

        if change != VariantChange::Unchanged {
            self.dirty = true;
        }

        Ok(change)
    }

    /// Changes the mounting angle preset of one side.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the mounting hardware cannot be placed.
    pub fn set_mounting_angle(
        &mut self,
        side: Side,
        angle: MountingAngle,
    ) -> Result<Option<PlacementReport>, Error> {
        let assembly = self.assembly_mut(side);
        let changed = assembly.mounting_angle() != angle;
        let report = assembly.set_mounting_angle(angle)?;
        self.dirty |= changed;

        Ok(report)
    }

    /// Changes the display colors.
    pub fn set_colors(&mut self, colors: Colors) {
        if self.colors != colors {
            self.colors = colors;
            self.dirty = true;
        }
    }

    /// Returns the switch layout displayed on a side.
    #[must_use]
    pub fn get_selected_layout(&self, side: Side) -> &SwitchLayout {
        self.assembly(side).layout()
    }

    /// Returns the bounds of the switches of one side.
    #[must_use]
    pub fn bounds(&self, side: Side) -> Option<Bounds> {
        self.assembly(side).bounds()
    }

    /// Returns the bounds of the switches of both sides.
    #[must_use]
    pub fn scene_bounds(&self) -> Option<Bounds> {
        match (self.left.bounds(), self.right.bounds()) {
            (Some(left), Some(right)) => Some(left.union(&right)),
            (left, right) => left.or(right),
        }
    }

    /// Returns the keyboard model.
    #[must_use]
    pub fn model(&self) -> KeyboardModel {
        self.model
    }

    /// Returns the assembly of a side.
    #[must_use]
    pub fn assembly(&self, side: Side) -> &Assembly {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Returns the shared templates.
    #[must_use]
    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Returns the display colors.
    #[must_use]
    pub fn colors(&self) -> &Colors {
        &self.colors
    }

    /// Returns true if any asset of the session is still being loaded.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        !self.pending.is_empty()
            || [&self.left, &self.right].into_iter().any(|assembly| {
                assembly.is_loading(AssetKind::Case) || assembly.is_loading(AssetKind::Plate)
            })
    }

    /// Returns true if the scene changed since the last call and resets the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn assembly_mut(&mut self, side: Side) -> &mut Assembly {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    fn complete_template(
        &mut self,
        request: &LoadRequest,
        result: Result<AssetNode, LoadError>,
    ) -> Result<Completion, Error> {
        if self.pending.get(&request.kind) != Some(&request.ticket) {
            debug!("Dropping stale template `{}`", request.path);
            return Ok(Completion::Stale);
        }
        self.pending.remove(&request.kind);

        let asset = match result {
            Ok(asset) => asset,
            Err(error) => {
                warn!("{error}, {:?} instances are not displayed", request.kind);
                return Ok(Completion::Failed(error));
            }
        };

        match request.kind {
            AssetKind::Switch => {
                self.templates.switch = asset
                    .find_mesh("switch")
                    .or_else(|| asset.first_mesh())
                    .cloned();
            }
            AssetKind::Keycaps => {
                self.templates.keycaps = asset
                    .leaves()
                    .into_iter()
                    .map(|leaf| (leaf.name.to_owned(), leaf.mesh.clone()))
                    .collect();
            }
            AssetKind::Usb => self.templates.usb = asset.first_mesh().cloned(),
            AssetKind::Mounting => self.templates.mounting = asset.first_mesh().cloned(),
            AssetKind::Case | AssetKind::Plate => {
                debug!("Ignoring side asset `{}` without side", request.path);
                return Ok(Completion::Stale);
            }
        }

        let mut report: Option<PlacementReport> = None;
        for assembly in [&mut self.left, &mut self.right] {
            if let Some(side_report) = assembly.provide_templates(&self.templates)? {
                match &mut report {
                    Some(report) => report.extend(side_report),
                    None => report = Some(side_report),
                }
            }
        }

        Ok(Completion::Applied(report))
    }
}

#[cfg(test)]
mod tests {
    use catalog::{CaseType, OptionCategory};
    use config::SideSelection;

    use super::*;
    use crate::{assembly::AssemblyState, mesh::MeshData};

    fn config() -> Config {
        Config {
            keyboard: KeyboardModel::Kbo,
            case_type: CaseType::One,
            left: SideSelection::new(OptionCategory::Blocker, VariantOption::NoBlocker),
            right: SideSelection::new(OptionCategory::Blocker, VariantOption::NoBlocker),
            ..Config::default()
        }
    }

    fn session() -> Session {
        Session::new(Arc::new(Catalog::default()), &config()).expect("session should be created")
    }

    fn asset(name: &str) -> AssetNode {
        AssetNode::Group {
            name: "Scene".to_owned(),
            children: vec![AssetNode::Mesh {
                name: name.to_owned(),
                mesh: MeshData::default(),
            }],
        }
    }

    #[test]
    fn start_requests_templates_and_both_sides() {
        let mut session = session();

        let requests = session.start();
        let kinds: Vec<_> = requests.iter().map(|request| (request.side, request.kind)).collect();

        assert_eq!(requests.len(), 8);
        assert!(kinds.contains(&(None, AssetKind::Keycaps)));
        assert!(kinds.contains(&(Some(Side::Left), AssetKind::Case)));
        assert!(kinds.contains(&(Some(Side::Right), AssetKind::Plate)));
    }

    #[test]
    fn sides_are_placed_once_case_and_switch_arrived() {
        let mut session = session();
        let requests = session.start();

        for request in &requests {
            assert_eq!(session.assembly(Side::Left).state(), AssemblyState::Unloaded);
            let name = if request.kind == AssetKind::Switch { "switch" } else { "mesh" };
            session
                .complete(request, Ok(asset(name)))
                .expect("completion should succeed");
            if request.kind == AssetKind::Case && request.side == Some(Side::Left) {
                break;
            }
        }

        assert_eq!(session.assembly(Side::Left).state(), AssemblyState::Placed);
        assert_eq!(session.assembly(Side::Right).state(), AssemblyState::Unloaded);
        assert!(session.take_dirty());
        assert!(!session.take_dirty());
    }

    #[test]
    fn failed_templates_leave_sides_case_loaded() {
        let mut session = session();
        let requests = session.start();

        for request in &requests {
            let result = if request.kind == AssetKind::Switch {
                Err(LoadError {
                    path: request.path.clone(),
                    reason: "missing".to_owned(),
                })
            } else {
                Ok(asset("mesh"))
            };
            session
                .complete(request, result)
                .expect("completion should succeed");
        }

        assert_eq!(session.assembly(Side::Right).state(), AssemblyState::CaseLoaded);
        assert!(session.templates().switch.is_none());
        assert!(!session.is_loading());
    }

    fn loaded_session(config: &Config) -> Session {
        let mut session =
            Session::new(Arc::new(Catalog::default()), config).expect("session should be created");
        for request in session.start() {
            let name = if request.kind == AssetKind::Switch { "switch" } else { "mesh" };
            session
                .complete(&request, Ok(asset(name)))
                .expect("completion should succeed");
        }
        session.take_dirty();

        session
    }

    #[test]
    fn failed_case_marks_reverted_selection_dirty() {
        let mut session = loaded_session(&Config::default());

        let VariantChange::Structural(requests) = session
            .set_variant(Side::Left, VariantOption::NoMacro)
            .expect("change should succeed")
        else {
            panic!("changing the macro option should be structural");
        };
        let case = requests
            .iter()
            .find(|request| request.kind == AssetKind::Case)
            .expect("case should be requested");
        let completion = session
            .complete(
                case,
                Err(LoadError {
                    path: case.path.clone(),
                    reason: "missing".to_owned(),
                }),
            )
            .expect("completion should succeed");

        assert!(matches!(completion, Completion::Failed(_)));
        assert_eq!(session.assembly(Side::Left).selected(), VariantOption::Macro);
        assert!(session.take_dirty());
    }

    #[test]
    fn unchanged_mounting_angle_keeps_scene_clean() {
        let mut session = loaded_session(&config());

        let report = session
            .set_mounting_angle(Side::Right, MountingAngle::Flat)
            .expect("mounting should be placed");
        assert!(report.is_none());
        assert!(!session.take_dirty());

        session
            .set_mounting_angle(Side::Right, MountingAngle::Three)
            .expect("mounting should be placed");
        assert!(session.take_dirty());
    }

    #[test]
    fn scene_bounds_cover_both_sides() {
        let session = session();

        let left = session.bounds(Side::Left).expect("left should have switches");
        let right = session.bounds(Side::Right).expect("right should have switches");
        let scene = session.scene_bounds().expect("scene should have switches");

        assert_eq!(scene, left.union(&right));
    }
}
