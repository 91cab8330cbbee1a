use std::collections::BTreeMap;

use catalog::{BottomCase, OptionCategory, RightShift, Side, VariantOption};
use glam::Mat4;

use crate::mesh::MeshData;

/// The case group which is always shown.
pub const TOP_GROUP: &str = "top";

/// A node of a loaded asset hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub enum AssetNode {
    /// A named group of child nodes.
    Group {
        /// The name of the group.
        name: String,
        /// The child nodes.
        children: Vec<AssetNode>,
    },
    /// A named mesh.
    Mesh {
        /// The name of the mesh.
        name: String,
        /// The geometry of the mesh.
        mesh: MeshData,
    },
    /// A named mesh drawn at several transformations.
    InstancedMesh {
        /// The name of the mesh.
        name: String,
        /// The geometry of a single instance.
        mesh: MeshData,
        /// The transformation of every instance.
        transforms: Vec<Mat4>,
    },
}

/// A mesh leaf of an asset together with the groups containing it.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshLeaf<'a> {
    /// The names of all groups containing the mesh, outermost first.
    pub groups: Vec<&'a str>,
    /// The name of the mesh.
    pub name: &'a str,
    /// The geometry of the mesh.
    pub mesh: &'a MeshData,
    /// The instance transformations, a single identity for plain meshes.
    pub transforms: Vec<Mat4>,
}

impl AssetNode {
    /// Returns the name of the node.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Group { name, .. } | Self::Mesh { name, .. } | Self::InstancedMesh { name, .. } => {
                name
            }
        }
    }

    /// Visits self and all descendants in depth-first order.
    pub fn visit<'a>(&'a self, visitor: &mut impl FnMut(&'a AssetNode)) {
        visitor(self);

        if let Self::Group { children, .. } = self {
            for child in children {
                child.visit(visitor);
            }
        }
    }

    /// Returns the first node with the given name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&AssetNode> {
        let mut found = None;
        self.visit(&mut |node| {
            if found.is_none() && node.name() == name {
                found = Some(node);
            }
        });

        found
    }

    /// Returns the geometry of the first mesh with the given name.
    #[must_use]
    pub fn find_mesh(&self, name: &str) -> Option<&MeshData> {
        let mut found = None;
        self.visit(&mut |node| match node {
            Self::Mesh { name: mesh_name, mesh } | Self::InstancedMesh { name: mesh_name, mesh, .. }
                if found.is_none() && mesh_name == name =>
            {
                found = Some(mesh);
            }
            _ => {}
        });

        found
    }

    /// Returns the geometry of the first mesh.
    #[must_use]
    pub fn first_mesh(&self) -> Option<&MeshData> {
        self.leaves().into_iter().next().map(|leaf| leaf.mesh)
    }

    /// Returns the names of all groups below self.
    #[must_use]
    pub fn groups(&self) -> Vec<&str> {
        let mut groups = Vec::new();
        self.visit(&mut |node| {
            if let Self::Group { name, .. } = node {
                if !std::ptr::eq(node, self) {
                    groups.push(name.as_str());
                }
            }
        });

        groups
    }

    /// Returns all mesh leaves with the groups below self containing them.
    #[must_use]
    pub fn leaves(&self) -> Vec<MeshLeaf<'_>> {
        let mut leaves = Vec::new();

        match self {
            Self::Group { children, .. } => {
                for child in children {
                    child.collect_leaves(&mut Vec::new(), &mut leaves);
                }
            }
            _ => self.collect_leaves(&mut Vec::new(), &mut leaves),
        }

        leaves
    }

    fn collect_leaves<'a>(&'a self, groups: &mut Vec<&'a str>, leaves: &mut Vec<MeshLeaf<'a>>) {
        match self {
            Self::Group { name, children } => {
                groups.push(name);
                for child in children {
                    child.collect_leaves(groups, leaves);
                }
                groups.pop();
            }
            Self::Mesh { name, mesh } => leaves.push(MeshLeaf {
                groups: groups.clone(),
                name,
                mesh,
                transforms: vec![Mat4::IDENTITY],
            }),
            Self::InstancedMesh {
                name,
                mesh,
                transforms,
            } => leaves.push(MeshLeaf {
                groups: groups.clone(),
                name,
                mesh,
                transforms: transforms.clone(),
            }),
        }
    }
}

/// The surface of a case mesh.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Surface {
    /// The case body.
    Case,
    /// A visible face, such as the top of a blocker.
    Face,
}

impl Surface {
    /// Returns the surface of a case mesh with the given name.
    #[must_use]
    pub fn of_mesh(name: &str) -> Self {
        if name.contains("_2") {
            Self::Face
        } else {
            Self::Case
        }
    }
}

/// The state deciding which case groups are shown.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShellState {
    /// The selected bottom case.
    pub bottom_case: BottomCase,
    /// The blocker group currently shown, if any.
    pub blocker: Option<VariantOption>,
    /// The selected right shift width.
    pub right_shift: RightShift,
}

impl ShellState {
    /// Returns the case group of the blocker shown for the given selection.
    #[must_use]
    pub fn blocker_group(category: OptionCategory, option: VariantOption) -> Option<VariantOption> {
        let shows_blocker =
            category == OptionCategory::Blocker || option == VariantOption::SixtyFiveBlocked;

        (shows_blocker && option != VariantOption::NoBlocker).then_some(option)
    }

    /// Returns true if the group with the given name is shown in this state.
    #[must_use]
    pub fn shows(&self, group: &str) -> bool {
        group == TOP_GROUP
            || group == self.bottom_case.as_str()
            || self.blocker.is_some_and(|blocker| group == blocker.as_str())
            || (group == RightShift::U1_75.as_str() && self.right_shift == RightShift::U1_75)
    }
}

/// A change of the visibility of a case group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibilityEvent {
    /// The side of the case.
    pub side: Side,
    /// The name of the group.
    pub group: String,
    /// The new visibility.
    pub visible: bool,
}

/// The visibility of the named groups of a loaded case.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseShell {
    side: Side,
    asset: AssetNode,
    visibility: BTreeMap<String, bool>,
}

impl CaseShell {
    /// Creates a case shell from a loaded case asset, showing the groups of the given state.
    #[must_use]
    pub fn new(side: Side, asset: AssetNode, state: &ShellState) -> Self {
        let visibility = asset
            .groups()
            .into_iter()
            .map(|group| (group.to_owned(), state.shows(group)))
            .collect();

        Self {
            side,
            asset,
            visibility,
        }
    }

    /// Returns the loaded case asset.
    #[must_use]
    pub fn asset(&self) -> &AssetNode {
        &self.asset
    }

    /// Returns true if the group with the given name exists and is shown.
    #[must_use]
    pub fn is_visible(&self, group: &str) -> bool {
        self.visibility.get(group).copied().unwrap_or(false)
    }

    /// Returns true if every group in the given path is shown.
    #[must_use]
    pub fn is_path_visible(&self, groups: &[&str]) -> bool {
        groups.iter().all(|group| self.is_visible(group))
    }

    /// Applies a new state, returning the visibility changes of all affected groups.
    pub fn apply(&mut self, state: &ShellState) -> Vec<VisibilityEvent> {
        let side = self.side;

        self.visibility
            .iter_mut()
            .filter_map(|(group, visible)| {
                let shown = state.shows(group);
                (*visible != shown).then(|| {
                    *visible = shown;
                    VisibilityEvent {
                        side,
                        group: group.clone(),
                        visible: shown,
                    }
                })
            })
            .collect()
    }
}
