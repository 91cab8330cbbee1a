//! The `model` crate contains everything related to assembling a keyboard from the catalog.

mod asset;
mod assembly;
mod mesh;
mod placement;
mod plate;
mod resolve;
mod session;

pub use asset::{AssetNode, CaseShell, MeshLeaf, ShellState, Surface, VisibilityEvent, TOP_GROUP};
pub use assembly::{
    AssetKind, Assembly, AssemblyState, Completion, LoadError, LoadRequest, PlateMesh, Ticket,
    VariantChange, VisibilityChange,
};
pub use mesh::{Bounds, MeshData};
pub use placement::{
    anchor_transform, InstanceBuffer, Placement, PlacementReport, Templates, SWITCHES,
};
pub use plate::{extrude, plate_mesh, plate_transformation, PLATE_ANGLE, PLATE_DEPTH, PLATE_HEIGHT};
pub use resolve::{
    asset_names, merge, with_right_shift, AssetNames, Mounting, Resolver, KEYCAPS_ASSET,
    MOUNTING_ASSET, SWITCH_ASSET, USB_ASSET,
};
pub use session::Session;

/// The error type for errors regarding resolving and placing geometry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The catalog does not contain the requested geometry.
    #[error(transparent)]
    Catalog(#[from] catalog::Error),
    /// A switch layout does not map its rows onto its anchors.
    #[error("invalid switch layout")]
    Layout(#[from] catalog::LayoutError),
    /// A plate outline could not be triangulated.
    #[error("failed to triangulate outline with {points} points")]
    Triangulation {
        /// The number of outline points.
        points: usize,
    },
    /// A slot outside of an instance buffer was written.
    #[error("slot {slot} is out of range for buffer `{buffer}` with {capacity} instances")]
    SlotOutOfRange {
        /// The name of the buffer.
        buffer: String,
        /// The written slot.
        slot: usize,
        /// The capacity of the buffer.
        capacity: usize,
    },
    /// A placement pass did not write every slot of a buffer exactly once.
    #[error("slot {slot} of buffer `{buffer}` was not written exactly once")]
    IncompletePlacement {
        /// The name of the buffer.
        buffer: String,
        /// The first offending slot.
        slot: usize,
    },
    /// An anchor index is out of range for the layout.
    #[error("anchor {index} is out of range for {count} anchors")]
    AnchorOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of anchors.
        count: usize,
    },
}
