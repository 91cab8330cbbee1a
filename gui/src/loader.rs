use std::{
    path::{Path, PathBuf},
    thread::spawn,
};

use glam::{Mat4, Vec3};
use gltf::{buffer, Document, Node};
use log::debug;
use model::{AssetNode, LoadError, LoadRequest, MeshData};
use web_time::Instant;

use crate::{
    update::{Update, Updater},
    Error,
};

/// A loader fetching glTF assets in the background.
#[derive(Clone)]
pub struct AssetLoader {
    root: PathBuf,
    updater: Updater,
}

impl AssetLoader {
    /// Creates a new loader resolving asset paths relative to the given root.
    pub fn new(root: impl Into<PathBuf>, updater: Updater) -> Self {
        Self {
            root: root.into(),
            updater,
        }
    }

    /// Starts loading the requested asset. The result is sent as an [`Update::Loaded`].
    pub fn load(&self, request: LoadRequest) {
        let path = self.root.join(&request.path);
        let updater = self.updater.clone();

        spawn(move || {
            let start = Instant::now();
            let result = import(&path).map_err(|error| LoadError {
                path: request.path.clone(),
                reason: error.to_string(),
            });

            debug!("Loaded `{}` in {:?}", request.path, start.elapsed());
            updater.send_update(Update::Loaded(request, result));
        });
    }
}

/// Imports a glTF file as an asset tree.
///
/// # Errors
///
/// Returns an [`Error`] if the file cannot be read or contains invalid geometry.
pub fn import(path: &Path) -> Result<AssetNode, Error> {
    let (document, buffers, _) = gltf::import(path)?;

    asset_from_gltf(&document, &buffers)
}

/// Converts a glTF document into an asset tree with world transformations baked into the
/// meshes.
///
/// Nodes with children become groups, leaf nodes become one mesh per primitive. Meshes with
/// several primitives are named with a 1-based `_<index>` suffix.
///
/// # Errors
///
/// Returns an [`Error`] if the document has no scene or a primitive has no positions.
pub fn asset_from_gltf(document: &Document, buffers: &[buffer::Data]) -> Result<AssetNode, Error> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(Error::MissingScene)?;

    let mut children = Vec::new();
    for node in scene.nodes() {
        convert_node(&node, Mat4::IDENTITY, buffers, &mut children)?;
    }

    Ok(AssetNode::Group {
        name: scene.name().unwrap_or("Scene").to_owned(),
        children,
    })
}

fn convert_node(
    node: &Node,
    parent: Mat4,
    buffers: &[buffer::Data],
    output: &mut Vec<AssetNode>,
) -> Result<(), Error> {
    let transformation = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    let name = node
        .name()
        .map_or_else(|| format!("node-{}", node.index()), ToOwned::to_owned);

    let mut meshes = Vec::new();
    if let Some(mesh) = node.mesh() {
        let primitives: Vec<_> = mesh.primitives().collect();
        let single = primitives.len() == 1;

        for (index, primitive) in primitives.iter().enumerate() {
            let reader = primitive.reader(|buffer| {
                buffers.get(buffer.index()).map(|data| data.0.as_slice())
            });

            let positions: Vec<Vec3> = reader
                .read_positions()
                .ok_or_else(|| Error::MissingPositions { mesh: name.clone() })?
                .map(Vec3::from)
                .collect();
            let normals = reader
                .read_normals()
                .map(|normals| normals.map(Vec3::from).collect())
                .unwrap_or_default();
            #[allow(clippy::cast_possible_truncation)]
            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let mut data = MeshData {
                positions,
                normals,
                indices,
            };
            data.transform(transformation);

            meshes.push(AssetNode::Mesh {
                name: if single {
                    name.clone()
                } else {
                    format!("{name}_{}", index + 1)
                },
                mesh: data,
            });
        }
    }

    if node.children().next().is_none() && node.mesh().is_some() {
        output.extend(meshes);
        return Ok(());
    }

    let mut children = meshes;
    for child in node.children() {
        convert_node(&child, transformation, buffers, &mut children)?;
    }
    output.push(AssetNode::Group { name, children });

    Ok(())
}
