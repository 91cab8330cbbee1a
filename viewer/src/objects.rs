use std::collections::BTreeMap;

use config::{Color, Colors};
use model::{Assembly, InstanceBuffer, MeshData, Surface, Templates, SWITCHES};
use three_d::{
    Camera, Context, CpuMesh, Gm, Indices, InstancedMesh, Instances, Light, Mat4, Mesh,
    Positions, RenderTarget, Vec3,
};

use crate::material::{Finish, Physical};

/// A trait for rendering an object.
pub trait Render {
    /// Renders `self` to the given render target.
    fn render(&self, render_target: &RenderTarget, camera: &Camera, lights: &[&dyn Light]);

    /// Updates the colors of `self`.
    fn update_colors(&mut self, colors: &Colors);
}

/// The part of the keyboard an object shows, deciding its color and finish.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Role {
    Case,
    Face,
    Plate,
    Pcb,
    Switch,
    Keycap,
    Usb,
    Mounting,
}

impl Role {
    fn of_buffer(name: &str) -> Self {
        match name {
            SWITCHES => Self::Switch,
            "usb" => Self::Usb,
            "mounting" => Self::Mounting,
            _ => Self::Keycap,
        }
    }

    fn color(self, colors: &Colors) -> Color {
        match self {
            Self::Case | Self::Face => colors.case,
            Self::Plate | Self::Switch => colors.switch,
            Self::Pcb => colors.pcb,
            Self::Keycap => colors.keycap,
            Self::Usb | Self::Mounting => colors.usb,
        }
    }

    fn finish(self) -> Finish {
        match self {
            Self::Case => Finish::CASE,
            Self::Face => Finish::FACE,
            Self::Pcb | Self::Switch | Self::Keycap => Finish::PLASTIC,
            Self::Plate | Self::Usb | Self::Mounting => Finish::METAL,
        }
    }
}

/// A single mesh object.
struct Object {
    inner: Gm<Mesh, Physical>,
    role: Role,
}

impl Object {
    fn new(context: &Context, mesh: &MeshData, role: Role, colors: &Colors) -> Self {
        let mesh = Mesh::new(context, &cpu_mesh(mesh));
        let material = Physical::new(context, role.color(colors), role.finish());

        Self {
            inner: Gm::new(mesh, material),
            role,
        }
    }

    fn set_transformation(&mut self, transformation: Mat4) {
        self.inner.geometry.set_transformation(transformation);
    }
}

impl Render for Object {
    fn render(&self, render_target: &RenderTarget, camera: &Camera, lights: &[&dyn Light]) {
        render_target.render(camera, &self.inner, lights);
    }

    fn update_colors(&mut self, colors: &Colors) {
        self.inner.material.update(self.role.color(colors));
    }
}

/// An instanced object mirroring one instance buffer.
struct InstancedObject {
    inner: Gm<InstancedMesh, Physical>,
    role: Role,
    generation: u64,
    version: u64,
}

impl InstancedObject {
    fn new(
        context: &Context,
        mesh: &MeshData,
        transformations: &[glam::Mat4],
        role: Role,
        colors: &Colors,
    ) -> Self {
        let instanced_mesh = InstancedMesh::new(context, &instances(transformations), &cpu_mesh(mesh));
        let material = Physical::new(context, role.color(colors), role.finish());

        Self {
            inner: Gm::new(instanced_mesh, material),
            role,
            generation: 0,
            version: 0,
        }
    }

    /// Creates an instanced object drawing the template of a buffer.
    fn from_buffer(
        context: &Context,
        buffer: &InstanceBuffer,
        template: &MeshData,
        colors: &Colors,
    ) -> Self {
        let mut object = Self::new(
            context,
            template,
            &buffer.transforms(),
            Role::of_buffer(buffer.name()),
            colors,
        );
        object.generation = buffer.generation();
        object.version = buffer.version();

        object
    }

    /// Uploads the instances of the buffer if it changed since the last sync.
    fn sync(&mut self, buffer: &InstanceBuffer) {
        if self.version != buffer.version() {
            self.inner
                .geometry
                .set_instances(&instances(&buffer.transforms()));
            self.version = buffer.version();
        }
    }

    fn set_transformation(&mut self, transformation: Mat4) {
        self.inner.geometry.set_transformation(transformation);
    }
}

impl Render for InstancedObject {
    fn render(&self, render_target: &RenderTarget, camera: &Camera, lights: &[&dyn Light]) {
        render_target.render(camera, &self.inner, lights);
    }

    fn update_colors(&mut self, colors: &Colors) {
        self.inner.material.update(self.role.color(colors));
    }
}

/// A mesh of the case together with the groups containing it.
struct CasePart {
    groups: Vec<String>,
    object: InstancedObject,
    visible: bool,
}

/// The objects of one keyboard side.
pub struct SideObjects {
    revision: Option<u64>,
    case: Vec<CasePart>,
    plate: Option<Object>,
    pcb: Option<Object>,
    buffers: BTreeMap<String, InstancedObject>,
}

impl SideObjects {
    /// Creates an empty side.
    pub fn new() -> Self {
        Self {
            revision: None,
            case: Vec::new(),
            plate: None,
            pcb: None,
            buffers: BTreeMap::new(),
        }
    }

    /// Mirrors the state of an assembly, rebuilding only what changed.
    pub fn sync(
        &mut self,
        context: &Context,
        assembly: &Assembly,
        templates: &Templates,
        colors: &Colors,
    ) {
        if self.revision != Some(assembly.revision()) {
            self.rebuild_case(context, assembly, colors);
            self.revision = Some(assembly.revision());
        }

        if let Some(case) = assembly.case() {
            for part in &mut self.case {
                let groups: Vec<_> = part.groups.iter().map(String::as_str).collect();
                part.visible = case.is_path_visible(&groups);
            }
        }

        let mut buffers = BTreeMap::new();
        for buffer in assembly.placement().buffers() {
            let Some(template) = templates.get(buffer.template()) else {
                continue;
            };

            let object = match self.buffers.remove(buffer.name()) {
                Some(mut object) if object.generation == buffer.generation() => {
                    object.sync(buffer);
                    object
                }
                _ => InstancedObject::from_buffer(context, buffer, template, colors),
            };
            buffers.insert(buffer.name().to_owned(), object);
        }
        self.buffers = buffers;

        self.set_transformation(to_mat4(assembly.transformation()));
    }

    fn rebuild_case(&mut self, context: &Context, assembly: &Assembly, colors: &Colors) {
        self.case = assembly
            .case()
            .map(|case| {
                case.asset()
                    .leaves()
                    .into_iter()
                    .filter(|leaf| !leaf.mesh.is_empty())
                    .map(|leaf| {
                        let role = match Surface::of_mesh(leaf.name) {
                            Surface::Case => Role::Case,
                            Surface::Face => Role::Face,
                        };

                        CasePart {
                            groups: leaf.groups.iter().map(|&group| group.to_owned()).collect(),
                            object: InstancedObject::new(
                                context,
                                leaf.mesh,
                                &leaf.transforms,
                                role,
                                colors,
                            ),
                            visible: true,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let plate = assembly.plate();
        self.plate = Some(Object::new(context, plate.plate(), Role::Plate, colors));
        self.pcb = plate
            .pcb()
            .map(|pcb| Object::new(context, pcb, Role::Pcb, colors));
    }

    fn set_transformation(&mut self, transformation: Mat4) {
        for part in &mut self.case {
            part.object.set_transformation(transformation);
        }
        for object in self.plate.iter_mut().chain(self.pcb.iter_mut()) {
            object.set_transformation(transformation);
        }
        for object in self.buffers.values_mut() {
            object.set_transformation(transformation);
        }
    }
}

impl Render for SideObjects {
    fn render(&self, render_target: &RenderTarget, camera: &Camera, lights: &[&dyn Light]) {
        for part in self.case.iter().filter(|part| part.visible) {
            part.object.render(render_target, camera, lights);
        }
        for object in self.plate.iter().chain(&self.pcb) {
            object.render(render_target, camera, lights);
        }
        for object in self.buffers.values() {
            object.render(render_target, camera, lights);
        }
    }

    fn update_colors(&mut self, colors: &Colors) {
        for part in &mut self.case {
            part.object.update_colors(colors);
        }
        for object in self.plate.iter_mut().chain(self.pcb.iter_mut()) {
            object.update_colors(colors);
        }
        for object in self.buffers.values_mut() {
            object.update_colors(colors);
        }
    }
}

/// Converts a mesh into a `CpuMesh`, computing normals if the mesh has none.
fn cpu_mesh(mesh: &MeshData) -> CpuMesh {
    let positions = mesh.positions.iter().map(|&position| to_vec3(position)).collect();
    let normals = (mesh.normals.len() == mesh.positions.len() && !mesh.normals.is_empty())
        .then(|| mesh.normals.iter().map(|&normal| to_vec3(normal)).collect());

    let mut cpu_mesh = CpuMesh {
        positions: Positions::F32(positions),
        indices: Indices::U32(mesh.indices.clone()),
        normals,
        ..Default::default()
    };
    if cpu_mesh.normals.is_none() {
        cpu_mesh.compute_normals();
    }

    cpu_mesh
}

fn instances(transformations: &[glam::Mat4]) -> Instances {
    Instances {
        transformations: transformations.iter().copied().map(to_mat4).collect(),
        ..Default::default()
    }
}

fn to_vec3(vector: glam::Vec3) -> Vec3 {
    Vec3::new(vector.x, vector.y, vector.z)
}

/// Converts a glam matrix into a three-d matrix.
pub fn to_mat4(matrix: glam::Mat4) -> Mat4 {
    matrix.to_cols_array_2d().into()
}
