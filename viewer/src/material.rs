use config::Color;
use three_d::{
    Context, CpuMaterial, EffectMaterialId, Light, Material, MaterialType, PhysicalMaterial,
    Program, RenderStates, Srgba, Viewer,
};

/// The finish of a surface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Finish {
    /// The metallic factor.
    pub metallic: f32,
    /// The roughness factor.
    pub roughness: f32,
}

impl Finish {
    /// Anodized aluminium as used for the case body.
    pub const CASE: Self = Self {
        metallic: 0.6,
        roughness: 0.45,
    };
    /// Polished faces such as blocker tops.
    pub const FACE: Self = Self {
        metallic: 0.8,
        roughness: 0.25,
    };
    /// Plastic parts like keycaps and switches.
    pub const PLASTIC: Self = Self {
        metallic: 0.0,
        roughness: 0.7,
    };
    /// Bare metal like connectors and screws.
    pub const METAL: Self = Self {
        metallic: 1.0,
        roughness: 0.3,
    };
}

/// A physical material with an albedo and finish.
pub struct Physical {
    inner: PhysicalMaterial,
}

impl Physical {
    /// Creates a new physical material given an albedo and finish.
    pub fn new(context: &Context, albedo: Color, finish: Finish) -> Self {
        let inner = PhysicalMaterial::new_opaque(
            context,
            &CpuMaterial {
                albedo: srgba(albedo),
                metallic: finish.metallic,
                roughness: finish.roughness,
                ..Default::default()
            },
        );

        Self { inner }
    }

    /// Updates the albedo of the physical material.
    pub fn update(&mut self, albedo: Color) {
        self.inner.albedo = srgba(albedo);
    }
}

impl Material for Physical {
    fn id(&self) -> EffectMaterialId {
        self.inner.id()
    }

    fn fragment_shader_source(&self, lights: &[&dyn Light]) -> String {
        self.inner.fragment_shader_source(lights)
    }

    fn use_uniforms(&self, program: &Program, viewer: &dyn Viewer, lights: &[&dyn Light]) {
        self.inner.use_uniforms(program, viewer, lights);
    }

    fn render_states(&self) -> RenderStates {
        self.inner.render_states()
    }

    fn material_type(&self) -> MaterialType {
        MaterialType::Opaque
    }
}

/// Converts a color into a three-d color.
pub fn srgba(color: Color) -> Srgba {
    let Color { r, g, b, a } = color;

    Srgba::new(r, g, b, a)
}
