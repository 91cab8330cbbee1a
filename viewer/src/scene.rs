use config::{Color, Colors, Side};
use model::{Bounds, Session};
use three_d::{
    vec3, AmbientLight, Attenuation, Camera, ClearState, Context, Light, PointLight,
    RenderTarget, Srgba, Vec3,
};

use crate::objects::{Render, SideObjects};

/// A scene rendering both sides of a keyboard.
pub struct Scene {
    left: SideObjects,
    right: SideObjects,
    lights: Vec<PointLight>,
    ambient: AmbientLight,
    colors: Colors,
}

impl Scene {
    /// Creates an empty scene lit around the given bounds.
    pub fn new(context: &Context, bounds: Option<Bounds>, colors: Colors) -> Self {
        let ambient = AmbientLight::new(context, 0.05, Srgba::WHITE);
        let lights = light_positions(bounds)
            .iter()
            .map(|position| {
                PointLight::new(context, 0.8, Srgba::WHITE, *position, Attenuation::default())
            })
            .collect();

        Self {
            left: SideObjects::new(),
            right: SideObjects::new(),
            lights,
            ambient,
            colors,
        }
    }

    /// Mirrors the state of the session.
    pub fn sync(&mut self, context: &Context, session: &Session) {
        let templates = session.templates();
        if &self.colors != session.colors() {
            self.colors = session.colors().clone();
            self.left.update_colors(&self.colors);
            self.right.update_colors(&self.colors);
        }

        self.left
            .sync(context, session.assembly(Side::Left), templates, &self.colors);
        self.right
            .sync(context, session.assembly(Side::Right), templates, &self.colors);
    }

    /// Renders the scene with a given camera and render target.
    pub fn render(&self, camera: &Camera, render_target: &RenderTarget) {
        let Color { r, g, b, a } = self.colors.background;

        let mut lights: Vec<_> = self
            .lights
            .iter()
            .map(|light| light as &dyn Light)
            .collect();
        lights.push(&self.ambient as &dyn Light);

        let render_target = render_target.clear(ClearState::color_and_depth(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
            1.0,
        ));

        self.left.render(render_target, camera, &lights);
        self.right.render(render_target, camera, &lights);
    }
}

/// Returns light positions above the front corners and behind the keyboard.
fn light_positions(bounds: Option<Bounds>) -> Vec<Vec3> {
    let (center, radius) = bounds.map_or((vec3(0.0, 0.0, 0.0), 1.0), |bounds| {
        let center = bounds.center();
        (vec3(center.x, center.y, center.z), bounds.diameter().max(0.1))
    });

    [(-1.0, 1.5, 1.0), (1.0, 1.5, 1.0), (0.0, 1.0, -1.5)]
        .into_iter()
        .map(|(x, y, z)| center + radius * vec3(x, y, z))
        .collect()
}
