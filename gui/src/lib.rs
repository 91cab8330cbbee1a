//! The `gui` crate contains the controls and the background asset loading of the configurator.

mod controls;
mod loader;
mod update;

use show::egui::{Align2, Area, SidePanel, Spinner};
use three_d::{Context, FrameInput, RenderTarget, GUI};

pub use controls::{Command, Controls};
pub use loader::{asset_from_gltf, import, AssetLoader};
pub use update::{Update, Updater};

/// A graphical user interface for configuring the keyboard.
pub struct Gui {
    inner: GUI,
    controls: Controls,
}

impl Gui {
    /// The width of the side panel in logical pixels.
    pub const SIDE_PANEL_WIDTH: f32 = 300.0;

    /// Creates a new GUI for the given context.
    pub fn new(context: &Context, controls: Controls) -> Self {
        let inner = GUI::new(context);

        Self { inner, controls }
    }

    /// Returns the controls.
    pub fn controls_mut(&mut self) -> &mut Controls {
        &mut self.controls
    }

    /// Updates the GUI using the given frame input. Returns the commands issued by the user.
    pub fn update(&mut self, frame_input: &mut FrameInput, show_spinner: bool) -> Vec<Command> {
        let mut commands = Vec::new();
        let controls = &mut self.controls;

        self.inner.update(
            &mut frame_input.events,
            frame_input.accumulated_time,
            frame_input.viewport,
            frame_input.device_pixel_ratio,
            |context| {
                SidePanel::left("side_panel")
                    .exact_width(Self::SIDE_PANEL_WIDTH)
                    .resizable(false)
                    .show(context, |ui| {
                        commands = controls.show(ui);
                    });

                if show_spinner {
                    Area::new("area".into())
                        .anchor(Align2::RIGHT_BOTTOM, [-15.0, -15.0])
                        .show(context, |ui| ui.add(Spinner::new().size(32.0)));
                }
            },
        );

        commands
    }

    /// Renders the GUI to the given render target.
    pub fn render(&self, render_target: &RenderTarget) {
        render_target
            .write(|| self.inner.render())
            .expect("rendering the gui should never fail");
    }
}

/// The error type for errors regarding loading assets.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to import a glTF file.
    #[error("failed to import glTF")]
    Gltf(#[from] gltf::Error),
    /// The glTF file does not contain a scene.
    #[error("glTF file contains no scene")]
    MissingScene,
    /// A mesh primitive has no vertex positions.
    #[error("mesh `{mesh}` has no positions")]
    MissingPositions {
        /// The name of the mesh.
        mesh: String,
    },
}
