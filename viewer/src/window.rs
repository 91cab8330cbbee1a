use std::{path::PathBuf, sync::mpsc::Receiver};

use gui::{AssetLoader, Command, Controls, Gui, Update, Updater};
use log::error;
use model::{Bounds, Session, VariantChange};
use three_d::{
    degrees, vec3, window, Camera, Degrees, FrameInput, FrameOutput, InnerSpace,
    MouseButton, OrbitControl, Vec3, Viewport, WindowError, WindowSettings,
};
use winit::event_loop::{EventLoop, EventLoopProxy};

use crate::scene::Scene;

/// An application window.
pub struct Window {
    inner: window::Window,
    event_loop_proxy: EventLoopProxy<()>,
}

impl Window {
    /// Creates a new window.
    ///
    /// # Errors
    ///
    /// Returns a [`WindowError`] the window could not be created.
    pub fn try_new() -> Result<Self, WindowError> {
        let event_loop = EventLoop::new();
        let event_loop_proxy = event_loop.create_proxy();
        let inner = window::Window::from_event_loop(
            WindowSettings {
                title: "Keyboard configurator".to_owned(),
                ..Default::default()
            },
            event_loop,
        )?;

        Ok(Self {
            inner,
            event_loop_proxy,
        })
    }

    /// Runs the render loop for the given session. This is blocking until the window is closed.
    pub fn run_render_loop(
        self,
        session: Session,
        controls: Controls,
        assets_root: impl Into<PathBuf>,
    ) {
        let mut application = Application::new(
            &self.inner,
            self.event_loop_proxy,
            session,
            controls,
            assets_root.into(),
        );

        self.inner
            .render_loop(move |frame_input| application.handle_events(frame_input));
    }
}

/// An application rendering an interactive scene and GUI.
struct Application {
    control: OrbitControl,
    camera: Camera,
    framed: Option<Bounds>,
    scene: Scene,
    session: Session,
    loader: AssetLoader,
    receiver: Receiver<Update>,
    gui: Gui,
}

impl Application {
    /// Creates a new application and starts loading the initial assets.
    fn new(
        window: &window::Window,
        event_loop_proxy: EventLoopProxy<()>,
        mut session: Session,
        controls: Controls,
        assets_root: PathBuf,
    ) -> Self {
        const DEFAULT_FOV: Degrees = degrees(22.5);

        let context = window.gl();
        let bounds = session.scene_bounds();
        let (target, distance) = framing(bounds);
        let camera = Camera::new_perspective(
            window.viewport(),
            target + vec3(0.0, 0.8, 1.0).normalize_to(distance),
            target,
            Vec3::unit_y(),
            DEFAULT_FOV,
            0.01,
            100.0,
        );
        let control = OrbitControl::new(target, 0.1 * distance, 10.0 * distance);
        let scene = Scene::new(&context, bounds, session.colors().clone());

        let (updater, receiver) = Updater::from_event_loop_proxy(event_loop_proxy);
        let loader = AssetLoader::new(assets_root, updater);
        for request in session.start() {
            loader.load(request);
        }

        let gui = Gui::new(&context, controls);

        Self {
            control,
            camera,
            framed: bounds,
            scene,
            session,
            loader,
            receiver,
            gui,
        }
    }

    /// Handles events for the given frame input.
    fn handle_events(&mut self, mut frame_input: FrameInput) -> FrameOutput {
        let is_loading = self.session.is_loading();
        let commands = self.gui.update(&mut frame_input, is_loading);
        for command in commands {
            self.handle_command(command);
        }

        #[allow(clippy::cast_possible_truncation)]
        let viewport = Viewport {
            x: (Gui::SIDE_PANEL_WIDTH * frame_input.device_pixel_ratio) as i32,
            y: 0,
            #[allow(clippy::cast_sign_loss)]
            width: frame_input.viewport.width
                - (Gui::SIDE_PANEL_WIDTH * frame_input.device_pixel_ratio) as u32,
            height: frame_input.viewport.height,
        };
        self.camera.set_viewport(viewport);
        self.control
            .handle_events(&mut self.camera, &mut frame_input.events);

        // Allow translating the camera sideways when holding right mouse button
        for event in &mut frame_input.events {
            if let three_d::Event::MouseMotion { button, delta, .. } = event {
                if *button == Some(MouseButton::Right) {
                    let right = self.camera.right_direction().normalize();
                    let up = right.cross(self.camera.view_direction());
                    let translation = -delta.0 * right + delta.1 * up;
                    let speed = 0.001 * self.camera.position().magnitude();

                    self.camera.translate(speed * translation);
                }
            }
        }

        let updates: Vec<_> = self.receiver.try_iter().collect();
        for update in updates {
            self.handle_update(update);
        }

        if self.session.take_dirty() {
            self.scene.sync(&frame_input.context, &self.session);
            self.gui.controls_mut().sync(&self.session);
            self.reframe(self.session.scene_bounds());
        }

        // Render scene and GUI
        let screen = frame_input.screen();
        self.scene.render(&self.camera, &screen);
        self.gui.render(&screen);

        FrameOutput {
            wait_next_event: !self.session.is_loading(),
            ..Default::default()
        }
    }

    /// Moves the camera target to the center of new bounds, keeping the viewing direction.
    fn reframe(&mut self, bounds: Option<Bounds>) {
        if bounds == self.framed {
            return;
        }
        self.framed = bounds;

        let (target, distance) = framing(bounds);
        let direction = (self.camera.position() - self.camera.target()).normalize();
        self.camera
            .set_view(target + direction * distance, target, Vec3::unit_y());
        self.control = OrbitControl::new(target, 0.1 * distance, 10.0 * distance);
    }

    /// Applies a command issued in the GUI to the session.
    fn handle_command(&mut self, command: Command) {
        let result = match command {
            Command::SetVariant(side, option) => {
                self.session.set_variant(side, option).map(|change| {
                    if let VariantChange::Structural(requests) = change {
                        for request in requests {
                            self.loader.load(request);
                        }
                    }
                })
            }
            Command::SetBottomCase(bottom_case) => {
                self.session.set_bottom_case(bottom_case);
                Ok(())
            }
            Command::SetRightShift(width) => self.session.set_right_shift(width).map(drop),
            Command::SetMountingAngle(side, angle) => {
                self.session.set_mounting_angle(side, angle).map(drop)
            }
            Command::SetColors(colors) => {
                self.session.set_colors(colors);
                Ok(())
            }
        };

        if let Err(error) = result {
            error!("{error}");
        }
    }

    /// Applies a finished asset load to the session.
    fn handle_update(&mut self, update: Update) {
        match update {
            Update::Loaded(request, result) => {
                if let Err(error) = self.session.complete(&request, result) {
                    error!("Failed to apply `{}`: {error}", request.path);
                }
            }
        }
    }
}

/// Returns the camera target and distance showing the given bounds.
fn framing(bounds: Option<Bounds>) -> (Vec3, f32) {
    const DEFAULT_DISTANCE: f32 = 3.0;

    bounds.map_or((vec3(0.0, 0.0, 0.0), DEFAULT_DISTANCE), |bounds| {
        let center = bounds.center();
        (
            vec3(center.x, center.y, center.z),
            (1.6 * bounds.diameter()).max(0.1),
        )
    })
}
