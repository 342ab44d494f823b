use std::fmt::Write as _;

use glam::Vec2;
use log::info;

use crate::camera::OrbitControls;
use crate::frame::FrameTask;
use crate::highlight::{FrameReport, HoverController};
use crate::input::{InputState, MouseButton, PointerState, Viewport};
use crate::model::PendingModel;
use crate::render::{CameraParams, LightParams};
use crate::scene::Scene;

/// The running demo: scene, controls, pointer and hover state advanced one
/// frame per [`FrameTask::tick`].
#[derive(Debug)]
pub struct DemoApp {
    scene: Scene,
    controls: OrbitControls,
    viewport: Viewport,
    pointer: PointerState,
    input: InputState,
    hover: HoverController,
    pending_model: PendingModel,
    elapsed: f32,
    frames: u64,
    last_report: FrameReport,
}

impl DemoApp {
    pub fn new(mut scene: Scene, viewport: Viewport, pending_model: PendingModel) -> Self {
        scene.camera.set_viewport(viewport.width, viewport.height);
        Self {
            scene,
            controls: OrbitControls::new(),
            viewport,
            pointer: PointerState::new(),
            input: InputState::new(),
            hover: HoverController::new(),
            pending_model,
            elapsed: 0.0,
            frames: 0,
            last_report: FrameReport::default(),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn hover(&self) -> &HoverController {
        &self.hover
    }

    /// Result of the most recent frame.
    pub fn last_report(&self) -> &FrameReport {
        &self.last_report
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.resize(width, height);
        self.scene
            .camera
            .set_viewport(self.viewport.width, self.viewport.height);
    }

    /// Moves the raycast pointer to `position` (pixels).
    pub fn click(&mut self, position: Vec2) -> Vec2 {
        self.pointer.click(position, &self.viewport)
    }

    /// Tracks the cursor. Dragging with the left button held orbits the
    /// camera; the raycast pointer stays where it was last clicked.
    pub fn cursor_moved(&mut self, position: Vec2) {
        let delta = self.input.move_cursor(position);
        if self.input.is_down(MouseButton::LEFT) {
            self.controls
                .rotate_by_pixels(delta, self.viewport.height);
        }
    }

    pub fn mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            self.input.press(button);
        } else if self.input.release(button) && button == MouseButton::LEFT {
            let cursor = self.input.cursor();
            self.click(cursor);
        }
    }

    pub fn scroll(&mut self, steps: f32) {
        self.controls.zoom(steps);
    }

    pub fn camera_params(&self) -> CameraParams {
        CameraParams::from_camera(&self.scene.camera)
    }

    pub fn light_params(&self) -> LightParams {
        LightParams::from_lights(&self.scene.lights)
    }

    fn poll_model(&mut self) {
        if self.scene.model.is_some() {
            return;
        }
        if let Some(model) = self.pending_model.take_ready() {
            info!("model {} added to the scene", model.name);
            self.scene.model = Some(model);
        }
    }
}

impl FrameTask for DemoApp {
    fn tick(&mut self, dt: f32) {
        self.elapsed += dt;
        self.poll_model();

        let scene = &mut self.scene;
        let report = self.hover.update(
            self.pointer.ndc(),
            &scene.camera,
            &mut scene.objects,
            scene.model.as_mut(),
        );

        for object in scene.objects.iter_mut() {
            object.animate(self.elapsed);
        }
        self.controls.update(&mut scene.camera);

        self.frames += 1;
        self.last_report = report;
    }
}

/// Human readable summary of every object, the tracked reference and the
/// model.
pub fn final_state(app: &DemoApp) -> String {
    let scene = app.scene();
    let mut out = String::from("Final object states:\n");
    for object in &scene.objects {
        let color = scene.color_of(object);
        let _ = writeln!(
            out,
            " - {} pos=({:.2}, {:.2}, {:.2}) state={} color=({:.2}, {:.2}, {:.2})",
            object.name,
            object.position.x,
            object.position.y,
            object.position.z,
            object.state.label(),
            color.x,
            color.y,
            color.z
        );
    }

    let tracked = app
        .hover()
        .tracked()
        .and_then(|id| scene.object(id))
        .map_or("none", |object| object.name.as_str());
    let _ = writeln!(out, "Tracked: {tracked}");

    match scene.model.as_ref() {
        Some(model) => {
            let _ = writeln!(out, "Model {} scale={:.2}", model.name, model.scale().x);
        }
        None => out.push_str("Model: absent\n"),
    }
    out
}

pub fn print_final_state(app: &DemoApp) {
    print!("{}", final_state(app));
}
