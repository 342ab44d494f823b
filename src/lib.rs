//! Raycast hover highlighting for a small interactive 3D scene.
//!
//! A ray is cast from the camera through the pointer every frame. Spheres
//! crossed by the ray switch to the highlight color and the first one hit
//! after an empty frame is tracked for enter/leave events. A model loaded in
//! the background grows while the ray touches it.
//!
//! Everything except [`render`] runs without a window, so the binary's
//! headless mode and the tests drive the same [`app::DemoApp`] the windowed
//! loop does.

pub mod app;
pub mod camera;
pub mod frame;
pub mod geometry;
pub mod highlight;
pub mod input;
pub mod model;
pub mod obj;
pub mod raycast;
pub mod render;
pub mod scene;

pub use app::{final_state, print_final_state, DemoApp};
pub use camera::{Camera, OrbitControls};
pub use frame::{FixedStepper, FrameClock, FrameTask};
pub use highlight::{FrameReport, HoverController, HoverEvent};
pub use input::{InputState, MouseButton, PointerState, Viewport};
pub use model::{spawn_model_load, LoadedModel, ModelLoadError, PendingModel};
pub use obj::{load_obj_from_str, ObjMesh};
pub use raycast::{Hit, Ray};
pub use render::{CameraParams, LightParams, Renderer};
pub use scene::{
    HighlightState, InteractiveObject, ModelDesc, ObjectId, Palette, Scene, SceneDescription,
};
