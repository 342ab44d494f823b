mod native;
mod shared;

pub use native::Renderer;
pub use shared::{draw_list, CameraParams, DrawItem, LightParams, MeshRef};
