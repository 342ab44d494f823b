use glam::{Mat4, Quat, Vec3};

use crate::camera::Camera;
use crate::scene::{Lights, Scene};

/// Radius of the shared sphere mesh; objects scale it to their own radius.
pub(crate) const SPHERE_RADIUS: f32 = 0.5;
pub(crate) const SPHERE_SEGMENTS: u32 = 16;

/// Camera parameters consumed by the renderer's uniform buffer.
#[derive(Clone, Debug)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

impl CameraParams {
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view_proj: camera.view_proj(),
            position: camera.position,
        }
    }
}

/// Lighting state consumed by the renderer's uniform buffer.
#[derive(Clone, Debug)]
pub struct LightParams {
    /// Ambient color premultiplied by its intensity.
    pub ambient: Vec3,
    /// Unit vector pointing from the scene towards the directional light.
    pub to_light: Vec3,
    /// Directional color premultiplied by its intensity.
    pub color: Vec3,
}

impl LightParams {
    pub fn from_lights(lights: &Lights) -> Self {
        Self {
            ambient: lights.ambient.color * lights.ambient.intensity,
            to_light: lights.directional.position.normalize_or_zero(),
            color: lights.directional.color * lights.directional.intensity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshRef {
    Sphere,
    Model,
}

/// One draw call worth of per-object state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshRef,
    pub model: Mat4,
    pub color: Vec3,
    /// Unlit items ignore the scene lights and show their flat color.
    pub lit: bool,
}

/// Flattens the scene into draw calls: every sphere with its highlight
/// color, then the model once it is loaded.
pub fn draw_list(scene: &Scene) -> Vec<DrawItem> {
    let mut items: Vec<DrawItem> = scene
        .objects
        .iter()
        .map(|object| DrawItem {
            mesh: MeshRef::Sphere,
            model: Mat4::from_scale_rotation_translation(
                Vec3::splat(object.radius / SPHERE_RADIUS),
                Quat::IDENTITY,
                object.position,
            ),
            color: scene.color_of(object),
            lit: false,
        })
        .collect();

    if let Some(model) = scene.model.as_ref() {
        items.push(DrawItem {
            mesh: MeshRef::Model,
            model: model.transform(),
            color: model.color,
            lit: true,
        });
    }
    items
}

pub(crate) const SHADER: &str = r#"
struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    ambient: vec4<f32>,
    to_light: vec4<f32>,
    light_color: vec4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    // w > 0.5 enables lighting
    color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;
    out.normal = normalize(world_normal);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var lighting = vec3<f32>(1.0, 1.0, 1.0);
    if (object.color.w > 0.5) {
        let diffuse = max(dot(normalize(input.normal), globals.to_light.xyz), 0.0);
        lighting = globals.ambient.rgb + diffuse * globals.light_color.rgb;
    }
    return vec4<f32>(object.color.rgb * lighting, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LoadedModel;
    use crate::obj::load_obj_from_str;
    use crate::scene::{HighlightState, SceneDescription};

    #[test]
    fn draw_list_uses_palette_colors() {
        let mut scene = Scene::from_description(&SceneDescription::default(), 1.0);
        scene.objects[1].state = HighlightState::Highlighted;
        let items = draw_list(&scene);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].color, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(items[1].color, Vec3::new(0.0, 0.0, 1.0));
        assert!(items.iter().all(|item| !item.lit && item.mesh == MeshRef::Sphere));
    }

    #[test]
    fn loaded_model_is_drawn_lit_with_its_scale() {
        let mut scene = Scene::from_description(&SceneDescription::default(), 1.0);
        let mesh = load_obj_from_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let mut model = LoadedModel::new("tri", mesh, Vec3::new(0.0, -1.2, 0.0), Vec3::ONE);
        model.set_hovered(true);
        scene.model = Some(model);

        let item = *draw_list(&scene).last().unwrap();
        assert_eq!(item.mesh, MeshRef::Model);
        assert!(item.lit);
        let (scale, _, translation) = item.model.to_scale_rotation_translation();
        assert!((scale - Vec3::splat(1.2)).length() < 1e-5);
        assert!((translation - Vec3::new(0.0, -1.2, 0.0)).length() < 1e-5);
    }

    #[test]
    fn lights_are_premultiplied() {
        let light = LightParams::from_lights(&Lights::default());
        assert!((light.ambient - Vec3::splat(0.3)).length() < 1e-6);
        assert!((light.color - Vec3::splat(0.7)).length() < 1e-6);
        assert!((light.to_light.length() - 1.0).abs() < 1e-6);
    }
}
