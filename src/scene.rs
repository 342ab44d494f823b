use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use log::warn;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::model::LoadedModel;

/// Stable identity of an interactive object inside a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(usize);

impl ObjectId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Two-state highlight model applied to interactive objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HighlightState {
    #[default]
    Default,
    Highlighted,
}

impl HighlightState {
    pub fn label(self) -> &'static str {
        match self {
            HighlightState::Default => "default",
            HighlightState::Highlighted => "highlighted",
        }
    }
}

/// Colors used for each highlight state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub default: Vec3,
    pub highlighted: Vec3,
}

impl Palette {
    pub fn color(&self, state: HighlightState) -> Vec3 {
        match state {
            HighlightState::Default => self.default,
            HighlightState::Highlighted => self.highlighted,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            default: Vec3::new(1.0, 0.0, 0.0),
            highlighted: Vec3::new(0.0, 0.0, 1.0),
        }
    }
}

/// Vertical bobbing: `y = origin.y + sin(elapsed * speed) * amplitude`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bob {
    pub speed: f32,
    pub amplitude: f32,
}

impl Bob {
    pub fn offset(&self, elapsed: f32) -> f32 {
        (elapsed * self.speed).sin() * self.amplitude
    }
}

/// Sphere the pointer ray is tested against every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveObject {
    pub id: ObjectId,
    pub name: String,
    /// Rest position; animation offsets are applied relative to it.
    pub origin: Vec3,
    pub position: Vec3,
    pub radius: f32,
    pub state: HighlightState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bob: Option<Bob>,
}

impl InteractiveObject {
    pub fn new(id: ObjectId, name: impl Into<String>, position: Vec3, radius: f32) -> Self {
        Self {
            id,
            name: name.into(),
            origin: position,
            position,
            radius,
            state: HighlightState::Default,
            bob: None,
        }
    }

    pub fn with_bob(mut self, bob: Bob) -> Self {
        self.bob = Some(bob);
        self
    }

    /// Moves the object along its bobbing path, if it has one.
    pub fn animate(&mut self, elapsed: f32) {
        if let Some(bob) = self.bob {
            self.position.y = self.origin.y + bob.offset(elapsed);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    /// The light shines from this point towards the origin.
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lights {
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
}

impl Default for Lights {
    fn default() -> Self {
        Self {
            ambient: AmbientLight {
                color: Vec3::ONE,
                intensity: 0.3,
            },
            directional: DirectionalLight {
                color: Vec3::ONE,
                intensity: 0.7,
                position: Vec3::new(1.0, 2.0, 3.0),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphereDesc {
    pub name: String,
    pub position: Vec3,
    pub radius: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bob: Option<Bob>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraDesc {
    pub position: Vec3,
    pub target: Vec3,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraDesc {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            fov: 75.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Model that is loaded in the background once the scene is up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDesc {
    pub name: String,
    pub mesh: PathBuf,
    pub position: Vec3,
    pub color: Vec3,
}

/// Everything needed to build a [`Scene`], either the built-in demo or a
/// scene XML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    pub spheres: Vec<SphereDesc>,
    pub camera: CameraDesc,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelDesc>,
    pub lights: Lights,
    pub palette: Palette,
}

impl Default for SceneDescription {
    /// Three bobbing spheres in a row, a camera three units back and a model
    /// resting below the middle sphere.
    fn default() -> Self {
        let sphere = |name: &str, x: f32, speed: f32| SphereDesc {
            name: name.to_string(),
            position: Vec3::new(x, 0.0, 0.0),
            radius: 0.5,
            bob: Some(Bob {
                speed,
                amplitude: 1.5,
            }),
        };
        Self {
            spheres: vec![
                sphere("Left", -2.0, 0.3),
                sphere("Middle", 0.0, 0.8),
                sphere("Right", 2.0, 1.4),
            ],
            camera: CameraDesc::default(),
            model: Some(ModelDesc {
                name: "Gem".to_string(),
                mesh: Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/models/gem.obj"),
                position: Vec3::new(0.0, -1.2, 0.0),
                color: Vec3::new(1.0, 0.8, 0.2),
            }),
            lights: Lights::default(),
            palette: Palette::default(),
        }
    }
}

impl SceneDescription {
    /// Parses a scene XML document.
    ///
    /// Objects missing from the document fall back to the demo defaults for
    /// the camera, lights and palette; spheres and the model only exist when
    /// they are listed.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let defaults = Self::default();
        let mut description = Self {
            spheres: Vec::new(),
            camera: defaults.camera,
            model: None,
            lights: defaults.lights,
            palette: defaults.palette,
        };

        for node in document.descendants().filter(|n| n.has_tag_name("object")) {
            let name = required_text(&node, "name")?;
            let kind = optional_text(&node, "type").unwrap_or_else(|| "sphere".to_string());
            match kind.as_str() {
                "sphere" => {
                    let position = parse_vec3(optional_text(&node, "position"), Vec3::ZERO)
                        .with_context(|| format!("sphere {name} has an invalid position"))?;
                    let radius = parse_f32(optional_text(&node, "radius"), 0.5)?;
                    if radius <= 0.0 {
                        return Err(anyhow!("sphere {name} must have a positive radius"));
                    }
                    let bob = parse_bob(optional_text(&node, "bob"))
                        .with_context(|| format!("sphere {name} has an invalid bob"))?;
                    description.spheres.push(SphereDesc {
                        name,
                        position,
                        radius,
                        bob,
                    });
                }
                "camera" => {
                    let camera = &mut description.camera;
                    camera.position = parse_vec3(optional_text(&node, "position"), camera.position)?;
                    camera.target = parse_vec3(optional_text(&node, "target"), camera.target)?;
                    camera.fov = parse_f32(optional_text(&node, "fov"), camera.fov)?;
                    camera.near = parse_f32(optional_text(&node, "near"), camera.near)?;
                    camera.far = parse_f32(optional_text(&node, "far"), camera.far)?;
                }
                "model" => {
                    let mesh = required_text(&node, "mesh")?;
                    description.model = Some(ModelDesc {
                        name,
                        mesh: PathBuf::from(mesh),
                        position: parse_vec3(optional_text(&node, "position"), Vec3::ZERO)?,
                        color: parse_color(optional_text(&node, "color"), Vec3::ONE)?,
                    });
                }
                "ambient_light" => {
                    let light = &mut description.lights.ambient;
                    light.color = parse_color(optional_text(&node, "color"), light.color)?;
                    light.intensity = parse_f32(optional_text(&node, "intensity"), light.intensity)?;
                }
                "directional_light" => {
                    let light = &mut description.lights.directional;
                    light.color = parse_color(optional_text(&node, "color"), light.color)?;
                    light.intensity = parse_f32(optional_text(&node, "intensity"), light.intensity)?;
                    light.position = parse_vec3(optional_text(&node, "position"), light.position)?;
                }
                other => warn!("skipping object {name} with unknown type {other}"),
            }
        }

        if let Some(palette) = document.descendants().find(|n| n.has_tag_name("palette")) {
            let palette_colors = &mut description.palette;
            palette_colors.default =
                parse_color(optional_text(&palette, "default"), palette_colors.default)?;
            palette_colors.highlighted =
                parse_color(optional_text(&palette, "highlighted"), palette_colors.highlighted)?;
        }

        Ok(description)
    }

    /// Makes a relative model path relative to `base` instead of the working
    /// directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(model) = self.model.as_mut() {
            if model.mesh.is_relative() {
                model.mesh = base.join(&model.mesh);
            }
        }
    }
}

/// The scene host: interactive objects, camera, lights and the model slot.
#[derive(Debug, Clone)]
pub struct Scene {
    pub objects: Vec<InteractiveObject>,
    pub camera: Camera,
    /// Absent until the background load completes.
    pub model: Option<LoadedModel>,
    pub lights: Lights,
    pub palette: Palette,
}

impl Scene {
    pub fn new(objects: Vec<InteractiveObject>, camera: Camera) -> Self {
        Self {
            objects,
            camera,
            model: None,
            lights: Lights::default(),
            palette: Palette::default(),
        }
    }

    /// Builds the runtime scene. The model is not part of it yet; see
    /// [`crate::model::spawn_model_load`].
    pub fn from_description(description: &SceneDescription, aspect: f32) -> Self {
        let objects = description
            .spheres
            .iter()
            .enumerate()
            .map(|(index, sphere)| InteractiveObject {
                bob: sphere.bob,
                ..InteractiveObject::new(
                    ObjectId::new(index),
                    sphere.name.clone(),
                    sphere.position,
                    sphere.radius,
                )
            })
            .collect();
        let desc = description.camera;
        let mut camera = Camera::new(desc.position, desc.target, desc.fov, aspect);
        camera.near = desc.near;
        camera.far = desc.far;

        Self {
            objects,
            camera,
            model: None,
            lights: description.lights,
            palette: description.palette,
        }
    }

    pub fn object(&self, id: ObjectId) -> Option<&InteractiveObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    pub fn object_by_name(&self, name: &str) -> Option<&InteractiveObject> {
        self.objects.iter().find(|object| object.name == name)
    }

    pub fn color_of(&self, object: &InteractiveObject) -> Vec3 {
        self.palette.color(object.state)
    }

    pub fn highlighted(&self) -> impl Iterator<Item = &InteractiveObject> {
        self.objects
            .iter()
            .filter(|object| object.state == HighlightState::Highlighted)
    }
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components<const N: usize>(value: &str, what: &str) -> Result<[f32; N]> {
    let mut components = [0.0; N];
    let mut numbers = value.split_whitespace();
    for component in components.iter_mut() {
        let number = numbers
            .next()
            .ok_or_else(|| anyhow!("{what} is missing components"))?;
        *component = number
            .parse::<f32>()
            .map_err(|err| anyhow!("{what} component {number:?}: {err}"))?;
    }
    Ok(components)
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => parse_components::<3>(&value, "vector").map(Vec3::from_array),
        None => Ok(default),
    }
}

/// Colors are written as three 0-255 channels.
fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => parse_components::<3>(&value, "color").map(|[r, g, b]| {
            Vec3::new(r / 255.0, g / 255.0, b / 255.0)
        }),
        None => Ok(default),
    }
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

/// `<bob>speed amplitude</bob>`
fn parse_bob(value: Option<String>) -> Result<Option<Bob>> {
    value
        .map(|value| {
            parse_components::<2>(&value, "bob").map(|[speed, amplitude]| Bob { speed, amplitude })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <scene>
        <object>
            <name>Camera</name>
            <type>camera</type>
            <position>0 1 5</position>
            <fov>60</fov>
        </object>
        <object>
            <name>Ball</name>
            <position>1 0 0</position>
            <radius>0.25</radius>
            <bob>2 0.5</bob>
        </object>
        <object>
            <name>Duck</name>
            <type>model</type>
            <mesh>models/duck.obj</mesh>
            <position>0 -1.2 0</position>
            <color>255 128 0</color>
        </object>
        <object>
            <name>Sun</name>
            <type>directional_light</type>
            <intensity>0.9</intensity>
        </object>
        <palette>
            <default>0 255 0</default>
        </palette>
    </scene>
    "#;

    #[test]
    fn parse_scene_populates_spheres_camera_and_model() {
        let scene = SceneDescription::from_xml(SAMPLE).unwrap();
        assert_eq!(scene.spheres.len(), 1);
        let ball = &scene.spheres[0];
        assert_eq!(ball.name, "Ball");
        assert_eq!(ball.radius, 0.25);
        assert_eq!(
            ball.bob,
            Some(Bob {
                speed: 2.0,
                amplitude: 0.5
            })
        );
        assert_eq!(scene.camera.position, Vec3::new(0.0, 1.0, 5.0));
        assert_eq!(scene.camera.fov, 60.0);

        let model = scene.model.as_ref().unwrap();
        assert_eq!(model.mesh, PathBuf::from("models/duck.obj"));
        assert_eq!(model.color, Vec3::new(1.0, 128.0 / 255.0, 0.0));

        assert!((scene.lights.directional.intensity - 0.9).abs() < f32::EPSILON);
        assert_eq!(scene.lights.directional.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(scene.palette.default, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(scene.palette.highlighted, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<scene><object><type>sphere</type></object></scene>";
        assert!(SceneDescription::from_xml(bad).is_err());
    }

    #[test]
    fn short_vector_is_an_error() {
        let bad = "<scene><object><name>A</name><position>1 2</position></object></scene>";
        assert!(SceneDescription::from_xml(bad).is_err());
    }

    #[test]
    fn unknown_types_are_skipped() {
        let xml = "<scene><object><name>A</name><type>teapot</type></object></scene>";
        let scene = SceneDescription::from_xml(xml).unwrap();
        assert!(scene.spheres.is_empty());
        assert!(scene.model.is_none());
    }

    #[test]
    fn demo_scene_has_three_spheres_in_a_row() {
        let scene = Scene::from_description(&SceneDescription::default(), 1.0);
        let xs: Vec<f32> = scene.objects.iter().map(|o| o.position.x).collect();
        assert_eq!(xs, vec![-2.0, 0.0, 2.0]);
        assert!(scene.model.is_none());
        assert_eq!(scene.camera.position, Vec3::new(0.0, 0.0, 3.0));
        assert!(scene
            .objects
            .iter()
            .all(|o| o.state == HighlightState::Default));
        assert_eq!(scene.object(ObjectId::new(1)).unwrap().name, "Middle");
    }

    #[test]
    fn bobbing_is_relative_to_origin() {
        let mut object = InteractiveObject::new(ObjectId::new(0), "A", Vec3::new(0.0, 1.0, 0.0), 0.5)
            .with_bob(Bob {
                speed: 1.0,
                amplitude: 1.5,
            });
        object.animate(std::f32::consts::FRAC_PI_2);
        assert!((object.position.y - 2.5).abs() < 1e-5);
        assert_eq!(object.origin.y, 1.0);
    }

    #[test]
    fn model_paths_resolve_against_scene_directory() {
        let mut scene = SceneDescription::from_xml(SAMPLE).unwrap();
        scene.resolve_paths(Path::new("/scenes"));
        assert_eq!(
            scene.model.unwrap().mesh,
            PathBuf::from("/scenes/models/duck.obj")
        );
    }
}
