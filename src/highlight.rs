//! Per-frame hover detection and highlighting.
//!
//! Every frame the pointer ray is tested against the interactive objects and
//! the optional model. Two things are derived from the hits:
//!
//! - colors: every object crossed by the ray is highlighted, every other one
//!   goes back to its default color;
//! - enter/leave edges: only the first object hit after an empty frame is
//!   tracked, and the edge fires again only once the ray hits nothing.
//!
//! The two rules are deliberately independent. When several objects are hit
//! all of them light up while tracking keeps following a single one.

use glam::Vec2;
use log::info;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::model::LoadedModel;
use crate::raycast::{intersect_objects, Hit, Ray};
use crate::scene::{HighlightState, InteractiveObject, ObjectId};

/// Edge emitted when the pointer ray starts or stops touching objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoverEvent {
    Enter(ObjectId),
    Leave(ObjectId),
}

/// Outcome of one controller frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Objects crossed by the ray, nearest first.
    pub hits: Vec<Hit>,
    pub events: Vec<HoverEvent>,
    /// `None` while no model is loaded.
    pub model_hovered: Option<bool>,
}

/// Hover state carried across frames.
#[derive(Debug, Clone, Default)]
pub struct HoverController {
    tracked: Option<ObjectId>,
}

impl HoverController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The object remembered for enter/leave detection, if any.
    pub fn tracked(&self) -> Option<ObjectId> {
        self.tracked
    }

    /// Casts the pointer ray from `camera` through `pointer` (NDC) and
    /// updates highlight state.
    pub fn update(
        &mut self,
        pointer: Vec2,
        camera: &Camera,
        objects: &mut [InteractiveObject],
        model: Option<&mut LoadedModel>,
    ) -> FrameReport {
        let ray = Ray::from_camera(pointer, camera);
        self.update_with_ray(&ray, objects, model)
    }

    /// Same as [`HoverController::update`] with an already built ray.
    pub fn update_with_ray(
        &mut self,
        ray: &Ray,
        objects: &mut [InteractiveObject],
        model: Option<&mut LoadedModel>,
    ) -> FrameReport {
        let hits = intersect_objects(ray, objects);

        let model_hovered = model.map(|model| {
            let hovered = model.intersect(ray).is_some();
            model.set_hovered(hovered);
            hovered
        });

        let mut events = Vec::new();
        match (hits.first(), self.tracked) {
            (Some(first), None) => {
                info!("mouse enter {}", object_name(objects, first.object));
                self.tracked = Some(first.object);
                events.push(HoverEvent::Enter(first.object));
            }
            (None, Some(previous)) => {
                info!("mouse leave {}", object_name(objects, previous));
                if let Some(object) = objects.iter_mut().find(|object| object.id == previous) {
                    object.state = HighlightState::Default;
                }
                self.tracked = None;
                events.push(HoverEvent::Leave(previous));
            }
            _ => {}
        }

        for object in objects.iter_mut() {
            object.state = if hits.iter().any(|hit| hit.object == object.id) {
                HighlightState::Highlighted
            } else {
                HighlightState::Default
            };
        }

        FrameReport {
            hits,
            events,
            model_hovered,
        }
    }
}

fn object_name(objects: &[InteractiveObject], id: ObjectId) -> &str {
    objects
        .iter()
        .find(|object| object.id == id)
        .map(|object| object.name.as_str())
        .unwrap_or("?")
}
