use std::fs;
use std::mem;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use log::{error, info};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::obj::{load_obj_from_str, ObjMesh};
use crate::raycast::{intersect_mesh, Aabb, Ray};
use crate::scene::ModelDesc;

/// Uniform scale of the model while the pointer ray touches it.
pub const HOVER_SCALE: f32 = 1.2;
/// Uniform scale of the model otherwise.
pub const REST_SCALE: f32 = 1.0;

/// Model mesh placed in the scene once its background load finished.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub name: String,
    pub mesh: ObjMesh,
    pub position: Vec3,
    pub color: Vec3,
    bounds: Option<Aabb>,
    scale: f32,
}

impl LoadedModel {
    pub fn new(name: impl Into<String>, mesh: ObjMesh, position: Vec3, color: Vec3) -> Self {
        let bounds = mesh.bounds();
        Self {
            name: name.into(),
            mesh,
            position,
            color,
            bounds,
            scale: REST_SCALE,
        }
    }

    /// Current scale, always equal on all three axes.
    pub fn scale(&self) -> Vec3 {
        Vec3::splat(self.scale)
    }

    pub fn set_hovered(&mut self, hovered: bool) {
        self.scale = if hovered { HOVER_SCALE } else { REST_SCALE };
    }

    pub fn is_hovered(&self) -> bool {
        self.scale == HOVER_SCALE
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale(), Quat::IDENTITY, self.position)
    }

    /// Distance along `ray` to the model as currently placed and scaled.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let bounds = self.bounds.as_ref()?;
        intersect_mesh(ray, &self.mesh, bounds, self.transform())
    }
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("unable to read model {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Reads and parses the model described by `desc`, on the calling thread.
pub fn load_model(desc: &ModelDesc) -> Result<LoadedModel, ModelLoadError> {
    let path = desc.mesh.display().to_string();
    let contents = fs::read_to_string(&desc.mesh).map_err(|source| ModelLoadError::Io {
        path: path.clone(),
        source,
    })?;
    let mesh = load_obj_from_str(&contents).map_err(|err| ModelLoadError::Parse {
        path,
        reason: format!("{err:#}"),
    })?;
    Ok(LoadedModel::new(desc.name.clone(), mesh, desc.position, desc.color))
}

/// Starts loading `desc` on a background thread.
///
/// The returned slot is filled once; a failed load is logged and leaves the
/// slot empty for good.
pub fn spawn_model_load(desc: ModelDesc) -> Result<PendingModel> {
    let pending = PendingModel::with_state(SlotState::Loading);
    let slot = pending.clone();
    thread::Builder::new()
        .name("model-loader".to_string())
        .spawn(move || {
            let result = load_model(&desc);
            match &result {
                Ok(model) => info!(
                    "loaded model {} ({} triangles)",
                    model.name,
                    model.mesh.triangle_count()
                ),
                Err(err) => error!("{err}"),
            }
            slot.resolve(result);
        })
        .context("failed to spawn model loader thread")?;
    Ok(pending)
}

#[derive(Debug)]
enum SlotState {
    /// No model was requested.
    Absent,
    Loading,
    Ready(LoadedModel),
    Taken,
    Failed,
}

#[derive(Debug)]
struct Slot {
    state: Mutex<SlotState>,
    settled: Condvar,
}

/// One-shot result slot for a model that is loading in the background.
///
/// The frame loop polls it with [`PendingModel::take_ready`], which never
/// blocks on the load itself.
#[derive(Debug, Clone)]
pub struct PendingModel {
    slot: Arc<Slot>,
}

impl PendingModel {
    /// A slot that never yields a model.
    pub fn none() -> Self {
        Self::with_state(SlotState::Absent)
    }

    /// A slot that already holds `model`.
    pub fn ready(model: LoadedModel) -> Self {
        Self::with_state(SlotState::Ready(model))
    }

    fn with_state(state: SlotState) -> Self {
        Self {
            slot: Arc::new(Slot {
                state: Mutex::new(state),
                settled: Condvar::new(),
            }),
        }
    }

    fn resolve(&self, result: Result<LoadedModel, ModelLoadError>) {
        let mut state = self.slot.state.lock();
        *state = match result {
            Ok(model) => SlotState::Ready(model),
            Err(_) => SlotState::Failed,
        };
        self.slot.settled.notify_all();
    }

    /// Hands out the model if it finished loading and was not taken yet.
    pub fn take_ready(&self) -> Option<LoadedModel> {
        let mut state = self.slot.state.lock();
        match mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Ready(model) => Some(model),
            other => {
                *state = other;
                None
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.slot.state.lock(), SlotState::Loading)
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.slot.state.lock(), SlotState::Failed)
    }

    /// Blocks until the load settles or `timeout` passes.
    ///
    /// Returns `false` on timeout. Only meant for headless drivers before
    /// their first frame.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.state.lock();
        while matches!(*state, SlotState::Loading) {
            if self.slot.settled.wait_until(&mut state, deadline).timed_out() {
                return !matches!(*state, SlotState::Loading);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    const TETRA: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 0 0 1\nf 1 3 2\nf 1 2 4\nf 1 4 3\nf 2 3 4\n";

    fn desc(path: PathBuf) -> ModelDesc {
        ModelDesc {
            name: "Tetra".to_string(),
            mesh: path,
            position: Vec3::new(0.0, -1.2, 0.0),
            color: Vec3::ONE,
        }
    }

    #[test]
    fn hover_scale_is_binary() {
        let mesh = load_obj_from_str(TETRA).unwrap();
        let mut model = LoadedModel::new("Tetra", mesh, Vec3::ZERO, Vec3::ONE);
        assert_eq!(model.scale(), Vec3::ONE);
        model.set_hovered(true);
        assert_eq!(model.scale(), Vec3::splat(1.2));
        assert!(model.is_hovered());
        model.set_hovered(false);
        assert_eq!(model.scale(), Vec3::ONE);
    }

    #[test]
    fn background_load_fills_slot_once() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TETRA.as_bytes()).unwrap();
        let pending = spawn_model_load(desc(file.path().to_path_buf())).unwrap();
        assert!(pending.wait(Duration::from_secs(5)));

        let model = pending.take_ready().expect("model should be ready");
        assert_eq!(model.name, "Tetra");
        assert_eq!(model.position, Vec3::new(0.0, -1.2, 0.0));
        assert_eq!(model.mesh.triangle_count(), 4);
        assert!(pending.take_ready().is_none());
    }

    #[test]
    fn missing_file_leaves_slot_failed() {
        let pending = spawn_model_load(desc(PathBuf::from("/nonexistent/model.obj"))).unwrap();
        assert!(pending.wait(Duration::from_secs(5)));
        assert!(pending.is_failed());
        assert!(pending.take_ready().is_none());
    }

    #[test]
    fn parse_errors_are_typed() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"f 1 2 3\n").unwrap();
        let err = load_model(&desc(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ModelLoadError::Parse { .. }));
    }

    #[test]
    fn empty_slot_never_yields() {
        let pending = PendingModel::none();
        assert!(!pending.is_loading());
        assert!(pending.wait(Duration::from_millis(1)));
        assert!(pending.take_ready().is_none());
    }
}
