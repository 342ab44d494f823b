//! Pointer rays and the intersection tests run against them.
//!
//! Interactive objects are tested as analytic spheres. The loaded model is
//! tested triangle by triangle after a bounding box rejection, in the
//! model's local space.

use glam::{Mat4, Vec2, Vec3};

use crate::camera::Camera;
use crate::obj::ObjMesh;
use crate::scene::{InteractiveObject, ObjectId};

/// Half-line used for hit testing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Creates a ray; the direction is normalized.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Ray from the camera through `ndc` on the view plane.
    pub fn from_camera(ndc: Vec2, camera: &Camera) -> Self {
        let through = camera.unproject(ndc.extend(0.5));
        Self::new(camera.position, through - camera.position)
    }

    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Maps the ray through `matrix`.
    ///
    /// The direction keeps its transformed length so that distances found in
    /// the target space are still distances along the original ray.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            origin: matrix.transform_point3(self.origin),
            direction: matrix.transform_vector3(self.direction),
        }
    }

    /// Distance to the front surface of a sphere.
    ///
    /// Only outward-facing surfaces count, so a ray starting inside the
    /// sphere misses it.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let a = self.direction.length_squared();
        if a <= f32::EPSILON {
            return None;
        }
        let oc = self.origin - center;
        let half_b = oc.dot(self.direction);
        let c = oc.length_squared() - radius * radius;
        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let near = (-half_b - discriminant.sqrt()) / a;
        (near >= 0.0).then_some(near)
    }

    /// Möller–Trumbore test against a double-sided triangle.
    pub fn intersect_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < 1e-8 {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(q) * inv_det;
        (t >= 0.0).then_some(t)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |bounds, point| {
            Self::new(bounds.min.min(point), bounds.max.max(point))
        }))
    }

    /// Slab test; returns the entry distance (zero when the origin is inside).
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let inv = ray.direction.recip();
        let t0 = (self.min - ray.origin) * inv;
        let t1 = (self.max - ray.origin) * inv;
        let near = t0.min(t1).max_element();
        let far = t0.max(t1).min_element();
        (near <= far && far >= 0.0).then(|| near.max(0.0))
    }
}

/// One object crossed by the pointer ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub object: ObjectId,
    pub distance: f32,
    pub point: Vec3,
}

/// Tests `ray` against every object.
///
/// Hits are sorted nearest first; objects at equal distance keep their list
/// order.
pub fn intersect_objects(ray: &Ray, objects: &[InteractiveObject]) -> Vec<Hit> {
    let mut hits: Vec<Hit> = objects
        .iter()
        .filter_map(|object| {
            ray.intersect_sphere(object.position, object.radius)
                .map(|distance| Hit {
                    object: object.id,
                    distance,
                    point: ray.point_at(distance),
                })
        })
        .collect();
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}

/// Nearest distance at which `ray` crosses `mesh` placed with `transform`.
///
/// `bounds` is the mesh's local bounding box and is used to reject misses
/// before walking the triangles.
pub fn intersect_mesh(ray: &Ray, mesh: &ObjMesh, bounds: &Aabb, transform: Mat4) -> Option<f32> {
    let local = ray.transformed(&transform.inverse());
    bounds.intersect_ray(&local)?;
    mesh.triangles()
        .filter_map(|[a, b, c]| local.intersect_triangle(a, b, c))
        .min_by(|a, b| a.total_cmp(b))
}
