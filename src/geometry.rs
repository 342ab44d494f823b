use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::obj::{MeshVertex, ObjMesh};

/// Latitude/longitude sphere centered on the origin.
///
/// `width_segments` splits the equator, `height_segments` the meridians.
/// The pole rows are fans, so no degenerate triangles are produced.
pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> ObjMesh {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let row_len = width_segments + 1;

    let mut mesh = ObjMesh::default();
    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let normal = Vec3::new(
                -(u * TAU).cos() * (v * PI).sin(),
                (v * PI).cos(),
                (u * TAU).sin() * (v * PI).sin(),
            );
            mesh.vertices.push(MeshVertex {
                position: normal * radius,
                normal,
            });
        }
    }

    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = iy * row_len + ix + 1;
            let b = iy * row_len + ix;
            let c = (iy + 1) * row_len + ix;
            let d = (iy + 1) * row_len + ix + 1;
            if iy != 0 {
                mesh.indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    mesh
}
