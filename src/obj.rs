use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::raycast::Aabb;

/// Position and normal of a single mesh vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Indexed triangle mesh.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjMesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl ObjMesh {
    /// Vertex data laid out as `position.xyz` followed by `normal.xyz`.
    pub fn interleaved(&self) -> Vec<f32> {
        self.vertices
            .iter()
            .flat_map(|vertex| {
                let [px, py, pz] = vertex.position.to_array();
                let [nx, ny, nz] = vertex.normal.to_array();
                [px, py, pz, nx, ny, nz]
            })
            .collect()
    }

    /// Bounding box of all vertices, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|vertex| vertex.position))
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |triangle| {
            [
                self.vertices[triangle[0] as usize].position,
                self.vertices[triangle[1] as usize].position,
                self.vertices[triangle[2] as usize].position,
            ]
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Parses an OBJ document held in memory.
///
/// Only `v`, `vn` and `f` records are used; polygons are fanned into
/// triangles. Vertices without a normal get a smoothed face normal.
pub fn load_obj_from_str(data: &str) -> Result<ObjMesh> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut corners: Vec<Corner> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let line_no = line_no + 1;
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => positions.push(
                parse_vec3(parts).with_context(|| format!("invalid vertex on line {line_no}"))?,
            ),
            Some("vn") => normals.push(
                parse_vec3(parts).with_context(|| format!("invalid normal on line {line_no}"))?,
            ),
            Some("f") => {
                let polygon = parts
                    .map(parse_corner)
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("invalid face on line {line_no}"))?;
                if polygon.len() < 3 {
                    return Err(anyhow!(
                        "face on line {line_no} references fewer than 3 vertices"
                    ));
                }
                for i in 1..polygon.len() - 1 {
                    corners.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let mut mesh = ObjMesh::default();
    let mut lookup: HashMap<(usize, Option<usize>), u32> = HashMap::new();
    let mut missing_normals = false;
    for corner in corners {
        let position = resolve_index(corner.position, positions.len())
            .ok_or_else(|| anyhow!("vertex index {} is out of range", corner.position))?;
        let normal = corner
            .normal
            .map(|index| {
                resolve_index(index, normals.len())
                    .ok_or_else(|| anyhow!("normal index {index} is out of range"))
            })
            .transpose()?;
        missing_normals |= normal.is_none();
        let index = *lookup.entry((position, normal)).or_insert_with(|| {
            mesh.vertices.push(MeshVertex {
                position: positions[position],
                normal: normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO),
            });
            (mesh.vertices.len() - 1) as u32
        });
        mesh.indices.push(index);
    }

    if missing_normals {
        smooth_missing_normals(&mut mesh);
    }
    Ok(mesh)
}

#[derive(Debug, Clone, Copy)]
struct Corner {
    position: i64,
    normal: Option<i64>,
}

/// Parses `v`, `v/vt`, `v//vn` or `v/vt/vn`.
fn parse_corner(token: &str) -> Result<Corner> {
    let mut segments = token.split('/');
    let position = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("missing vertex index in {token:?}"))?
        .parse::<i64>()?;
    let _texcoord = segments.next();
    let normal = match segments.next() {
        Some(s) if !s.is_empty() => Some(s.parse::<i64>()?),
        _ => None,
    };
    Ok(Corner { position, normal })
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut next = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(next()?, next()?, next()?))
}

/// OBJ indices are 1-based; negative values count back from the end.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    match index {
        0 => None,
        i if i > 0 => {
            let zero_based = (i - 1) as usize;
            (zero_based < len).then_some(zero_based)
        }
        i => {
            let back = i.unsigned_abs() as usize;
            (back <= len).then(|| len - back)
        }
    }
}

fn smooth_missing_normals(mesh: &mut ObjMesh) {
    let mut accum = vec![Vec3::ZERO; mesh.vertices.len()];
    for triangle in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let p0 = mesh.vertices[a].position;
        let normal = (mesh.vertices[b].position - p0).cross(mesh.vertices[c].position - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[a] += normal;
            accum[b] += normal;
            accum[c] += normal;
        }
    }

    for (vertex, normal) in mesh.vertices.iter_mut().zip(accum) {
        if vertex.normal == Vec3::ZERO {
            vertex.normal = normal.normalize_or_zero();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    #[test]
    fn parses_simple_triangle() {
        let mesh = load_obj_from_str(TRIANGLE).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.interleaved().len(), 18);
    }

    #[test]
    fn computes_missing_normals() {
        let mesh = load_obj_from_str(TRIANGLE).unwrap();
        for vertex in &mesh.vertices {
            assert!((vertex.normal - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn fans_quads_and_resolves_negative_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvn 0 0 1\nf -4//1 -3//1 -2//1 -1//1\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertices.len(), 4);
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        assert!(load_obj_from_str(obj).is_err());
    }

    #[test]
    fn rejects_out_of_range_normal_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//2\n";
        let err = load_obj_from_str(obj).unwrap_err();
        assert!(err.to_string().contains("normal index 2"));
    }

    #[test]
    fn rejects_empty_documents() {
        assert!(load_obj_from_str("# nothing here\n").is_err());
    }
}
