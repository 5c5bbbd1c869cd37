use std::f32::consts::PI;

use crate::data_structures::model::{Geometry, ModelVertex};

/**
 * Reads the vertex and index data of one glTF primitive.
 *
 * Returns `None` for primitives without positions. Primitives without an
 * index accessor are drawn as a plain triangle list.
 */
pub fn read_primitive(
    primitive: &gltf::Primitive,
    buf: &[Vec<u8>],
    label: &str,
) -> Option<Geometry> {
    let reader = primitive.reader(|buffer| buf.get(buffer.index()).map(Vec::as_slice));

    let mut vertices: Vec<ModelVertex> = reader
        .read_positions()?
        .map(|position| ModelVertex {
            position,
            ..Default::default()
        })
        .collect();

    if let Some(normal_attribute) = reader.read_normals() {
        vertices
            .iter_mut()
            .zip(normal_attribute)
            .for_each(|(vertex, normal)| vertex.normal = normal);
    }
    if let Some(tex_coord_attribute) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
        vertices
            .iter_mut()
            .zip(tex_coord_attribute)
            .for_each(|(vertex, tex_coords)| vertex.tex_coords = tex_coords);
    }

    let indices = match reader.read_indices() {
        Some(indices_raw) => indices_raw.into_u32().collect::<Vec<u32>>(),
        None => (0..vertices.len() as u32).collect(),
    };

    Some(Geometry::new(label, vertices, indices))
}

/**
 * A closed cylinder around the Y axis, centered on the origin.
 *
 * `segments` is clamped to at least 3.
 */
pub fn cylinder(label: &str, radius: f32, height: f32, segments: u32) -> Geometry {
    let segments = segments.max(3);
    let half = height / 2.0;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // side: two rings with outward normals, the seam vertex is duplicated for uv continuity
    for ring in 0..2 {
        let y = if ring == 0 { half } else { -half };
        for s in 0..=segments {
            let u = s as f32 / segments as f32;
            let theta = u * 2.0 * PI;
            let (sin, cos) = theta.sin_cos();
            vertices.push(ModelVertex {
                position: [radius * sin, y, radius * cos],
                tex_coords: [u, ring as f32],
                normal: [sin, 0.0, cos],
            });
        }
    }
    let stride = segments + 1;
    for s in 0..segments {
        let (a, b) = (s, s + 1);
        let (c, d) = (s + stride, s + 1 + stride);
        indices.extend_from_slice(&[a, c, b, b, c, d]);
    }

    // caps: a center vertex plus a ring per cap
    for (y, ny) in [(half, 1.0f32), (-half, -1.0f32)] {
        let center = vertices.len() as u32;
        vertices.push(ModelVertex {
            position: [0.0, y, 0.0],
            tex_coords: [0.5, 0.5],
            normal: [0.0, ny, 0.0],
        });
        for s in 0..segments {
            let theta = s as f32 / segments as f32 * 2.0 * PI;
            let (sin, cos) = theta.sin_cos();
            vertices.push(ModelVertex {
                position: [radius * sin, y, radius * cos],
                tex_coords: [0.5 + sin * 0.5, 0.5 + cos * 0.5],
                normal: [0.0, ny, 0.0],
            });
        }
        for s in 0..segments {
            let current = center + 1 + s;
            let next = center + 1 + (s + 1) % segments;
            if ny > 0.0 {
                indices.extend_from_slice(&[center, current, next]);
            } else {
                indices.extend_from_slice(&[center, next, current]);
            }
        }
    }

    Geometry::new(label, vertices, indices)
}

/// An axis-aligned cube with edge length `size`, centered on the origin.
pub fn cube(label: &str, size: f32) -> Geometry {
    let h = size / 2.0;
    // (normal, u axis, v axis) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0f32, -1.0f32), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = [
                (normal[0] + su * u[0] + sv * v[0]) * h,
                (normal[1] + su * u[1] + sv * v[1]) * h,
                (normal[2] + su * u[2] + sv * v[2]) * h,
            ];
            vertices.push(ModelVertex {
                position,
                tex_coords: [(su + 1.0) / 2.0, (1.0 - sv) / 2.0],
                normal,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    Geometry::new(label, vertices, indices)
}
