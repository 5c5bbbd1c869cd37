//! Mesh payloads: vertex data, geometry and materials.
//!
//! Geometry and materials are plain CPU data tagged with a [`ResourceId`]. GPU
//! buffers and textures derived from them are owned by a
//! [`GpuResources`](crate::context::GpuResources) implementation and keyed by
//! that id, so releasing a mesh only requires walking the scene graph.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::data_structures::{bounds::BoundingBox, texture::Texture};

/// Identifies a geometry, material or texture for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_resource_id() -> ResourceId {
    ResourceId(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
}

/**
 * The vertex layout uploaded to the GPU. Tangents are not stored as the
 * configurator only uses base colour maps.
 */
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

/// Indexed triangle geometry with its object-space bounds.
#[derive(Clone, Debug)]
pub struct Geometry {
    pub id: ResourceId,
    pub label: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    bounds: BoundingBox,
}

impl Geometry {
    pub fn new(label: &str, vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        let bounds = BoundingBox::from_points(vertices.iter().map(|v| v.position.into()));
        Self {
            id: next_resource_id(),
            label: label.to_string(),
            vertices,
            indices,
            bounds,
        }
    }

    /// Object-space bounds, computed once when the geometry is created.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn num_elements(&self) -> u32 {
        self.indices.len() as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialKind {
    /// Physically-shaded metallic/roughness material.
    Standard,
    /// Flat colour, ignores lighting (`KHR_materials_unlit`).
    Unlit,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub id: ResourceId,
    pub name: String,
    pub kind: MaterialKind,
    /// `None` when the asset did not specify a base colour.
    pub base_color: Option<[f32; 4]>,
    pub base_color_texture: Option<Texture>,
    pub normal_texture: Option<Texture>,
    pub metallic: f32,
    pub roughness: f32,
}

impl Material {
    pub fn standard(name: &str, base_color: [f32; 4], metallic: f32, roughness: f32) -> Self {
        Self {
            id: next_resource_id(),
            name: name.to_string(),
            kind: MaterialKind::Standard,
            base_color: Some(base_color),
            base_color_texture: None,
            normal_texture: None,
            metallic,
            roughness,
        }
    }

    /// Converts this material to the physically-shaded form in place.
    ///
    /// Maps are kept; a missing base colour is replaced by `fallback_color`.
    pub fn make_standard(&mut self, fallback_color: [f32; 4]) {
        self.kind = MaterialKind::Standard;
        if self.base_color.is_none() {
            self.base_color = Some(fallback_color);
        }
    }

    pub fn textures(&self) -> impl Iterator<Item = &Texture> {
        self.base_color_texture
            .iter()
            .chain(self.normal_texture.iter())
    }
}

/// The renderable payload of a mesh node.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Mesh {
    pub fn new(geometry: Geometry, material: Material) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: true,
            receive_shadow: true,
        }
    }
}
