//! GPU resource ownership.
//!
//! The scene graph only holds CPU data. Whatever renders it keeps the GPU
//! copies and implements [`GpuResources`] so the loading session can hand
//! over new meshes and release old ones at the right time.
//!
//! - [`HeadlessResources`] only does the bookkeeping (CPU-only embedding)
//! - [`GpuContext`] uploads to a `wgpu` device and destroys buffers and
//!   textures on release

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::data_structures::{
    model::{Geometry, Material, Mesh, ResourceId},
    texture::Texture,
};

pub trait GpuResources {
    /// Creates the GPU copies of a mesh's geometry and material maps.
    fn upload(&mut self, mesh: &Mesh);

    fn release_geometry(&mut self, geometry: &Geometry);

    fn release_material(&mut self, material: &Material);

    fn release_texture(&mut self, texture: &Texture);
}

/// Tracks which resources are alive without touching a device.
#[derive(Debug, Default)]
pub struct HeadlessResources {
    geometries: HashMap<ResourceId, usize>,
    materials: HashMap<ResourceId, String>,
    textures: HashMap<ResourceId, usize>,
}

impl HeadlessResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_geometries(&self) -> usize {
        self.geometries.len()
    }

    pub fn live_materials(&self) -> usize {
        self.materials.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Bytes of vertex, index and texel data that would be resident on the GPU.
    pub fn resident_bytes(&self) -> usize {
        self.geometries.values().sum::<usize>() + self.textures.values().sum::<usize>()
    }
}

impl GpuResources for HeadlessResources {
    fn upload(&mut self, mesh: &Mesh) {
        let geometry = &mesh.geometry;
        let bytes = std::mem::size_of_val(geometry.vertices.as_slice())
            + std::mem::size_of_val(geometry.indices.as_slice());
        self.geometries.insert(geometry.id, bytes);
        for texture in mesh.material.textures() {
            self.textures.insert(texture.id, texture.byte_size());
        }
        self.materials
            .insert(mesh.material.id, mesh.material.name.clone());
    }

    fn release_geometry(&mut self, geometry: &Geometry) {
        if self.geometries.remove(&geometry.id).is_none() {
            log::debug!("geometry {} was never uploaded", geometry.label);
        }
    }

    fn release_material(&mut self, material: &Material) {
        self.materials.remove(&material.id);
    }

    fn release_texture(&mut self, texture: &Texture) {
        self.textures.remove(&texture.id);
    }
}

#[derive(Debug)]
struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

/// Holds the device and queue plus every buffer and texture created for the
/// meshes that are currently resident.
#[derive(Debug)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    geometries: HashMap<ResourceId, GpuGeometry>,
    textures: HashMap<ResourceId, (wgpu::Texture, wgpu::TextureView)>,
}

impl GpuContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            geometries: HashMap::new(),
            textures: HashMap::new(),
        }
    }

    pub fn vertex_buffer(&self, geometry: &Geometry) -> Option<&wgpu::Buffer> {
        self.geometries.get(&geometry.id).map(|g| &g.vertex_buffer)
    }

    pub fn index_buffer(&self, geometry: &Geometry) -> Option<&wgpu::Buffer> {
        self.geometries.get(&geometry.id).map(|g| &g.index_buffer)
    }

    pub fn texture_view(&self, texture: &Texture) -> Option<&wgpu::TextureView> {
        self.textures.get(&texture.id).map(|(_, view)| view)
    }

    fn upload_texture(&mut self, texture: &Texture) {
        if self.textures.contains_key(&texture.id) {
            return;
        }
        let size = wgpu::Extent3d {
            width: texture.width.max(1),
            height: texture.height.max(1),
            depth_or_array_layers: 1,
        };
        let format = if texture.is_normal_map {
            wgpu::TextureFormat::Rgba8Unorm
        } else {
            wgpu::TextureFormat::Rgba8UnormSrgb
        };
        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&texture.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &gpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            &texture.rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * texture.width),
                rows_per_image: Some(texture.height),
            },
            size,
        );
        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.textures.insert(texture.id, (gpu_texture, view));
    }
}

impl GpuResources for GpuContext {
    fn upload(&mut self, mesh: &Mesh) {
        let geometry = &mesh.geometry;
        if !self.geometries.contains_key(&geometry.id) {
            let vertex_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Vertex Buffer", geometry.label)),
                    contents: bytemuck::cast_slice(&geometry.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            let index_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Index Buffer", geometry.label)),
                    contents: bytemuck::cast_slice(&geometry.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
            self.geometries.insert(
                geometry.id,
                GpuGeometry {
                    vertex_buffer,
                    index_buffer,
                },
            );
        }
        for texture in mesh.material.textures() {
            self.upload_texture(texture);
        }
    }

    fn release_geometry(&mut self, geometry: &Geometry) {
        if let Some(gpu) = self.geometries.remove(&geometry.id) {
            gpu.vertex_buffer.destroy();
            gpu.index_buffer.destroy();
        }
    }

    // Materials map onto bind groups built by the render pipelines, which
    // drop them together with the textures they reference.
    fn release_material(&mut self, _material: &Material) {}

    fn release_texture(&mut self, texture: &Texture) {
        if let Some((gpu_texture, _view)) = self.textures.remove(&texture.id) {
            gpu_texture.destroy();
        }
    }
}
