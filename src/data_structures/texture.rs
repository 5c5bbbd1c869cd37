//! Decoded textures.
//!
//! This module provides [`Texture`], the CPU-side pixel data of a material map.
//! GPU copies are created and released through [`crate::context::GpuResources`].

use anyhow::*;
use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

use crate::data_structures::model::{ResourceId, next_resource_id};

/// An RGBA8 image ready to be uploaded as a material map.
#[derive(Clone, Debug)]
pub struct Texture {
    pub id: ResourceId,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    /// Normal maps are stored in linear space, colour maps in sRGB.
    pub is_normal_map: bool,
}

impl Texture {
    /// Decode a texture from raw byte data (image file contents).
    ///
    /// # Arguments
    ///
    /// * `bytes` represent raw image file data (PNG, JPEG, etc.)
    /// * `label` is used as a debug name for the GPU resource
    /// * `format`  is an optional file format hint (e.g., "png"). If None, auto-detect.
    /// * `is_normal_map` toggles between sRGB (false) and linear (true) color space
    pub fn from_bytes(
        bytes: &[u8],
        label: &str,
        format: Option<&str>,
        is_normal_map: bool,
    ) -> Result<Self> {
        let img = match format.and_then(ImageFormat::from_extension) {
            None => image::load_from_memory(bytes)?,
            Some(fmt) => load_from_memory_with_format(bytes, fmt)?,
        };
        Ok(Self::from_image(&img, label, is_normal_map))
    }

    pub fn from_image(img: &image::DynamicImage, label: &str, is_normal_map: bool) -> Self {
        let (width, height) = img.dimensions();
        Self {
            id: next_resource_id(),
            label: label.to_string(),
            width,
            height,
            rgba: img.to_rgba8().into_raw(),
            is_normal_map,
        }
    }

    pub fn byte_size(&self) -> usize {
        self.rgba.len()
    }
}
