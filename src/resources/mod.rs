use std::{
    collections::{HashMap, HashSet},
    future::Future,
};

use anyhow::{Context, bail};
use futures::future::LocalBoxFuture;

use crate::data_structures::{
    model::{Material, MaterialKind, Mesh, next_resource_id},
    scene_graph::{Light, LightKind, SceneNode},
    texture::Texture,
    transform::Transform,
};
use crate::resources::animation::{AnimationChannel, AnimationClip, Interpolation, Keyframes};

/**
 * This module contains all logic for loading models (meshes, materials,
 * textures and animation clips) from external files.
 */
pub mod animation;
pub mod mesh;
pub mod texture;

/// Byte progress of a running fetch. `total` is unknown for some transports.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl LoadProgress {
    /// Completion in percent, or `None` when the total size is not computable.
    pub fn percent(&self) -> Option<f32> {
        match self.total {
            Some(total) if total > 0 => {
                Some((self.loaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0) as f32)
            }
            _ => None,
        }
    }
}

/// The result of parsing an asset: an optional scene root and the clips it embeds.
#[derive(Debug, Default)]
pub struct ParsedAsset {
    /// `None` when the asset parsed but contains nothing displayable.
    pub scene: Option<SceneNode>,
    pub animations: Vec<AnimationClip>,
}

/// Fetches and parses model assets.
///
/// `on_progress` may be called any number of times before the future resolves.
pub trait AssetLoader {
    fn load<'a>(
        &'a self,
        reference: &'a str,
        on_progress: &'a mut dyn FnMut(LoadProgress),
    ) -> LocalBoxFuture<'a, anyhow::Result<ParsedAsset>>;
}

/// Loads `.glb` and `.gltf` files from the filesystem, or from the page origin on the web.
#[derive(Clone, Debug)]
pub struct GltfLoader {
    asset_root: String,
}

impl GltfLoader {
    pub fn new(asset_root: &str) -> Self {
        Self {
            asset_root: asset_root.to_string(),
        }
    }

    /// Location of `reference` below the asset root.
    pub fn resolve(&self, reference: &str) -> String {
        if self.asset_root.is_empty()
            || self.asset_root == "."
            || reference.contains("://")
            || reference.starts_with('/')
        {
            return reference.to_string();
        }
        format!("{}/{}", self.asset_root.trim_end_matches('/'), reference)
    }
}

impl Default for GltfLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl AssetLoader for GltfLoader {
    fn load<'a>(
        &'a self,
        reference: &'a str,
        on_progress: &'a mut dyn FnMut(LoadProgress),
    ) -> LocalBoxFuture<'a, anyhow::Result<ParsedAsset>> {
        Box::pin(async move {
            let path = self.resolve(reference);
            let bytes = load_binary(&path, on_progress)
                .await
                .with_context(|| format!("failed to fetch {path}"))?;
            parse_gltf(&bytes, &path, |uri| async move {
                load_binary(&uri, &mut |_: LoadProgress| {}).await
            })
            .await
            .with_context(|| format!("failed to parse {path}"))
        })
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no window available")?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("cannot read page origin: {:?}", e))?;
    let base = reqwest::Url::parse(&format!("{}/", origin))?;
    Ok(base.join(file_name)?)
}

/**
 * Reads a whole file, reporting progress along the way.
 *
 * Natively the file is read in chunks and progress is reported per chunk
 * against the file size. On the web the response body arrives in one piece,
 * so progress is reported once with the content length when the server sends
 * one.
 */
pub async fn load_binary(
    file_name: &str,
    on_progress: &mut dyn FnMut(LoadProgress),
) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        let response = reqwest::get(url).await?.error_for_status()?;
        let total = response.content_length();
        let data = response.bytes().await?.to_vec();
        on_progress(LoadProgress {
            loaded: data.len() as u64,
            total,
        });
        data
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        use tokio::io::AsyncReadExt;

        const CHUNK: usize = 64 * 1024;
        let mut file = tokio::fs::File::open(file_name).await?;
        let total = file.metadata().await.ok().map(|m| m.len());
        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; CHUNK];
        loop {
            let read = file.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..read]);
            on_progress(LoadProgress {
                loaded: data.len() as u64,
                total,
            });
        }
        data
    };

    Ok(data)
}

/// `models/chair.gltf` + `chair.bin` -> `models/chair.bin`
pub fn resolve_relative(reference: &str, uri: &str) -> String {
    match reference.rsplit_once('/') {
        Some((dir, _)) if !uri.contains("://") && !uri.starts_with('/') => {
            format!("{dir}/{uri}")
        }
        _ => uri.to_string(),
    }
}

/**
 * Parses a glTF 2.0 document (binary or JSON) into a scene graph.
 *
 * `fetch` is used for external buffers and images; its argument is already
 * resolved relative to `reference`. The default scene (or the first one) is
 * wrapped in a group node, so the returned root always carries an identity
 * transform. A document without scene nodes yields `scene: None`.
 */
pub async fn parse_gltf<F, Fut>(
    bytes: &[u8],
    reference: &str,
    fetch: F,
) -> anyhow::Result<ParsedAsset>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<u8>>>,
{
    let gltf = gltf::Gltf::from_slice(bytes)?;

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let Some(blob) = gltf.blob.as_deref() else {
                    bail!("buffer {} refers to a missing binary chunk", buffer.index());
                };
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                buffer_data.push(texture::decode_data_uri(uri)?);
            }
            gltf::buffer::Source::Uri(uri) => {
                let bin = fetch(resolve_relative(reference, uri)).await?;
                buffer_data.push(bin);
            }
        }
    }

    // Load materials, decoding each image once per colour space
    let mut textures: HashMap<(usize, bool), Texture> = HashMap::new();
    let mut materials = Vec::new();
    for material in gltf.materials() {
        let pbr = material.pbr_metallic_roughness();
        let name = material
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("material_{}", material.index().unwrap_or(0)));
        let base_color_texture = match pbr.base_color_texture() {
            Some(info) => Some(
                cached_image(
                    &mut textures,
                    &info.texture().source(),
                    &buffer_data,
                    reference,
                    &fetch,
                    false,
                )
                .await?,
            ),
            None => None,
        };
        let normal_texture = match material.normal_texture() {
            Some(normal) => Some(
                cached_image(
                    &mut textures,
                    &normal.texture().source(),
                    &buffer_data,
                    reference,
                    &fetch,
                    true,
                )
                .await?,
            ),
            None => None,
        };
        materials.push(Material {
            id: next_resource_id(),
            name,
            kind: if material.unlit() {
                MaterialKind::Unlit
            } else {
                MaterialKind::Standard
            },
            base_color: Some(pbr.base_color_factor()),
            base_color_texture,
            normal_texture,
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
        });
    }

    let node_names = unique_node_names(&gltf);

    // Load animations
    let mut animations = Vec::new();
    for animation in gltf.animations() {
        let mut channels = Vec::new();
        for channel in animation.channels() {
            let reader = channel.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));
            let interpolation = match channel.sampler().interpolation() {
                gltf::animation::Interpolation::Linear => Interpolation::Linear,
                gltf::animation::Interpolation::Step => Interpolation::Step,
                gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
            };
            let timestamps: Vec<f32> = match reader.read_inputs() {
                Some(times) => times.collect(),
                None => {
                    log::warn!("No timestamps found in channel {}", channel.index());
                    continue;
                }
            };
            let keyframes = match reader.read_outputs() {
                Some(gltf::animation::util::ReadOutputs::Translations(translation)) => {
                    Keyframes::Translation(spline_values(
                        translation.map(Into::into).collect(),
                        interpolation,
                    ))
                }
                Some(gltf::animation::util::ReadOutputs::Rotations(rotation)) => {
                    Keyframes::Rotation(spline_values(
                        rotation
                            .into_f32()
                            .map(|[x, y, z, w]| cgmath::Quaternion::new(w, x, y, z))
                            .collect(),
                        interpolation,
                    ))
                }
                Some(gltf::animation::util::ReadOutputs::Scales(scales)) => Keyframes::Scale(
                    spline_values(scales.map(Into::into).collect(), interpolation),
                ),
                Some(gltf::animation::util::ReadOutputs::MorphTargetWeights(_)) => Keyframes::Other,
                None => {
                    log::warn!("No keyframes found in channel {}", channel.index());
                    continue;
                }
            };
            let target = channel.target().node().index();
            channels.push(AnimationChannel {
                target: node_names
                    .get(target)
                    .cloned()
                    .unwrap_or_else(|| format!("node_{target}")),
                keyframes,
                timestamps,
                interpolation,
            });
        }
        let name = animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation_{}", animation.index()));
        animations.push(AnimationClip::new(&name, channels));
    }

    let scene = match gltf.default_scene().or_else(|| gltf.scenes().next()) {
        Some(scene) if scene.nodes().next().is_some() => {
            let mut root = SceneNode::group(scene.name().unwrap_or("Scene"));
            for node in scene.nodes() {
                root.add_child(to_scene_node(&node, &buffer_data, &materials, &node_names));
            }
            Some(root)
        }
        _ => None,
    };

    Ok(ParsedAsset { scene, animations })
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()))
}

/// Node names indexed by glTF node index. Repeated names get a numeric
/// suffix (`wheel`, `wheel_1`, ...) so animation channels can find their
/// node by name; the first node keeps the authored name.
fn unique_node_names(document: &gltf::Document) -> Vec<String> {
    let mut taken = HashSet::new();
    document
        .nodes()
        .map(|node| {
            let base = node_name(&node);
            let mut name = base.clone();
            let mut suffix = 0;
            while !taken.insert(name.clone()) {
                suffix += 1;
                name = format!("{base}_{suffix}");
            }
            name
        })
        .collect()
}

/// Cubic spline outputs store (in-tangent, value, out-tangent) per keyframe; keep the values.
fn spline_values<T: Copy>(values: Vec<T>, interpolation: Interpolation) -> Vec<T> {
    match interpolation {
        Interpolation::CubicSpline => values.chunks(3).filter_map(|c| c.get(1).copied()).collect(),
        Interpolation::Linear | Interpolation::Step => values,
    }
}

/// Materials sharing an image share one decoded texture and its resource id.
async fn cached_image<F, Fut>(
    cache: &mut HashMap<(usize, bool), Texture>,
    image: &gltf::Image<'_>,
    buffer_data: &[Vec<u8>],
    reference: &str,
    fetch: &F,
    is_normal_map: bool,
) -> anyhow::Result<Texture>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<u8>>>,
{
    let key = (image.index(), is_normal_map);
    if let Some(texture) = cache.get(&key) {
        return Ok(texture.clone());
    }
    let texture = load_image(image, buffer_data, reference, fetch, is_normal_map).await?;
    cache.insert(key, texture.clone());
    Ok(texture)
}

async fn load_image<F, Fut>(
    image: &gltf::Image<'_>,
    buffer_data: &[Vec<u8>],
    reference: &str,
    fetch: &F,
    is_normal_map: bool,
) -> anyhow::Result<Texture>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<u8>>>,
{
    let label = image
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{reference}#image_{}", image.index()));
    match texture::locate_image(image, buffer_data)? {
        texture::ImageBytes::Resolved { bytes, format } => {
            texture::decode(&bytes, &label, format.as_deref(), is_normal_map)
        }
        texture::ImageBytes::External { uri, format } => {
            let bytes = fetch(resolve_relative(reference, &uri)).await?;
            texture::decode(&bytes, &label, format.as_deref(), is_normal_map)
        }
    }
}

fn convert_material(material: gltf::Material, materials: &[Material]) -> Material {
    match material.index().and_then(|idx| materials.get(idx)) {
        Some(material) => material.clone(),
        // glTF default material: no colour was authored
        None => Material {
            id: next_resource_id(),
            name: "default".to_string(),
            kind: MaterialKind::Standard,
            base_color: None,
            base_color_texture: None,
            normal_texture: None,
            metallic: 1.0,
            roughness: 1.0,
        },
    }
}

fn convert_light(light: gltf::khr_lights_punctual::Light) -> Light {
    let kind = match light.kind() {
        gltf::khr_lights_punctual::Kind::Directional => LightKind::Directional,
        gltf::khr_lights_punctual::Kind::Point => LightKind::Point,
        gltf::khr_lights_punctual::Kind::Spot { .. } => LightKind::Spot,
    };
    Light {
        kind,
        color: light.color(),
        intensity: light.intensity(),
    }
}

/**
 * Converts a glTF node and its children.
 *
 * A mesh with a single primitive becomes a mesh node; a mesh with several
 * primitives becomes a group holding one mesh node per primitive.
 */
pub fn to_scene_node(
    node: &gltf::Node,
    buf: &[Vec<u8>],
    mats: &[Material],
    names: &[String],
) -> SceneNode {
    let name = names
        .get(node.index())
        .cloned()
        .unwrap_or_else(|| node_name(node));
    let mut scene_node = match node.mesh() {
        Some(mesh) => {
            let mesh_label = mesh.name().unwrap_or(&name).to_string();
            let mut primitives: Vec<SceneNode> = mesh
                .primitives()
                .enumerate()
                .filter_map(|(idx, primitive)| {
                    let label = format!("{mesh_label}_{idx}");
                    let geometry = mesh::read_primitive(&primitive, buf, &label)?;
                    let material = convert_material(primitive.material(), mats);
                    Some(SceneNode::mesh(&label, Mesh::new(geometry, material)))
                })
                .collect();
            if primitives.len() == 1 {
                let mut single = primitives.remove(0);
                single.name = name.clone();
                single
            } else {
                let mut group = SceneNode::group(&name);
                primitives.into_iter().for_each(|p| group.add_child(p));
                group
            }
        }
        None => match node.light() {
            Some(light) => SceneNode::light(&name, convert_light(light)),
            None => SceneNode::group(&name),
        },
    };
    let (translation, rotation, scale) = node.transform().decomposed();
    scene_node.transform = Transform {
        position: translation.into(),
        rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
        scale: scale.into(),
    };
    for child in node.children() {
        scene_node.add_child(to_scene_node(&child, buf, mats, names));
    }
    scene_node
}
