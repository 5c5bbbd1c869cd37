#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

use anyhow::anyhow;
use flow_configurator::{
    Point3,
    context::GpuResources,
    controls::Controls,
    data_structures::{
        model::{Geometry, Material, MaterialKind, Mesh, ModelVertex, ResourceId},
        scene_graph::SceneNode,
        texture::Texture,
    },
    resources::{AssetLoader, LoadProgress, ParsedAsset, animation::AnimationClip},
    session::LoadingObserver,
};
use futures::{channel::oneshot, future::LocalBoxFuture};

/// Ordered record of everything the test doubles saw.
pub type EventLog = Rc<RefCell<Vec<String>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.borrow().clone()
}

pub fn position_of(log: &EventLog, event: &str) -> usize {
    log.borrow()
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("event {event:?} not in {:?}", log.borrow()))
}

type AssetFactory = Rc<dyn Fn() -> anyhow::Result<ParsedAsset>>;

/// An in-memory loader. References without a registered asset fail like a
/// missing file. Clones share their script, so a test can keep a handle
/// after handing the loader to a session.
#[derive(Clone, Default)]
pub struct ScriptedLoader {
    log: EventLog,
    assets: Rc<RefCell<HashMap<String, AssetFactory>>>,
    progress: Rc<RefCell<HashMap<String, Vec<LoadProgress>>>>,
    gates: Rc<RefCell<HashMap<String, oneshot::Receiver<()>>>>,
}

impl ScriptedLoader {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn serve(self, reference: &str, asset: impl Fn() -> ParsedAsset + 'static) -> Self {
        self.assets
            .borrow_mut()
            .insert(reference.to_string(), Rc::new(move || Ok(asset())));
        self
    }

    pub fn serve_error(self, reference: &str, message: &'static str) -> Self {
        self.assets
            .borrow_mut()
            .insert(reference.to_string(), Rc::new(move || Err(anyhow!(message))));
        self
    }

    /// Progress events reported once the gate (if any) opens, before the asset resolves.
    pub fn with_progress(self, reference: &str, steps: &[(u64, Option<u64>)]) -> Self {
        let steps = steps
            .iter()
            .map(|&(loaded, total)| LoadProgress { loaded, total })
            .collect();
        self.progress
            .borrow_mut()
            .insert(reference.to_string(), steps);
        self
    }

    /// Holds the next load of `reference` until the returned sender fires.
    pub fn gate(&self, reference: &str) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.gates
            .borrow_mut()
            .insert(reference.to_string(), receiver);
        sender
    }

    pub fn requests(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter_map(|e| e.strip_prefix("request ").map(str::to_string))
            .collect()
    }
}

impl AssetLoader for ScriptedLoader {
    fn load<'a>(
        &'a self,
        reference: &'a str,
        on_progress: &'a mut dyn FnMut(LoadProgress),
    ) -> LocalBoxFuture<'a, anyhow::Result<ParsedAsset>> {
        Box::pin(async move {
            self.log.borrow_mut().push(format!("request {reference}"));
            let gate = self.gates.borrow_mut().remove(reference);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            let steps = self
                .progress
                .borrow()
                .get(reference)
                .cloned()
                .unwrap_or_default();
            for step in steps {
                on_progress(step);
            }
            let asset = self.assets.borrow().get(reference).cloned();
            match asset {
                Some(asset) => asset(),
                None => Err(anyhow!("{reference}: No such file or directory")),
            }
        })
    }
}

/// Tracks live resources and logs every release.
#[derive(Clone, Default)]
pub struct RecordingGpu {
    log: EventLog,
    live: Rc<RefCell<HashSet<ResourceId>>>,
}

impl RecordingGpu {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn live(&self) -> usize {
        self.live.borrow().len()
    }
}

impl GpuResources for RecordingGpu {
    fn upload(&mut self, mesh: &Mesh) {
        self.log
            .borrow_mut()
            .push(format!("upload {}", mesh.geometry.label));
        let mut live = self.live.borrow_mut();
        live.insert(mesh.geometry.id);
        live.insert(mesh.material.id);
        for texture in mesh.material.textures() {
            live.insert(texture.id);
        }
    }

    fn release_geometry(&mut self, geometry: &Geometry) {
        self.log
            .borrow_mut()
            .push(format!("release geometry {}", geometry.label));
        self.live.borrow_mut().remove(&geometry.id);
    }

    fn release_material(&mut self, material: &Material) {
        self.log
            .borrow_mut()
            .push(format!("release material {}", material.name));
        self.live.borrow_mut().remove(&material.id);
    }

    fn release_texture(&mut self, texture: &Texture) {
        self.log
            .borrow_mut()
            .push(format!("release texture {}", texture.label));
        self.live.borrow_mut().remove(&texture.id);
    }
}

pub struct RecordingObserver {
    log: EventLog,
}

impl RecordingObserver {
    pub fn new(log: &EventLog) -> Self {
        Self { log: log.clone() }
    }
}

impl LoadingObserver for RecordingObserver {
    fn loading_started(&mut self, reference: &str) {
        self.log.borrow_mut().push(format!("started {reference}"));
    }

    fn progress(&mut self, percent: f32) {
        self.log.borrow_mut().push(format!("progress {percent:.0}"));
    }

    fn loading_finished(&mut self) {
        self.log.borrow_mut().push("finished".to_string());
    }

    fn loading_failed(&mut self, message: &str) {
        self.log.borrow_mut().push(format!("failed {message}"));
    }
}

#[derive(Clone, Default)]
pub struct RecordingControls {
    pub targets: Rc<RefCell<Vec<Point3<f32>>>>,
    pub updates: Rc<RefCell<usize>>,
}

impl Controls for RecordingControls {
    fn set_target(&mut self, target: Point3<f32>) {
        self.targets.borrow_mut().push(target);
    }

    fn update(&mut self) {
        *self.updates.borrow_mut() += 1;
    }
}

/// An axis-aligned box mesh spanning `min`..`max` in its own space.
pub fn box_node(name: &str, min: [f32; 3], max: [f32; 3]) -> SceneNode {
    let mut vertices = Vec::new();
    for i in 0..8 {
        vertices.push(ModelVertex {
            position: [
                if i & 1 == 0 { min[0] } else { max[0] },
                if i & 2 == 0 { min[1] } else { max[1] },
                if i & 4 == 0 { min[2] } else { max[2] },
            ],
            tex_coords: [0.0, 0.0],
            normal: [0.0, 1.0, 0.0],
        });
    }
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 1, 2, 3,
        4, 5, 6, 5, 7, 6,
        0, 1, 4, 1, 5, 4,
        2, 6, 3, 3, 6, 7,
        0, 4, 2, 2, 4, 6,
        1, 3, 5, 3, 7, 5,
    ];
    let geometry = Geometry::new(name, vertices, indices);
    let material = Material::standard(name, [0.2, 0.4, 0.6, 1.0], 0.0, 0.5);
    SceneNode::mesh(name, Mesh::new(geometry, material))
}

/// A material as an unlit asset without a base colour would carry it.
pub fn bare_unlit_material(name: &str) -> Material {
    let mut material = Material::standard(name, [1.0; 4], 0.0, 1.0);
    material.kind = MaterialKind::Unlit;
    material.base_color = None;
    material
}

/// The connector model used across the session tests: a housing spanning
/// `[-2,-1,-0.5]..[2,3,0.5]` with two interchangeable ferrules inside it.
pub fn connector_model() -> SceneNode {
    SceneNode::group("Scene").with_child(
        box_node("housing", [-2.0, -1.0, -0.5], [2.0, 3.0, 0.5])
            .with_child(box_node("LC_ferrule", [-0.1, 0.0, -0.1], [0.1, 1.0, 0.1]))
            .with_child(box_node("SC_ferrule", [-0.2, 0.0, -0.2], [0.2, 1.0, 0.2])),
    )
}

pub fn connector_asset() -> ParsedAsset {
    ParsedAsset {
        scene: Some(connector_model()),
        animations: Vec::new(),
    }
}

pub fn animated_asset(clips: Vec<AnimationClip>) -> ParsedAsset {
    ParsedAsset {
        scene: Some(connector_model()),
        animations: clips,
    }
}

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}

pub fn assert_point_close(actual: Point3<f32>, expected: [f32; 3]) {
    assert_close(actual.x, expected[0]);
    assert_close(actual.y, expected[1]);
    assert_close(actual.z, expected[2]);
}

/**
 * Packs a glTF JSON document and a binary buffer into a GLB container.
 *
 * Both chunks are padded to four bytes, JSON with spaces and BIN with zeros.
 */
pub fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x004E_4942u32.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}

/// A small product: `housing` holding an unlit triangle `lever` that an
/// `open` clip slides from y=0 to y=2 over 1.5 seconds.
pub fn lever_glb() -> Vec<u8> {
    let mut bin: Vec<u8> = Vec::new();
    let floats = |values: &[f32], bin: &mut Vec<u8>| {
        for v in values {
            bin.extend_from_slice(&v.to_le_bytes());
        }
    };
    // positions, offset 0
    floats(&[0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0, 0.0], &mut bin);
    // keyframe times, offset 36
    floats(&[0.0, 1.5], &mut bin);
    // translations, offset 44
    floats(&[0.0, 0.0, 0.0, 0.0, 2.0, 0.0], &mut bin);
    // indices, offset 68
    for i in [0u16, 1, 2] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    bin.extend_from_slice(&[0, 0]);

    let json = r#"{
        "asset": { "version": "2.0" },
        "extensionsUsed": ["KHR_materials_unlit"],
        "scene": 0,
        "scenes": [{ "name": "Product", "nodes": [0] }],
        "nodes": [
            { "name": "housing", "children": [1] },
            { "name": "lever", "mesh": 0 }
        ],
        "meshes": [{
            "name": "lever_mesh",
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 3, "material": 0 }]
        }],
        "materials": [{
            "name": "flat_red",
            "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.0, 0.0, 1.0] },
            "extensions": { "KHR_materials_unlit": {} }
        }],
        "animations": [{
            "name": "open",
            "channels": [{ "sampler": 0, "target": { "node": 1, "path": "translation" } }],
            "samplers": [{ "input": 1, "output": 2, "interpolation": "LINEAR" }]
        }],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [2.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [1.5] },
            { "bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3" },
            { "bufferView": 3, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 44, "byteLength": 24 },
            { "buffer": 0, "byteOffset": 68, "byteLength": 6 }
        ],
        "buffers": [{ "byteLength": 76 }]
    }"#;
    glb(json, &bin)
}

/// Writes `bytes` to a fresh file under the system temp directory.
pub fn temp_asset(name: &str, bytes: &[u8]) -> String {
    let dir = std::env::temp_dir().join(format!(
        "flow-configurator-{}-{}",
        std::process::id(),
        name.replace('.', "_")
    ));
    std::fs::create_dir_all(&dir).expect("failed to create temp dir");
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("failed to write temp asset");
    path.to_string_lossy().into_owned()
}

fn push_floats(values: &[f32], bin: &mut Vec<u8>) {
    for v in values {
        bin.extend_from_slice(&v.to_le_bytes());
    }
}

/// A `car` with two children that are both called `wheel`. The `drive`
/// clip lifts the first wheel to y=2 and pushes the second to x=5 over one
/// second.
pub fn twin_wheels_glb() -> Vec<u8> {
    let mut bin: Vec<u8> = Vec::new();
    // keyframe times, offset 0
    push_floats(&[0.0, 1.0], &mut bin);
    // first wheel translations, offset 8
    push_floats(&[0.0, 0.0, 0.0, 0.0, 2.0, 0.0], &mut bin);
    // second wheel translations, offset 32
    push_floats(&[0.0, 0.0, 0.0, 5.0, 0.0, 0.0], &mut bin);

    let json = r#"{
        "asset": { "version": "2.0" },
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "car", "children": [1, 2] },
            { "name": "wheel" },
            { "name": "wheel" }
        ],
        "animations": [{
            "name": "drive",
            "channels": [
                { "sampler": 0, "target": { "node": 1, "path": "translation" } },
                { "sampler": 1, "target": { "node": 2, "path": "translation" } }
            ],
            "samplers": [
                { "input": 0, "output": 1, "interpolation": "LINEAR" },
                { "input": 0, "output": 2, "interpolation": "LINEAR" }
            ]
        }],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [1.0] },
            { "bufferView": 1, "componentType": 5126, "count": 2, "type": "VEC3" },
            { "bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3" }
        ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 8, "byteLength": 24 },
            { "buffer": 0, "byteOffset": 32, "byteLength": 24 }
        ],
        "buffers": [{ "byteLength": 56 }]
    }"#;
    glb(json, &bin)
}

/// Two triangles, `body` and `trim`, whose materials both use the same
/// embedded 2x2 PNG as base colour map.
pub fn shared_texture_glb() -> Vec<u8> {
    let mut png = Vec::new();
    image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 30, 30, 255]))
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("png encodes");

    let mut bin: Vec<u8> = Vec::new();
    // positions, offset 0
    push_floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &mut bin);
    // indices, offset 36
    for i in [0u16, 1, 2] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    bin.extend_from_slice(&[0, 0]);
    // image, offset 44
    bin.extend_from_slice(&png);

    let json = format!(
        r#"{{
        "asset": {{ "version": "2.0" }},
        "scenes": [{{ "nodes": [0, 1] }}],
        "nodes": [{{ "name": "body", "mesh": 0 }}, {{ "name": "trim", "mesh": 1 }}],
        "meshes": [
            {{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }}] }},
            {{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 1 }}] }}
        ],
        "materials": [
            {{ "name": "paint", "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }} }} }},
            {{ "name": "paint_matte", "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }}, "roughnessFactor": 0.9 }} }}
        ],
        "textures": [{{ "source": 0 }}],
        "images": [{{ "bufferView": 2, "mimeType": "image/png" }}],
        "accessors": [
            {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
               "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
            {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
        ],
        "bufferViews": [
            {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
            {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }},
            {{ "buffer": 0, "byteOffset": 44, "byteLength": {png_len} }}
        ],
        "buffers": [{{ "byteLength": {bin_len} }}]
    }}"#,
        png_len = png.len(),
        bin_len = bin.len(),
    );
    glb(&json, &bin)
}
