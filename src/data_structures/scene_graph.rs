//! Scene graph and hierarchical scene organization.
//!
//! A [`SceneNode`] exclusively owns its children. Each node is classified
//! once, when it is created, as a group, a mesh or a light ([`NodeKind`]), so
//! traversals match on the tag instead of probing for capabilities.
//!
//! Dropping a node only frees CPU memory. GPU copies of its meshes must be
//! released explicitly with [`SceneNode::dispose`].

use std::sync::atomic::{AtomicU64, Ordering};

use cgmath::SquareMatrix;

use crate::{
    context::GpuResources,
    data_structures::{bounds::BoundingBox, model::Mesh, transform::Transform},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> NodeId {
    NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

#[derive(Clone, Debug)]
pub struct Light {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Light(Light),
}

#[derive(Debug)]
pub struct SceneNode {
    id: NodeId,
    pub name: String,
    pub visible: bool,
    pub transform: Transform,
    pub kind: NodeKind,
    children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            id: next_node_id(),
            name: name.to_string(),
            visible: true,
            transform: Transform::default(),
            kind,
            children: Vec::new(),
        }
    }

    pub fn group(name: &str) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn mesh(name: &str, mesh: Mesh) -> Self {
        Self::new(name, NodeKind::Mesh(mesh))
    }

    pub fn light(name: &str, light: Light) -> Self {
        Self::new(name, NodeKind::Light(light))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.add_child(child);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn get_children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn get_children_mut(&mut self) -> &mut Vec<SceneNode> {
        &mut self.children
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Depth-first, pre-order visit of this node and all descendants.
    pub fn traverse(&self, visitor: &mut dyn FnMut(&SceneNode)) {
        visitor(self);
        for child in &self.children {
            child.traverse(visitor);
        }
    }

    pub fn traverse_mut(&mut self, visitor: &mut dyn FnMut(&mut SceneNode)) {
        visitor(self);
        for child in self.children.iter_mut() {
            child.traverse_mut(visitor);
        }
    }

    /// Calls `visitor` for every mesh payload in the subtree.
    pub fn for_each_mesh_mut(&mut self, visitor: &mut dyn FnMut(&mut Mesh)) {
        self.traverse_mut(&mut |node| {
            if let NodeKind::Mesh(mesh) = &mut node.kind {
                visitor(mesh);
            }
        });
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.traverse(&mut |node| {
            if node.as_mesh().is_some() {
                count += 1;
            }
        });
        count
    }

    /// First node in pre-order (starting with `self`) whose name equals `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_by_name(name))
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_by_name_mut(name))
    }

    /**
     * Child indices leading from `self` to the first node named `name`.
     *
     * An empty path refers to `self`. Paths stay valid as long as the subtree
     * is not restructured, which lets animation bindings address nodes without
     * holding references into the tree.
     */
    pub fn path_to(&self, name: &str) -> Option<Vec<usize>> {
        if self.name == name {
            return Some(Vec::new());
        }
        self.children.iter().enumerate().find_map(|(idx, child)| {
            child.path_to(name).map(|mut path| {
                path.insert(0, idx);
                path
            })
        })
    }

    pub fn node_at_path(&self, path: &[usize]) -> Option<&SceneNode> {
        match path.split_first() {
            None => Some(self),
            Some((idx, rest)) => self.children.get(*idx)?.node_at_path(rest),
        }
    }

    pub fn node_at_path_mut(&mut self, path: &[usize]) -> Option<&mut SceneNode> {
        match path.split_first() {
            None => Some(self),
            Some((idx, rest)) => self.children.get_mut(*idx)?.node_at_path_mut(rest),
        }
    }

    /// World-space bounds of the subtree, treating `self` as a scene root.
    pub fn bounding_box(&self) -> BoundingBox {
        self.bounds_in(&cgmath::Matrix4::identity())
    }

    /// Bounds of the subtree when `self` sits below a parent with world matrix `parent`.
    pub fn bounds_in(&self, parent: &cgmath::Matrix4<f32>) -> BoundingBox {
        self.bounds_with_own_matrix(&(parent * self.transform.to_matrix()))
    }

    /**
     * Bounds of the subtree as if `self`'s own world matrix were `matrix`.
     *
     * Used by normalization to measure a model in its rotated frame while
     * ignoring the scale and translation that are about to be overwritten.
     */
    pub fn bounds_with_own_matrix(&self, matrix: &cgmath::Matrix4<f32>) -> BoundingBox {
        let own = match &self.kind {
            NodeKind::Mesh(mesh) => mesh.geometry.bounds().transformed(matrix),
            _ => BoundingBox::empty(),
        };
        self.children
            .iter()
            .fold(own, |acc, child| acc.union(&child.bounds_in(matrix)))
    }

    /// Hands every mesh of the subtree to `gpu` for upload.
    pub fn upload(&self, gpu: &mut dyn GpuResources) {
        self.traverse(&mut |node| {
            if let NodeKind::Mesh(mesh) = &node.kind {
                gpu.upload(mesh);
            }
        });
    }

    /**
     * Consumes the subtree and releases the GPU copies of every geometry,
     * texture and material in it. Children are released before their parent.
     *
     * Returns the number of meshes that were released.
     */
    pub fn dispose(self, gpu: &mut dyn GpuResources) -> usize {
        let mut released = 0;
        for child in self.children {
            released += child.dispose(gpu);
        }
        if let NodeKind::Mesh(mesh) = self.kind {
            gpu.release_geometry(&mesh.geometry);
            for texture in mesh.material.textures() {
                gpu.release_texture(texture);
            }
            gpu.release_material(&mesh.material);
            released += 1;
        }
        released
    }
}

/// The scene root. Owns every top-level node, including the current model.
#[derive(Debug, Default)]
pub struct Scene {
    children: Vec<SceneNode>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: SceneNode) -> NodeId {
        let id = node.id();
        self.children.push(node);
        id
    }

    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        let idx = self.children.iter().position(|node| node.id() == id)?;
        Some(self.children.remove(idx))
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.children.iter().find(|node| node.id() == id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.children.iter_mut().find(|node| node.id() == id)
    }

    pub fn get_children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn traverse(&self, visitor: &mut dyn FnMut(&SceneNode)) {
        for child in &self.children {
            child.traverse(visitor);
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.children
            .iter()
            .fold(BoundingBox::empty(), |acc, child| acc.union(&child.bounding_box()))
    }
}
