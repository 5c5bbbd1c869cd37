//! Configurator data structures: transforms, bounds, meshes, textures and the scene graph.
//!
//! - `transform` holds per-node position, rotation and scale
//! - `bounds` contains the axis-aligned bounding box used for normalization
//! - `model` contains geometry, material and mesh definitions
//! - `texture` contains decoded material maps
//! - `scene_graph` enables hierarchical scene organization

pub mod bounds;
pub mod model;
pub mod scene_graph;
pub mod texture;
pub mod transform;
