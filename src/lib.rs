//! flow-configurator
//!
//! The core of a 3D product configurator: it loads one product model at a
//! time into a scene, recovers from missing or broken assets, sizes and
//! centers whatever it shows, plays the animations embedded in the model and
//! toggles parts of it according to a product's customization rules.
//! Rendering, windowing and UI stay with the embedding application, which
//! plugs in through the [`context::GpuResources`] and [`controls::Controls`]
//! traits.
//!
//! High-level modules
//! - `session`: the model loading session tying everything together
//! - `resources`: asset loading (glTF) with progress reporting
//! - `normalize`: scaling and centering of loaded models
//! - `fallback`: direct retry and procedural placeholders for failed loads
//! - `playback`: one-shot animation playback
//! - `customization`: product records and visibility rules
//! - `data_structures`: scene graph, meshes, textures, bounds
//! - `context`: GPU resource ownership (headless or wgpu)
//! - `controls`: orbit camera target
//! - `config`: viewer configuration
//! - `error`: recoverable load failures
//!

pub mod config;
pub mod context;
pub mod controls;
pub mod customization;
pub mod data_structures;
pub mod error;
pub mod fallback;
pub mod normalize;
pub mod playback;
pub mod resources;
pub mod session;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use config::ViewerConfig;
pub use session::{LoadReport, LoadingObserver, ViewerSession};

/// Installs the platform logger. Safe to call more than once.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {}", e).into());
        }
    }
}
