//! # prism-scene
//!
//! Renderer scene configuration built on `prism-reflect`.
//!
//! The scene is a graph of components: cameras, samplers, integrators,
//! shaders and materials are interface slots whose concrete type is chosen
//! at runtime, and meshes reference their material without owning it. The
//! whole graph is saved to and loaded from a hashed JSON scene file.
//!
//! ## Quick start
//!
//! ```
//! use prism_scene::prelude::*;
//!
//! let registry = prism_scene::registry();
//! let mut scene = Scene::with_defaults();
//! let material = scene.material_named("default");
//! scene.add_mesh(MeshInstance { name: "floor".into(), material, ..Default::default() });
//!
//! let file = SceneFile::capture(registry, &scene).unwrap();
//! let loaded = file.restore(registry, true).unwrap();
//!
//! let mesh = loaded.meshes[0].get().unwrap();
//! assert_eq!(loaded.material_of(mesh).unwrap().type_name(), "MatteMaterial");
//! ```

pub mod camera;
pub mod catalog;
pub mod config;
pub mod file;
pub mod integrator;
pub mod material;
pub mod math;
pub mod registry;
pub mod sampler;
pub mod scene;
pub mod shader;

pub use crate::registry::{build_registry, registry};

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::camera::{Camera, OrthographicCamera, PerspectiveCamera, Ray};
    pub use crate::catalog::{Catalog, EMPTY};
    pub use crate::config::SceneIoConfig;
    pub use crate::file::{load_scene, save_scene, SceneError, SceneFile};
    pub use crate::integrator::{AmbientOcclusion, BidirectionalPathTracer, DirectLighting, Integrator, PathTracer};
    pub use crate::material::{EmissiveMaterial, Material, MatteMaterial, MirrorMaterial, MixedMaterial};
    pub use crate::sampler::{RandomSampler, Sampler, StratifiedSampler};
    pub use crate::scene::{DanglingReference, Film, Filter, MeshInstance, Scene};
    pub use crate::shader::{CheckerShader, FloatShader, RgbShader, Shader};
    pub use prism_reflect::prelude::*;
}
