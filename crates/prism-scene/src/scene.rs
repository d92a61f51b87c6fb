//! The scene root.
//!
//! A [`Scene`] is a fixed-type component: its document node carries no
//! ownership metadata, and everything below it is owned through [`Own`]
//! handles. Meshes point at their material and the scene points at its
//! active camera through [`Weak`] references, so the material map is
//! declared before the mesh list and the camera list before the active
//! camera reference. Owning nodes are therefore always loaded before the
//! references that name them.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use prism_reflect::prelude::*;
use serde::{Deserialize, Serialize};

use crate::camera::{Camera, PerspectiveCamera};
use crate::integrator::{Integrator, PathTracer};
use crate::material::{Material, MatteMaterial};
use crate::math::Vec3;
use crate::sampler::{RandomSampler, Sampler};
use crate::shader::Shader;

// ---------------------------------------------------------------------------
// Film
// ---------------------------------------------------------------------------

/// Pixel reconstruction filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    Box { radius: f32 },
    Tent { radius: f32 },
    Gaussian { radius: f32, sigma: f32 },
}

impl Default for Filter {
    fn default() -> Self {
        Filter::Gaussian {
            radius: 1.5,
            sigma: 0.5,
        }
    }
}

/// Output image settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Film {
    pub width: u32,
    pub height: u32,
    pub filter: Serde<Filter>,
    pub output: String,
}

impl Default for Film {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            filter: Serde(Filter::default()),
            output: "render.exr".to_owned(),
        }
    }
}

impl Film {
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

impl Reflect for Film {
    const TYPE_NAME: &'static str = "Film";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<Film>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("width", |s| &s.width, |s| &mut s.width)
                .field("height", |s| &s.height, |s| &mut s.height)
                .field("filter", |s| &s.filter, |s| &mut s.filter)
                .field("output", |s| &s.output, |s| &mut s.output)
        })
    }
}

// ---------------------------------------------------------------------------
// MeshInstance
// ---------------------------------------------------------------------------

/// A placed mesh. Geometry stays on disk; only its path is recorded.
#[derive(Debug)]
pub struct MeshInstance {
    pub name: String,
    pub path: String,
    pub translation: Vec3,
    pub scale: Vec3,
    pub material: Weak<dyn Material>,
}

impl Default for MeshInstance {
    fn default() -> Self {
        Self {
            name: String::new(),
            path: String::new(),
            translation: [0.0; 3],
            scale: [1.0; 3],
            material: Weak::null(),
        }
    }
}

impl Reflect for MeshInstance {
    const TYPE_NAME: &'static str = "MeshInstance";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<MeshInstance>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("name", |s| &s.name, |s| &mut s.name)
                .field("path", |s| &s.path, |s| &mut s.path)
                .field("translation", |s| &s.translation, |s| &mut s.translation)
                .field("scale", |s| &s.scale, |s| &mut s.scale)
                .field("material", |s| &s.material, |s| &mut s.material)
        })
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Scene {
    pub film: Film,
    pub cameras: Vec<Own<dyn Camera>>,
    pub active_camera: Weak<dyn Camera>,
    pub sampler: Own<dyn Sampler>,
    pub integrator: Own<dyn Integrator>,
    pub shaders: BTreeMap<String, Own<dyn Shader>>,
    pub materials: BTreeMap<String, Own<dyn Material>>,
    pub meshes: Vec<Own<MeshInstance>>,
}

impl Reflect for Scene {
    const TYPE_NAME: &'static str = "Scene";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<Scene>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .fixed("film", |s| &s.film, |s| &mut s.film)
                .field("cameras", |s| &s.cameras, |s| &mut s.cameras)
                .field("active_camera", |s| &s.active_camera, |s| &mut s.active_camera)
                .field("sampler", |s| &s.sampler, |s| &mut s.sampler)
                .field("integrator", |s| &s.integrator, |s| &mut s.integrator)
                .field("shaders", |s| &s.shaders, |s| &mut s.shaders)
                .field("materials", |s| &s.materials, |s| &mut s.materials)
                .field("meshes", |s| &s.meshes, |s| &mut s.meshes)
        })
    }
}

/// A weak reference in a scene that names no live component of the right
/// type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    /// Where the reference lives, e.g. `meshes/2/material`.
    pub location: String,
    pub target: InstanceId,
}

impl Scene {
    /// A renderable starting point: one perspective camera (active), a
    /// random sampler, a path tracer and a grey matte material named
    /// `default`.
    pub fn with_defaults() -> Self {
        let mut scene = Scene::default();
        let camera = scene.add_camera(Box::new(PerspectiveCamera::default()));
        scene.active_camera = camera;
        scene.sampler = Own::from_box(Box::new(RandomSampler::default()) as Box<dyn Sampler>);
        scene.integrator = Own::from_box(Box::new(PathTracer::default()) as Box<dyn Integrator>);
        scene.add_material("default", Box::new(MatteMaterial::default()));
        scene
    }

    pub fn add_camera(&mut self, camera: Box<dyn Camera>) -> Weak<dyn Camera> {
        let handle = Own::from_box(camera);
        let weak = handle.weak();
        self.cameras.push(handle);
        weak
    }

    /// Insert or replace the material called `name`.
    ///
    /// Replacing keeps the slot's identity, so meshes that referenced the
    /// previous material now reference the new one.
    pub fn add_material(&mut self, name: impl Into<String>, material: Box<dyn Material>) -> Weak<dyn Material> {
        let slot = self.materials.entry(name.into()).or_default();
        slot.replace_keeping_id(material);
        slot.weak()
    }

    pub fn add_mesh(&mut self, mesh: MeshInstance) -> Weak<MeshInstance> {
        let handle = Own::new(mesh);
        let weak = handle.weak();
        self.meshes.push(handle);
        weak
    }

    pub fn material_named(&self, name: &str) -> Weak<dyn Material> {
        self.materials.get(name).map_or_else(Weak::null, Own::weak)
    }

    /// The active camera, falling back to the first camera when no active
    /// camera is set or the reference does not name one of `cameras`.
    pub fn camera(&self) -> Option<&dyn Camera> {
        self.cameras
            .iter()
            .find(|c| self.active_camera.points_to(*c))
            .or_else(|| self.cameras.first())
            .and_then(|c| c.get())
    }

    /// The material `mesh` references, if it is one of this scene's.
    pub fn material_of(&self, mesh: &MeshInstance) -> Option<&dyn Material> {
        self.materials
            .values()
            .find(|m| mesh.material.points_to(*m))
            .and_then(|m| m.get())
    }

    /// Lookup table of every owned component in the scene.
    pub fn index(&self) -> GraphIndex<'_> {
        GraphIndex::from_fixed(self)
    }

    /// Every non-null weak reference whose target is not an owned
    /// component of the expected type inside this scene.
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let index = self.index();
        let mut dangling = Vec::new();
        if let Some(target) = self.active_camera.id() {
            if index.resolve(&self.active_camera).is_none() {
                dangling.push(DanglingReference {
                    location: "active_camera".to_owned(),
                    target,
                });
            }
        }
        for (i, mesh) in self.meshes.iter().enumerate() {
            let Some(mesh) = mesh.get() else { continue };
            if let Some(target) = mesh.material.id() {
                if index.resolve(&mesh.material).is_none() {
                    dangling.push(DanglingReference {
                        location: format!("meshes/{i}/material"),
                        target,
                    });
                }
            }
        }
        dangling
    }
}

/// Register the scene-layer types.
pub fn register(registry: &mut TypeRegistry) {
    registry.register::<Film>();
    registry.register::<MeshInstance>();
    registry.register::<Scene>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::OrthographicCamera;
    use crate::material::MirrorMaterial;

    #[test]
    fn defaults_are_complete() {
        let scene = Scene::with_defaults();
        assert_eq!(scene.cameras.len(), 1);
        assert_eq!(scene.camera().unwrap().type_name(), "PerspectiveCamera");
        assert!(!scene.sampler.is_null());
        assert!(!scene.integrator.is_null());
        assert!(scene.dangling_references().is_empty());
    }

    #[test]
    fn active_camera_selects_among_cameras() {
        let mut scene = Scene::with_defaults();
        let ortho = scene.add_camera(Box::new(OrthographicCamera::default()));
        assert_eq!(scene.camera().unwrap().type_name(), "PerspectiveCamera");
        scene.active_camera = ortho;
        assert_eq!(scene.camera().unwrap().type_name(), "OrthographicCamera");
    }

    #[test]
    fn replacing_material_keeps_mesh_references() {
        let mut scene = Scene::with_defaults();
        let material = scene.material_named("default");
        scene.add_mesh(MeshInstance {
            name: "floor".into(),
            material,
            ..Default::default()
        });
        scene.add_material("default", Box::new(MirrorMaterial::default()));

        let mesh = scene.meshes[0].get().unwrap();
        assert_eq!(scene.material_of(mesh).unwrap().type_name(), "MirrorMaterial");
        assert!(scene.dangling_references().is_empty());
    }

    #[test]
    fn removed_material_is_reported_dangling() {
        let mut scene = Scene::with_defaults();
        let material = scene.material_named("default");
        scene.add_mesh(MeshInstance {
            material,
            ..Default::default()
        });
        scene.materials.clear();

        let dangling = scene.dangling_references();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].location, "meshes/0/material");
        assert_eq!(Some(dangling[0].target), material.id());
    }

    #[test]
    fn film_filter_is_a_plain_value() {
        let mut reg = TypeRegistry::new();
        register(&mut reg);
        let film = Film {
            filter: Serde(Filter::Box { radius: 0.5 }),
            ..Default::default()
        };
        let document = prism_reflect::save_fixed(&reg, &film).unwrap();
        assert_eq!(document["val"]["filter"]["kind"], "box");
        let loaded: Film = prism_reflect::load_fixed(&reg, &document).unwrap();
        assert_eq!(loaded, film);
        assert!((loaded.aspect() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn film_needs_registration() {
        let reg = TypeRegistry::new();
        let err = prism_reflect::save_fixed(&reg, &Film::default()).unwrap_err();
        assert!(matches!(err, ReflectError::UnknownType { ref name, .. } if name == "Film"), "{err}");
        let document = serde_json::json!({ "type": "Film", "val": {} });
        let err = prism_reflect::load_fixed::<Film>(&reg, &document).unwrap_err();
        assert!(matches!(err, ReflectError::UnknownType { ref name, .. } if name == "Film"), "{err}");
    }
}
