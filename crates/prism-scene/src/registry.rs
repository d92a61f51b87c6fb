//! The registry of built-in scene types.

use std::sync::OnceLock;

use prism_reflect::registry::TypeRegistry;

use crate::{camera, integrator, material, sampler, scene, shader};

/// A fresh registry holding every built-in scene type.
pub fn build_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    camera::register(&mut registry);
    shader::register(&mut registry);
    material::register(&mut registry);
    integrator::register(&mut registry);
    sampler::register(&mut registry);
    scene::register(&mut registry);
    tracing::debug!(
        types = registry.len(),
        interfaces = registry.interface_tags().len(),
        "scene registry built"
    );
    registry
}

/// Process-wide registry, built on first use.
pub fn registry() -> &'static TypeRegistry {
    static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_interface_is_present() {
        assert_eq!(
            registry().interface_tags(),
            ["Camera", "Integrator", "Material", "Sampler", "Shader"]
        );
    }

    #[test]
    fn registration_order_does_not_matter() {
        let mut reversed = TypeRegistry::new();
        scene::register(&mut reversed);
        sampler::register(&mut reversed);
        integrator::register(&mut reversed);
        material::register(&mut reversed);
        shader::register(&mut reversed);
        camera::register(&mut reversed);
        assert_eq!(reversed.registered_names(), build_registry().registered_names());
    }

    #[test]
    fn shared_registry_is_built_once() {
        assert!(std::ptr::eq(registry(), registry()));
    }
}
