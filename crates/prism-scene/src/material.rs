//! Materials. Every material owns its shaders.

use std::sync::OnceLock;

use prism_reflect::prelude::*;

use crate::math::{add, scale, Vec3};
use crate::shader::{evaluate_slot, FloatShader, RgbShader, Shader};

pub trait Material: Component {
    /// Reflectance at `uv`.
    fn albedo(&self, uv: [f32; 2]) -> Vec3;

    /// Emitted radiance at `uv`.
    fn emission(&self, uv: [f32; 2]) -> Vec3 {
        let _ = uv;
        [0.0; 3]
    }
}

prism_reflect::declare_interface!(Material, "Material");

fn shader<S: Shader>(value: S) -> Own<dyn Shader> {
    Own::from_box(Box::new(value) as Box<dyn Shader>)
}

// ---------------------------------------------------------------------------
// MatteMaterial
// ---------------------------------------------------------------------------

/// Diffuse reflector.
#[derive(Debug)]
pub struct MatteMaterial {
    pub color: Own<dyn Shader>,
    pub roughness: f32,
}

impl Default for MatteMaterial {
    fn default() -> Self {
        Self {
            color: shader(RgbShader::default()),
            roughness: 0.0,
        }
    }
}

impl Reflect for MatteMaterial {
    const TYPE_NAME: &'static str = "MatteMaterial";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<MatteMaterial>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("color", |s| &s.color, |s| &mut s.color)
                .field("roughness", |s| &s.roughness, |s| &mut s.roughness)
        })
    }
}

impl Material for MatteMaterial {
    fn albedo(&self, uv: [f32; 2]) -> Vec3 {
        evaluate_slot(&self.color, uv)
    }
}

// ---------------------------------------------------------------------------
// MirrorMaterial
// ---------------------------------------------------------------------------

/// Perfect specular reflector.
#[derive(Debug)]
pub struct MirrorMaterial {
    pub tint: Own<dyn Shader>,
}

impl Default for MirrorMaterial {
    fn default() -> Self {
        Self {
            tint: shader(FloatShader { value: 1.0 }),
        }
    }
}

impl Reflect for MirrorMaterial {
    const TYPE_NAME: &'static str = "MirrorMaterial";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<MirrorMaterial>> = OnceLock::new();
        SCHEMA.get_or_init(|| Schema::<Self>::new().field("tint", |s| &s.tint, |s| &mut s.tint))
    }
}

impl Material for MirrorMaterial {
    fn albedo(&self, uv: [f32; 2]) -> Vec3 {
        evaluate_slot(&self.tint, uv)
    }
}

// ---------------------------------------------------------------------------
// EmissiveMaterial
// ---------------------------------------------------------------------------

/// Area light surface.
#[derive(Debug)]
pub struct EmissiveMaterial {
    pub emission: Own<dyn Shader>,
    pub strength: f32,
}

impl Default for EmissiveMaterial {
    fn default() -> Self {
        Self {
            emission: shader(FloatShader { value: 1.0 }),
            strength: 1.0,
        }
    }
}

impl Reflect for EmissiveMaterial {
    const TYPE_NAME: &'static str = "EmissiveMaterial";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<EmissiveMaterial>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("emission", |s| &s.emission, |s| &mut s.emission)
                .field("strength", |s| &s.strength, |s| &mut s.strength)
        })
    }
}

impl Material for EmissiveMaterial {
    fn albedo(&self, _uv: [f32; 2]) -> Vec3 {
        [0.0; 3]
    }

    fn emission(&self, uv: [f32; 2]) -> Vec3 {
        scale(evaluate_slot(&self.emission, uv), self.strength)
    }
}

// ---------------------------------------------------------------------------
// MixedMaterial
// ---------------------------------------------------------------------------

/// Blend of two nested materials; `fraction` selects the share of `second`.
#[derive(Debug, Default)]
pub struct MixedMaterial {
    pub first: Own<dyn Material>,
    pub second: Own<dyn Material>,
    pub fraction: Own<dyn Shader>,
}

impl Reflect for MixedMaterial {
    const TYPE_NAME: &'static str = "MixedMaterial";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<MixedMaterial>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("first", |s| &s.first, |s| &mut s.first)
                .field("second", |s| &s.second, |s| &mut s.second)
                .field("fraction", |s| &s.fraction, |s| &mut s.fraction)
        })
    }
}

impl MixedMaterial {
    fn blend(&self, uv: [f32; 2], channel: impl Fn(&dyn Material) -> Vec3) -> Vec3 {
        let t = evaluate_slot(&self.fraction, uv)[0].clamp(0.0, 1.0);
        let a = self.first.get().map_or([0.0; 3], &channel);
        let b = self.second.get().map_or([0.0; 3], &channel);
        add(scale(a, 1.0 - t), scale(b, t))
    }
}

impl Material for MixedMaterial {
    fn albedo(&self, uv: [f32; 2]) -> Vec3 {
        self.blend(uv, |m| m.albedo(uv))
    }

    fn emission(&self, uv: [f32; 2]) -> Vec3 {
        self.blend(uv, |m| m.emission(uv))
    }
}

/// Register every material implementation.
pub fn register(registry: &mut TypeRegistry) {
    registry.register_implementation::<MatteMaterial, dyn Material>(|b| b);
    registry.register_implementation::<MirrorMaterial, dyn Material>(|b| b);
    registry.register_implementation::<EmissiveMaterial, dyn Material>(|b| b);
    registry.register_implementation::<MixedMaterial, dyn Material>(|b| b);
}
