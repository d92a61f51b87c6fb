//! Shaders: texture-like functions of surface coordinates.

use std::sync::OnceLock;

use prism_reflect::prelude::*;

use crate::math::{scale, Vec3};

pub trait Shader: Component {
    /// Value at surface coordinates `uv`.
    fn evaluate(&self, uv: [f32; 2]) -> Vec3;
}

prism_reflect::declare_interface!(Shader, "Shader");

/// Evaluate an optional shader slot; an empty slot is black.
pub fn evaluate_slot(slot: &Own<dyn Shader>, uv: [f32; 2]) -> Vec3 {
    slot.get().map_or([0.0; 3], |shader| shader.evaluate(uv))
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

/// The same scalar in every channel.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatShader {
    pub value: f32,
}

impl Default for FloatShader {
    fn default() -> Self {
        Self { value: 1.0 }
    }
}

impl Reflect for FloatShader {
    const TYPE_NAME: &'static str = "FloatShader";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<FloatShader>> = OnceLock::new();
        SCHEMA.get_or_init(|| Schema::<Self>::new().field("value", |s| &s.value, |s| &mut s.value))
    }
}

impl Shader for FloatShader {
    fn evaluate(&self, _uv: [f32; 2]) -> Vec3 {
        [self.value; 3]
    }
}

/// A constant color with an intensity multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbShader {
    pub color: Vec3,
    pub multiplier: f32,
}

impl Default for RgbShader {
    fn default() -> Self {
        Self {
            color: [0.8; 3],
            multiplier: 1.0,
        }
    }
}

impl Reflect for RgbShader {
    const TYPE_NAME: &'static str = "RgbShader";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<RgbShader>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("color", |s| &s.color, |s| &mut s.color)
                .field("multiplier", |s| &s.multiplier, |s| &mut s.multiplier)
        })
    }
}

impl Shader for RgbShader {
    fn evaluate(&self, _uv: [f32; 2]) -> Vec3 {
        scale(self.color, self.multiplier)
    }
}

/// Alternates between two nested shaders on a `frequency x frequency`
/// grid.
#[derive(Debug)]
pub struct CheckerShader {
    pub even: Own<dyn Shader>,
    pub odd: Own<dyn Shader>,
    pub frequency: f32,
}

impl Default for CheckerShader {
    fn default() -> Self {
        Self {
            even: Own::null(),
            odd: Own::null(),
            frequency: 8.0,
        }
    }
}

impl Reflect for CheckerShader {
    const TYPE_NAME: &'static str = "CheckerShader";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<CheckerShader>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("even", |s| &s.even, |s| &mut s.even)
                .field("odd", |s| &s.odd, |s| &mut s.odd)
                .field("frequency", |s| &s.frequency, |s| &mut s.frequency)
        })
    }
}

impl Shader for CheckerShader {
    fn evaluate(&self, uv: [f32; 2]) -> Vec3 {
        let cell = (uv[0] * self.frequency).floor() + (uv[1] * self.frequency).floor();
        if cell.rem_euclid(2.0) < 1.0 {
            evaluate_slot(&self.even, uv)
        } else {
            evaluate_slot(&self.odd, uv)
        }
    }
}

/// Register every shader implementation.
pub fn register(registry: &mut TypeRegistry) {
    registry.register_implementation::<FloatShader, dyn Shader>(|b| b);
    registry.register_implementation::<RgbShader, dyn Shader>(|b| b);
    registry.register_implementation::<CheckerShader, dyn Shader>(|b| b);
}
