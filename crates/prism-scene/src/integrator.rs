//! Light transport integrators.
//!
//! Integrators carry only their settings here; the scene layer persists and
//! swaps them, rendering happens elsewhere.

use std::sync::OnceLock;

use prism_reflect::prelude::*;

pub trait Integrator: Component {
    /// Samples taken per pixel.
    fn samples_per_pixel(&self) -> u32;

    /// Longest light path followed, `None` when unbounded.
    fn max_depth(&self) -> Option<u32> {
        None
    }
}

prism_reflect::declare_interface!(Integrator, "Integrator");

// ---------------------------------------------------------------------------
// PathTracer
// ---------------------------------------------------------------------------

/// Unidirectional path tracing with Russian roulette after `min_depth`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTracer {
    pub spp: u32,
    pub min_depth: u32,
    pub max_depth: u32,
    /// Per-sample radiance clamp, `0` disables clamping.
    pub ray_clamp: f32,
}

impl Default for PathTracer {
    fn default() -> Self {
        Self {
            spp: 64,
            min_depth: 3,
            max_depth: 16,
            ray_clamp: 0.0,
        }
    }
}

impl Reflect for PathTracer {
    const TYPE_NAME: &'static str = "PathTracer";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<PathTracer>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("spp", |s| &s.spp, |s| &mut s.spp)
                .field("min_depth", |s| &s.min_depth, |s| &mut s.min_depth)
                .field("max_depth", |s| &s.max_depth, |s| &mut s.max_depth)
                .field("ray_clamp", |s| &s.ray_clamp, |s| &mut s.ray_clamp)
        })
    }
}

impl Integrator for PathTracer {
    fn samples_per_pixel(&self) -> u32 {
        self.spp
    }

    fn max_depth(&self) -> Option<u32> {
        Some(self.max_depth)
    }
}

// ---------------------------------------------------------------------------
// BidirectionalPathTracer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BidirectionalPathTracer {
    pub spp: u32,
    pub max_depth: u32,
}

impl Default for BidirectionalPathTracer {
    fn default() -> Self {
        Self {
            spp: 32,
            max_depth: 10,
        }
    }
}

impl Reflect for BidirectionalPathTracer {
    const TYPE_NAME: &'static str = "BidirectionalPathTracer";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<BidirectionalPathTracer>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("spp", |s| &s.spp, |s| &mut s.spp)
                .field("max_depth", |s| &s.max_depth, |s| &mut s.max_depth)
        })
    }
}

impl Integrator for BidirectionalPathTracer {
    fn samples_per_pixel(&self) -> u32 {
        self.spp
    }

    fn max_depth(&self) -> Option<u32> {
        Some(self.max_depth)
    }
}

// ---------------------------------------------------------------------------
// DirectLighting
// ---------------------------------------------------------------------------

/// Single-bounce estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectLighting {
    pub spp: u32,
}

impl Default for DirectLighting {
    fn default() -> Self {
        Self { spp: 16 }
    }
}

impl Reflect for DirectLighting {
    const TYPE_NAME: &'static str = "DirectLighting";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<DirectLighting>> = OnceLock::new();
        SCHEMA.get_or_init(|| Schema::<Self>::new().field("spp", |s| &s.spp, |s| &mut s.spp))
    }
}

impl Integrator for DirectLighting {
    fn samples_per_pixel(&self) -> u32 {
        self.spp
    }

    fn max_depth(&self) -> Option<u32> {
        Some(1)
    }
}

// ---------------------------------------------------------------------------
// AmbientOcclusion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientOcclusion {
    pub spp: u32,
    /// Hits farther than this do not occlude; non-positive means infinite.
    pub occlude_distance: f32,
}

impl Default for AmbientOcclusion {
    fn default() -> Self {
        Self {
            spp: 16,
            occlude_distance: 0.0,
        }
    }
}

impl Reflect for AmbientOcclusion {
    const TYPE_NAME: &'static str = "AmbientOcclusion";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<AmbientOcclusion>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("spp", |s| &s.spp, |s| &mut s.spp)
                .field("occlude_distance", |s| &s.occlude_distance, |s| &mut s.occlude_distance)
        })
    }
}

impl Integrator for AmbientOcclusion {
    fn samples_per_pixel(&self) -> u32 {
        self.spp
    }
}

/// Register every integrator implementation.
pub fn register(registry: &mut TypeRegistry) {
    registry.register_implementation::<PathTracer, dyn Integrator>(|b| b);
    registry.register_implementation::<BidirectionalPathTracer, dyn Integrator>(|b| b);
    registry.register_implementation::<DirectLighting, dyn Integrator>(|b| b);
    registry.register_implementation::<AmbientOcclusion, dyn Integrator>(|b| b);
}
