//! Sample generators.
//!
//! Samplers are deterministic: each `(pixel, index)` pair reseeds a PCG
//! stream from the persisted `seed`, so a reloaded scene reproduces the same
//! sample sequence. The generator state itself is transient.

use std::sync::OnceLock;

use prism_reflect::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

pub trait Sampler: Component {
    /// Position the stream at sample `index` of `pixel`.
    fn start_pixel(&mut self, pixel: [u32; 2], index: u32);

    /// Next value in `[0, 1)`.
    fn next_1d(&mut self) -> f32;

    fn next_2d(&mut self) -> [f32; 2] {
        [self.next_1d(), self.next_1d()]
    }
}

prism_reflect::declare_interface!(Sampler, "Sampler");

/// Stream seed for one pixel sample.
fn stream_seed(seed: u64, pixel: [u32; 2], index: u32) -> u64 {
    let mut h = seed ^ 0x9e37_79b9_7f4a_7c15;
    for word in [pixel[0], pixel[1], index] {
        h = (h ^ u64::from(word)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        h ^= h >> 31;
    }
    h
}

// ---------------------------------------------------------------------------
// RandomSampler
// ---------------------------------------------------------------------------

/// Independent uniform samples.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    pub seed: u64,
    rng: Pcg32,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Reflect for RandomSampler {
    const TYPE_NAME: &'static str = "RandomSampler";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<RandomSampler>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("seed", |s| &s.seed, |s| &mut s.seed)
                .transient("rng")
        })
    }
}

impl Sampler for RandomSampler {
    fn start_pixel(&mut self, pixel: [u32; 2], index: u32) {
        self.rng = Pcg32::seed_from_u64(stream_seed(self.seed, pixel, index));
    }

    fn next_1d(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }
}

// ---------------------------------------------------------------------------
// StratifiedSampler
// ---------------------------------------------------------------------------

/// One sample per stratum of a `strata`-cell partition of `[0, 1)`,
/// optionally jittered inside its cell.
#[derive(Debug, Clone)]
pub struct StratifiedSampler {
    pub strata: u32,
    pub jitter: bool,
    pub seed: u64,
    rng: Pcg32,
    cursor: u32,
}

impl Default for StratifiedSampler {
    fn default() -> Self {
        Self {
            strata: 4,
            jitter: true,
            seed: 0,
            rng: Pcg32::seed_from_u64(0),
            cursor: 0,
        }
    }
}

impl Reflect for StratifiedSampler {
    const TYPE_NAME: &'static str = "StratifiedSampler";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<StratifiedSampler>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("strata", |s| &s.strata, |s| &mut s.strata)
                .field("jitter", |s| &s.jitter, |s| &mut s.jitter)
                .field("seed", |s| &s.seed, |s| &mut s.seed)
                .transient("rng")
                .transient("cursor")
        })
    }
}

impl Sampler for StratifiedSampler {
    fn start_pixel(&mut self, pixel: [u32; 2], index: u32) {
        self.rng = Pcg32::seed_from_u64(stream_seed(self.seed, pixel, index));
        self.cursor = index;
    }

    fn next_1d(&mut self) -> f32 {
        let strata = self.strata.max(1);
        let cell = self.cursor % strata;
        self.cursor = self.cursor.wrapping_add(1);
        let offset = if self.jitter { self.rng.gen::<f32>() } else { 0.5 };
        ((cell as f32 + offset) / strata as f32).min(1.0 - f32::EPSILON)
    }
}

/// Register every sampler implementation.
pub fn register(registry: &mut TypeRegistry) {
    registry.register_implementation::<RandomSampler, dyn Sampler>(|b| b);
    registry.register_implementation::<StratifiedSampler, dyn Sampler>(|b| b);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(sampler: &mut dyn Sampler, pixel: [u32; 2], index: u32, n: usize) -> Vec<f32> {
        sampler.start_pixel(pixel, index);
        (0..n).map(|_| sampler.next_1d()).collect()
    }

    #[test]
    fn random_sampler_is_reproducible() {
        let mut a = RandomSampler::new(7);
        let mut b = RandomSampler::new(7);
        assert_eq!(draw(&mut a, [3, 4], 0, 8), draw(&mut b, [3, 4], 0, 8));
        assert_ne!(draw(&mut a, [3, 4], 0, 8), draw(&mut b, [3, 4], 1, 8));
    }

    #[test]
    fn samples_in_unit_interval() {
        let mut random = RandomSampler::new(1);
        let mut stratified = StratifiedSampler::default();
        for value in draw(&mut random, [0, 0], 0, 256)
            .into_iter()
            .chain(draw(&mut stratified, [0, 0], 0, 256))
        {
            assert!((0.0..1.0).contains(&value), "{value}");
        }
    }

    #[test]
    fn unjittered_strata_hit_cell_centers() {
        let mut sampler = StratifiedSampler {
            strata: 4,
            jitter: false,
            ..Default::default()
        };
        assert_eq!(draw(&mut sampler, [0, 0], 0, 4), [0.125, 0.375, 0.625, 0.875]);
    }

    #[test]
    fn generator_state_is_not_persisted() {
        let mut reg = TypeRegistry::new();
        register(&mut reg);
        let mut sampler = RandomSampler::new(42);
        sampler.start_pixel([9, 9], 3);
        let document = prism_reflect::save_fixed(&reg, &sampler).unwrap();
        assert_eq!(document["val"]["seed"], 42);
        assert!(document["val"].get("rng").is_none());

        let mut loaded: RandomSampler = prism_reflect::load_fixed(&reg, &document).unwrap();
        let mut fresh = RandomSampler::new(42);
        assert_eq!(draw(&mut loaded, [1, 2], 0, 4), draw(&mut fresh, [1, 2], 0, 4));
    }
}
