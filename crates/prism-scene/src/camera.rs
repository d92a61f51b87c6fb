//! Cameras.
//!
//! A camera maps a normalized film position `(u, v)` in `[0, 1]^2` to a
//! primary ray.

use std::sync::OnceLock;

use prism_reflect::prelude::*;

use crate::math::{add, cross, normalize, scale, sub, Vec3};

/// A primary ray in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Interface of every camera implementation.
pub trait Camera: Component {
    /// The primary ray through film position `(u, v)`.
    fn generate_ray(&self, u: f32, v: f32) -> Ray;
}

prism_reflect::declare_interface!(Camera, "Camera");

const WORLD_UP: Vec3 = [0.0, 1.0, 0.0];

/// Orthonormal `(forward, right, up)` frame looking from `eye` at `target`.
fn look_frame(eye: Vec3, target: Vec3) -> (Vec3, Vec3, Vec3) {
    let forward = normalize(sub(target, eye));
    let right = normalize(cross(forward, WORLD_UP));
    let up = cross(right, forward);
    (forward, right, up)
}

// ---------------------------------------------------------------------------
// PerspectiveCamera
// ---------------------------------------------------------------------------

/// Pinhole camera with a vertical field of view.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub look_at: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: [0.0, 1.0, 6.8],
            look_at: [0.0, 1.0, 0.0],
            fov: 80.0,
        }
    }
}

impl Reflect for PerspectiveCamera {
    const TYPE_NAME: &'static str = "PerspectiveCamera";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<PerspectiveCamera>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("position", |s| &s.position, |s| &mut s.position)
                .field("look_at", |s| &s.look_at, |s| &mut s.look_at)
                .field("fov", |s| &s.fov, |s| &mut s.fov)
        })
    }
}

impl Camera for PerspectiveCamera {
    fn generate_ray(&self, u: f32, v: f32) -> Ray {
        let (forward, right, up) = look_frame(self.position, self.look_at);
        let half = (self.fov.to_radians() * 0.5).tan();
        let offset = add(scale(right, (2.0 * u - 1.0) * half), scale(up, (1.0 - 2.0 * v) * half));
        Ray {
            origin: self.position,
            direction: normalize(add(forward, offset)),
        }
    }
}

// ---------------------------------------------------------------------------
// OrthographicCamera
// ---------------------------------------------------------------------------

/// Parallel projection; `extent` is the half-height of the view in world
/// units.
#[derive(Debug, Clone, PartialEq)]
pub struct OrthographicCamera {
    pub position: Vec3,
    pub look_at: Vec3,
    pub extent: f32,
}

impl Default for OrthographicCamera {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 10.0],
            look_at: [0.0, 0.0, 0.0],
            extent: 1.0,
        }
    }
}

impl Reflect for OrthographicCamera {
    const TYPE_NAME: &'static str = "OrthographicCamera";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<OrthographicCamera>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new()
                .field("position", |s| &s.position, |s| &mut s.position)
                .field("look_at", |s| &s.look_at, |s| &mut s.look_at)
                .field("extent", |s| &s.extent, |s| &mut s.extent)
        })
    }
}

impl Camera for OrthographicCamera {
    fn generate_ray(&self, u: f32, v: f32) -> Ray {
        let (forward, right, up) = look_frame(self.position, self.look_at);
        let offset = add(
            scale(right, (2.0 * u - 1.0) * self.extent),
            scale(up, (1.0 - 2.0 * v) * self.extent),
        );
        Ray {
            origin: add(self.position, offset),
            direction: forward,
        }
    }
}

/// Register every camera implementation.
pub fn register(registry: &mut TypeRegistry) {
    registry.register_implementation::<PerspectiveCamera, dyn Camera>(|b| b);
    registry.register_implementation::<OrthographicCamera, dyn Camera>(|b| b);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn perspective_center_ray_points_at_target() {
        let camera = PerspectiveCamera {
            position: [0.0, 0.0, 5.0],
            look_at: [0.0, 0.0, 0.0],
            fov: 90.0,
        };
        let ray = camera.generate_ray(0.5, 0.5);
        assert_eq!(ray.origin, [0.0, 0.0, 5.0]);
        assert!(close(ray.direction, [0.0, 0.0, -1.0]));
    }

    #[test]
    fn perspective_corner_spans_field_of_view() {
        let camera = PerspectiveCamera {
            position: [0.0, 0.0, 0.0],
            look_at: [0.0, 0.0, -1.0],
            fov: 90.0,
        };
        // Top edge at 45 degrees above the view axis.
        let ray = camera.generate_ray(0.5, 0.0);
        let expected = normalize([0.0, 1.0, -1.0]);
        assert!(close(ray.direction, expected), "{:?}", ray.direction);
    }

    #[test]
    fn orthographic_rays_are_parallel() {
        let camera = OrthographicCamera::default();
        let a = camera.generate_ray(0.0, 0.0);
        let b = camera.generate_ray(1.0, 1.0);
        assert!(close(a.direction, b.direction));
        assert!(close(a.origin, [-1.0, 1.0, 10.0]));
        assert!(close(b.origin, [1.0, -1.0, 10.0]));
    }
}
