use glam::Vec3;

use crate::options::RendererOptions;
use crate::sdf::{Field, FieldSample};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Limits applied to a single sphere trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchLimits {
    pub min_dist: f32,
    pub max_dist: f32,
    pub max_iterations: u32,
}

impl From<&RendererOptions> for MarchLimits {
    fn from(options: &RendererOptions) -> Self {
        Self {
            min_dist: options.min_dist,
            max_dist: options.max_dist,
            max_iterations: options.max_iterations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarchResult {
    Hit {
        point: Vec3,
        distance: f32,
        iterations: u32,
        sample: FieldSample,
    },
    Miss {
        distance: f32,
    },
}

impl MarchResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, MarchResult::Hit { .. })
    }

    pub fn distance(&self) -> f32 {
        match self {
            MarchResult::Hit { distance, .. } | MarchResult::Miss { distance } => *distance,
        }
    }
}

/// Sphere traces `ray` through `field`.
///
/// Terminates after at most `limits.max_iterations` field evaluations. A
/// non-finite field value ends the march as a miss at the distance reached
/// so far. With `inside` set the field is negated, which lets refracted rays
/// travel through the solid until they reach its far side.
pub fn march<F: Field + ?Sized>(
    ray: &Ray,
    field: &F,
    limits: &MarchLimits,
    inside: bool,
) -> MarchResult {
    let sign = if inside { -1.0 } else { 1.0 };
    let mut travelled = 0.0_f32;

    for iteration in 0..limits.max_iterations {
        let point = ray.at(travelled);
        let sample = field.sample(point);
        let step = sign * sample.distance;
        if !step.is_finite() {
            return MarchResult::Miss {
                distance: travelled,
            };
        }
        if step < limits.min_dist {
            return MarchResult::Hit {
                point,
                distance: travelled,
                iterations: iteration + 1,
                sample,
            };
        }
        travelled += step;
        if travelled > limits.max_dist {
            return MarchResult::Miss {
                distance: travelled,
            };
        }
    }

    MarchResult::Miss {
        distance: travelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{FoldParams, FractalTag, SceneOptions};
    use crate::sdf::Scene;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Plane;

    impl Field for Plane {
        fn sample(&self, point: Vec3) -> FieldSample {
            FieldSample {
                distance: point.y,
                trap: 0.0,
                ground: true,
            }
        }
    }

    struct Poisoned;

    impl Field for Poisoned {
        fn sample(&self, _: Vec3) -> FieldSample {
            FieldSample {
                distance: f32::NAN,
                trap: 0.0,
                ground: false,
            }
        }
    }

    fn limits(max_iterations: u32) -> MarchLimits {
        MarchLimits {
            min_dist: 1e-4,
            max_dist: 20.0,
            max_iterations,
        }
    }

    #[test]
    fn hits_plane_at_expected_distance() {
        let ray = Ray::new(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y);
        match march(&ray, &Plane, &limits(64), false) {
            MarchResult::Hit { distance, point, .. } => {
                assert!((distance - 2.0).abs() < 1e-3);
                assert!(point.y.abs() < 1e-3);
            }
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn misses_when_leaving_max_distance() {
        let ray = Ray::new(Vec3::new(0.0, 2.0, 0.0), Vec3::Y);
        let result = march(&ray, &Plane, &limits(64), false);
        assert!(!result.is_hit());
        assert!(result.distance() > 20.0);
    }

    #[test]
    fn non_finite_distance_is_an_immediate_miss() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(
            march(&ray, &Poisoned, &limits(64), false),
            MarchResult::Miss { distance: 0.0 }
        );

        let mut options = SceneOptions::default();
        options.fractal.set_kind(crate::options::FractalKind::Sierpinski(FoldParams {
            scale: 0.0,
            center: Vec3::ONE,
        }));
        let scene = Scene::new(&options);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 4.0), Vec3::NEG_Z);
        assert!(!march(&ray, &scene, &limits(64), false).is_hit());
    }

    /// Counts how often the wrapped field is evaluated.
    struct Counting<'a, F: Field> {
        inner: &'a F,
        calls: AtomicU32,
    }

    impl<'a, F: Field> Counting<'a, F> {
        fn new(inner: &'a F) -> Self {
            Self {
                inner,
                calls: AtomicU32::new(0),
            }
        }

        fn take(&self) -> u32 {
            self.calls.swap(0, Ordering::Relaxed)
        }
    }

    impl<F: Field> Field for Counting<'_, F> {
        fn sample(&self, point: Vec3) -> FieldSample {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.sample(point)
        }
    }

    /// Never converges: every step is larger than `min_dist` but too short
    /// to leave `max_dist` within the cap.
    struct Crawl;

    impl Field for Crawl {
        fn sample(&self, _: Vec3) -> FieldSample {
            FieldSample {
                distance: 1e-3,
                trap: 0.0,
                ground: false,
            }
        }
    }

    #[test]
    fn field_evaluations_never_exceed_cap() {
        const CAP: u32 = 16;
        let mut hits = 0;
        let mut misses = 0;
        for tag in FractalTag::ALL {
            let mut options = SceneOptions::default();
            options.fractal.select(tag);
            options.renderer.max_iterations = CAP;
            let scene = Scene::new(&options);
            let counting = Counting::new(&scene);
            for i in 0..32 {
                let angle = i as f32 * 0.2;
                let origin = Vec3::new(angle.cos() * 4.0, 0.3, angle.sin() * 4.0);
                let ray = Ray::new(origin, -origin + Vec3::new(0.1, 0.05, 0.0));
                let result = march(&ray, &counting, &limits(CAP), false);
                let calls = counting.take();
                assert!(calls >= 1);
                assert!(calls <= CAP, "{tag:?} ray {i}: {calls} evaluations");
                match result {
                    MarchResult::Hit { iterations, .. } => {
                        assert_eq!(iterations, calls);
                        hits += 1;
                    }
                    MarchResult::Miss { .. } => misses += 1,
                }
            }
        }
        assert_eq!(hits + misses, 4 * 32);
        assert!(misses > 0);
    }

    #[test]
    fn exhausted_march_is_a_miss_at_the_cap() {
        let counting = Counting::new(&Crawl);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let result = march(&ray, &counting, &limits(16), false);
        assert_eq!(counting.take(), 16);
        assert!(!result.is_hit());
        assert!((result.distance() - 16.0 * 1e-3).abs() < 1e-5);
    }

    #[test]
    fn inside_flag_marches_to_the_far_side() {
        let ray = Ray::new(Vec3::new(0.0, -1.0, 0.0), Vec3::Y);
        match march(&ray, &Plane, &limits(64), true) {
            MarchResult::Hit { distance, .. } => assert!((distance - 1.0).abs() < 1e-3),
            other => panic!("expected exit hit, got {other:?}"),
        }
    }
}
