//! Distance estimators for the supported fractals.
//!
//! Every estimator returns a lower bound on the distance from a point to the
//! fractal surface (negative inside the solid). Overestimating lets rays
//! tunnel through thin features, so the bounds here are conservative.

use glam::{Quat, Vec3};

use crate::options::{
    FoldParams, FractalKind, MandelboxParams, MandelbulbParams, SceneOptions,
};

/// Squared magnitude past which an orbit is considered escaped.
pub const ESCAPE_RADIUS2: f32 = 1.0e4;

/// The Mandelbulb derivative estimate degrades past this radius.
pub const MANDELBULB_BAILOUT: f32 = 2.0;

/// Height of the optional ground plane below the fractal.
pub const GROUND_DEPTH: f32 = 1.5;

/// Result of evaluating the field at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSample {
    pub distance: f32,
    /// Smallest orbit radius seen while iterating; drives the palette.
    pub trap: f32,
    pub ground: bool,
}

/// A scalar field that can be sphere traced.
pub trait Field: Sync {
    fn sample(&self, point: Vec3) -> FieldSample;

    fn distance(&self, point: Vec3) -> f32 {
        self.sample(point).distance
    }
}

/// Evaluates `kind` at `point`, iterating at most `max_iterations` times.
pub fn distance(kind: &FractalKind, point: Vec3, max_iterations: u32) -> f32 {
    estimate(kind, point, max_iterations).distance
}

pub fn estimate(kind: &FractalKind, point: Vec3, max_iterations: u32) -> FieldSample {
    let (distance, trap) = match kind {
        FractalKind::Mandelbulb(params) => mandelbulb(params, point, max_iterations),
        FractalKind::Mandelbox(params) => mandelbox(params, point, max_iterations),
        FractalKind::Sierpinski(params) => sierpinski(params, point, max_iterations),
        FractalKind::Menger(params) => menger(params, point, max_iterations),
    };
    FieldSample {
        distance,
        trap,
        ground: false,
    }
}

fn mandelbulb(params: &MandelbulbParams, point: Vec3, max_iterations: u32) -> (f32, f32) {
    let power = params.power;
    let mut z = point;
    let mut dr = 1.0_f32;
    let mut r = z.length();
    let mut trap = r;

    for _ in 0..max_iterations {
        r = z.length();
        if r > MANDELBULB_BAILOUT {
            break;
        }
        trap = trap.min(r);

        let theta = if r > 0.0 {
            (z.z / r).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };
        let phi = z.y.atan2(z.x);
        dr = r.powf(power - 1.0) * power * dr + 1.0;

        let zr = r.powf(power);
        let theta = theta * power;
        let phi = phi * power;
        z = zr * Vec3::new(theta.sin() * phi.cos(), phi.sin() * theta.sin(), theta.cos()) + point;
        r = z.length();
    }

    if r <= f32::MIN_POSITIVE {
        return (0.0, trap);
    }
    (0.5 * r.ln() * r / dr, trap)
}

fn mandelbox(params: &MandelboxParams, point: Vec3, max_iterations: u32) -> (f32, f32) {
    let limit = params.folding_limit;
    let mut z = point;
    let mut dr = 1.0_f32;
    let mut trap = f32::MAX;

    for _ in 0..max_iterations {
        // Box fold.
        z = z.clamp(Vec3::splat(-limit), Vec3::splat(limit)) * 2.0 - z;

        // Sphere fold.
        let r2 = z.length_squared();
        if r2 < params.min_radius2 {
            let factor = params.fixed_radius2 / params.min_radius2;
            z *= factor;
            dr *= factor;
        } else if r2 < params.fixed_radius2 {
            let factor = params.fixed_radius2 / r2;
            z *= factor;
            dr *= factor;
        }

        z = params.scale * z + point;
        dr = dr * params.scale.abs() + 1.0;

        let r2 = z.length_squared();
        trap = trap.min(r2.sqrt());
        if r2 > ESCAPE_RADIUS2 {
            break;
        }
    }

    (z.length() / dr.abs(), trap)
}

fn sierpinski(params: &FoldParams, point: Vec3, max_iterations: u32) -> (f32, f32) {
    let scale = params.scale;
    let offset = params.center * (scale - 1.0);
    let mut z = point;
    let mut contraction = 1.0_f32;
    let mut trap = f32::MAX;

    for _ in 0..max_iterations {
        if z.x + z.y < 0.0 {
            (z.x, z.y) = (-z.y, -z.x);
        }
        if z.x + z.z < 0.0 {
            (z.x, z.z) = (-z.z, -z.x);
        }
        if z.y + z.z < 0.0 {
            (z.y, z.z) = (-z.z, -z.y);
        }
        z = z * scale - offset;
        contraction *= scale;

        let r2 = z.length_squared();
        trap = trap.min(r2.sqrt());
        if r2 > ESCAPE_RADIUS2 {
            break;
        }
    }

    ((z.length() - params.center.length()) / contraction, trap)
}

fn menger(params: &FoldParams, point: Vec3, max_iterations: u32) -> (f32, f32) {
    let scale = params.scale;
    let offset = params.center * (scale - 1.0);
    let mut z = point;
    let mut contraction = 1.0_f32;
    let mut trap = f32::MAX;

    for _ in 0..max_iterations {
        z = z.abs();
        if z.x < z.y {
            (z.x, z.y) = (z.y, z.x);
        }
        if z.x < z.z {
            (z.x, z.z) = (z.z, z.x);
        }
        if z.y < z.z {
            (z.y, z.z) = (z.z, z.y);
        }

        z.x = scale * z.x - offset.x;
        z.y = scale * z.y - offset.y;
        z.z *= scale;
        if z.z > 0.5 * offset.z {
            z.z -= offset.z;
        }
        contraction *= scale;

        let r2 = z.length_squared();
        trap = trap.min(r2.sqrt());
        if r2 > ESCAPE_RADIUS2 {
            break;
        }
    }

    ((z.length() - params.center.length()) / contraction, trap)
}

/// The active fractal placed in the world, plus the optional ground plane.
#[derive(Debug, Clone, Copy)]
pub struct Scene {
    kind: FractalKind,
    max_iterations: u32,
    /// World-to-fractal rotation.
    inverse_rotation: Quat,
    ground: bool,
}

impl Scene {
    pub fn new(options: &SceneOptions) -> Self {
        let rotation = Quat::from_rotation_y(options.look.angle_a.to_radians())
            * Quat::from_rotation_x(options.look.angle_b.to_radians());
        Self {
            kind: options.fractal.kind(),
            max_iterations: options.renderer.max_iterations.max(1),
            inverse_rotation: rotation.inverse(),
            ground: options.look.ground,
        }
    }

    pub fn kind(&self) -> &FractalKind {
        &self.kind
    }
}

impl Field for Scene {
    fn sample(&self, point: Vec3) -> FieldSample {
        let local = self.inverse_rotation * point;
        let fractal = estimate(&self.kind, local, self.max_iterations);
        if !self.ground {
            return fractal;
        }

        let floor = point.y + GROUND_DEPTH;
        if floor < fractal.distance || fractal.distance.is_nan() {
            FieldSample {
                distance: floor,
                trap: fractal.trap,
                ground: true,
            }
        } else {
            fractal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::FractalTag;
    use rand::prelude::*;

    const ITERATIONS: u32 = 12;

    fn fibonacci_directions(count: usize) -> Vec<Vec3> {
        (0..count)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f32 + 0.5) / count as f32;
                let r = (1.0 - y * y).sqrt();
                let t = i as f32 * 2.399_963;
                Vec3::new(r * t.cos(), y, r * t.sin())
            })
            .collect()
    }

    /// Points on the attractor of `maps`, found with the chaos game.
    fn attractor(maps: &[Box<dyn Fn(Vec3) -> Vec3>], count: usize) -> Vec<Vec3> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut x = Vec3::ZERO;
        let mut points = Vec::with_capacity(count);
        for i in 0..count + 50 {
            let map = &maps[rng.gen_range(0..maps.len())];
            x = map(x);
            if i >= 50 {
                points.push(x);
            }
        }
        points
    }

    fn sierpinski_attractor() -> Vec<Vec3> {
        let vertices = [
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
        ];
        let maps: Vec<Box<dyn Fn(Vec3) -> Vec3>> = vertices
            .iter()
            .map(|&v| Box::new(move |x: Vec3| (x + v) * 0.5) as Box<dyn Fn(Vec3) -> Vec3>)
            .collect();
        let mut points = attractor(&maps, 20_000);
        points.extend(vertices);
        points
    }

    fn menger_attractor() -> Vec<Vec3> {
        let mut maps: Vec<Box<dyn Fn(Vec3) -> Vec3>> = Vec::new();
        for a in -1..=1 {
            for b in -1..=1 {
                for c in -1..=1 {
                    let zeros = [a, b, c].iter().filter(|&&v| v == 0).count();
                    if zeros <= 1 {
                        let v = Vec3::new(a as f32, b as f32, c as f32);
                        maps.push(Box::new(move |x: Vec3| (x + 2.0 * v) / 3.0));
                    }
                }
            }
        }
        assert_eq!(maps.len(), 20);
        attractor(&maps, 20_000)
    }

    fn nearest(points: &[Vec3], p: Vec3) -> f32 {
        points
            .iter()
            .map(|q| q.distance(p))
            .fold(f32::MAX, f32::min)
    }

    #[test]
    fn folding_estimators_never_overestimate() {
        let cases = [
            (FractalKind::Sierpinski(FoldParams::SIERPINSKI), sierpinski_attractor()),
            (FractalKind::Menger(FoldParams::MENGER), menger_attractor()),
        ];
        for (kind, points) in &cases {
            for radius in [1.5_f32, 2.0, 3.0] {
                for dir in fibonacci_directions(40) {
                    let p = dir * radius;
                    let estimate = distance(kind, p, ITERATIONS);
                    let truth = nearest(points, p);
                    assert!(
                        estimate <= truth + 1e-3,
                        "{kind:?} at {p:?}: estimate {estimate} > sampled distance {truth}"
                    );
                }
            }
        }
    }

    /// Centres of the cells in a cube lattice of pitch `step` covering
    /// `[-extent, extent]^3` whose orbit stays bounded.
    fn solid_lattice(extent: f32, step: f32, bounded: impl Fn(Vec3) -> bool) -> Vec<Vec3> {
        let cells = (2.0 * extent / step).ceil() as i32;
        let mut points = Vec::new();
        for i in 0..cells {
            for j in 0..cells {
                for k in 0..cells {
                    let p = Vec3::new(i as f32, j as f32, k as f32) * step
                        - Vec3::splat(extent)
                        + Vec3::splat(step * 0.5);
                    if bounded(p) {
                        points.push(p);
                    }
                }
            }
        }
        points
    }

    fn bulb_orbit_bounded(c: Vec3, power: f32) -> bool {
        let mut z = c;
        for _ in 0..ITERATIONS {
            let r = z.length();
            if r > MANDELBULB_BAILOUT {
                return false;
            }
            if r == 0.0 {
                z = c;
                continue;
            }
            let theta = (z.z / r).clamp(-1.0, 1.0).acos() * power;
            let phi = z.y.atan2(z.x) * power;
            let rp = r.powf(power);
            z = rp * Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()) + c;
        }
        z.length() <= MANDELBULB_BAILOUT
    }

    fn box_orbit_bounded(c: Vec3, params: &MandelboxParams) -> bool {
        let limit = Vec3::splat(params.folding_limit);
        let mut z = c;
        for _ in 0..ITERATIONS {
            z = z.clamp(-limit, limit) * 2.0 - z;
            let r2 = z.length_squared();
            if r2 < params.min_radius2 {
                z *= params.fixed_radius2 / params.min_radius2;
            } else if r2 < params.fixed_radius2 {
                z *= params.fixed_radius2 / r2;
            }
            z = params.scale * z + c;
            if z.length_squared() > ESCAPE_RADIUS2 {
                return false;
            }
        }
        true
    }

    /// Checks `estimate <= nearest solid cell + slack` at shells around the set.
    fn assert_below_lattice(kind: &FractalKind, solid: &[Vec3], radii: &[f32], slack: f32) {
        assert!(!solid.is_empty());
        let mut informative = 0;
        for &radius in radii {
            for dir in fibonacci_directions(60) {
                let p = dir * radius;
                let estimate = distance(kind, p, ITERATIONS);
                let truth = nearest(solid, p);
                assert!(estimate.is_finite());
                assert!(
                    estimate <= truth + slack,
                    "{kind:?} at {p:?}: estimate {estimate} > lattice distance {truth}"
                );
                // Only points well inside |p| make the check sharper than
                // the trivial bound through the origin.
                if truth + slack < 0.75 * radius {
                    informative += 1;
                }
            }
        }
        assert!(informative > 0);
    }

    #[test]
    fn mandelbulb_never_overestimates_lattice_distance() {
        let params = MandelbulbParams::default();
        let step = 0.04;
        let solid = solid_lattice(1.25, step, |p| bulb_orbit_bounded(p, params.power));
        assert_below_lattice(
            &FractalKind::Mandelbulb(params),
            &solid,
            &[1.3, 1.6, 2.0],
            step * 3.0_f32.sqrt(),
        );
    }

    #[test]
    fn mandelbox_never_overestimates_lattice_distance() {
        let params = MandelboxParams::default();
        let step = 0.2;
        let solid = solid_lattice(6.2, step, |p| box_orbit_bounded(p, &params));
        assert_below_lattice(
            &FractalKind::Mandelbox(params),
            &solid,
            &[7.0, 8.5, 10.0],
            step * 3.0_f32.sqrt(),
        );
    }

    #[test]
    fn escape_time_estimators_stay_finite_far_away() {
        let kinds = [
            FractalKind::Mandelbulb(MandelbulbParams::default()),
            FractalKind::Mandelbox(MandelboxParams::default()),
        ];
        for kind in &kinds {
            for dir in fibonacci_directions(20) {
                let p = dir * 50.0;
                let estimate = distance(kind, p, ITERATIONS);
                assert!(estimate.is_finite() && estimate > 0.0, "{kind:?} at {p:?}");
                // The origin belongs to both sets.
                assert!(estimate <= 50.0 + 1e-3);
            }
        }
    }

    #[test]
    fn sierpinski_is_exact_along_vertex_direction() {
        let kind = FractalKind::Sierpinski(FoldParams::SIERPINSKI);
        let estimate = distance(&kind, Vec3::splat(2.0), ITERATIONS);
        assert!((estimate - 3.0_f32.sqrt()).abs() < 1e-4, "{estimate}");
        assert!(distance(&kind, Vec3::ONE, ITERATIONS).abs() < 1e-5);
    }

    #[test]
    fn sign_distinguishes_inside_from_outside() {
        let bulb = FractalKind::Mandelbulb(MandelbulbParams::default());
        assert!(distance(&bulb, Vec3::new(2.0, 0.0, 0.0), ITERATIONS) > 0.5);
        assert!(distance(&bulb, Vec3::splat(0.1), ITERATIONS) < 0.0);
        assert_eq!(distance(&bulb, Vec3::ZERO, ITERATIONS), 0.0);

        let menger = FractalKind::Menger(FoldParams::MENGER);
        assert!(distance(&menger, Vec3::ZERO, ITERATIONS) > 0.4);
    }

    #[test]
    fn zero_scale_produces_non_finite_distance() {
        let kind = FractalKind::Sierpinski(FoldParams {
            scale: 0.0,
            center: Vec3::ONE,
        });
        assert!(!distance(&kind, Vec3::new(1.0, 2.0, 3.0), ITERATIONS).is_finite());
    }

    #[test]
    fn scene_applies_ground_and_rotation() {
        let mut options = SceneOptions::default();
        options.look.ground = true;
        let scene = Scene::new(&options);
        let below = scene.sample(Vec3::new(0.0, -1.4, 0.0));
        assert!(below.ground);
        assert!((below.distance - 0.1).abs() < 1e-5);

        options.look.ground = false;
        options.fractal.select(FractalTag::Sierpinski);
        let plain = Scene::new(&options).distance(Vec3::splat(2.0));
        options.look.angle_a = 90.0;
        let rotated = Scene::new(&options).distance(Vec3::splat(2.0));
        assert!((plain - rotated).abs() > 1e-3);
    }
}
