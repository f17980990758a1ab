//! Turns a camera ray into a colour under one of the three render modes.

use glam::{Vec2, Vec3};
use rand::Rng;

use crate::march::{march, MarchLimits, MarchResult, Ray};
use crate::options::{FractalOptions, MaterialKind, RenderMode, SceneOptions};
use crate::sdf::{Field, FieldSample};

const PREVIEW_LIGHT: Vec3 = Vec3::new(0.577, 0.577, 0.577);
const KEY_LIGHT: (Vec3, Vec3) = (Vec3::new(0.6, 0.7, 0.4), Vec3::new(1.0, 0.95, 0.85));
const FILL_LIGHT: (Vec3, Vec3) = (Vec3::new(-0.5, 0.2, -0.7), Vec3::new(0.25, 0.3, 0.4));
const SPECULAR_EXPONENT: f32 = 32.0;
const AMBIENT: f32 = 0.12;
const GROUND_ALBEDO: Vec3 = Vec3::splat(0.6);

/// Evaluates one sample for `ray`. The result is always finite.
pub fn shade<F, R>(ray: &Ray, field: &F, options: &SceneOptions, rng: &mut R) -> Vec3
where
    F: Field + ?Sized,
    R: Rng + ?Sized,
{
    let color = match options.mode {
        RenderMode::Preview => preview(ray, field, options),
        RenderMode::DirectLighting => direct(ray, field, options),
        RenderMode::PathTracing => path_trace(ray, field, options, rng),
    };
    if color.is_finite() {
        color
    } else {
        Vec3::ZERO
    }
}

/// Background gradient; also the only emitter for the path tracer.
pub fn sky(direction: Vec3) -> Vec3 {
    let t = 0.5 * (direction.y + 1.0);
    Vec3::ONE.lerp(Vec3::new(0.5, 0.7, 1.0), t)
}

/// Gradient of the field around `point`, by tetrahedral central differences.
pub fn estimate_normal<F: Field + ?Sized>(field: &F, point: Vec3, epsilon: f32) -> Vec3 {
    let k = Vec2::new(1.0, -1.0);
    let a = Vec3::new(k.x, k.y, k.y);
    let b = Vec3::new(k.y, k.y, k.x);
    let c = Vec3::new(k.y, k.x, k.y);
    let d = Vec3::new(k.x, k.x, k.x);
    let gradient = a * field.distance(point + a * epsilon)
        + b * field.distance(point + b * epsilon)
        + c * field.distance(point + c * epsilon)
        + d * field.distance(point + d * epsilon);
    gradient.try_normalize().unwrap_or(Vec3::Y)
}

/// Orbit-trap cosine palette.
pub fn albedo(sample: &FieldSample, look: &FractalOptions) -> Vec3 {
    if sample.ground {
        return GROUND_ALBEDO;
    }
    let phase = look.frequency * sample.trap + look.shift;
    let wave = Vec3::new(phase.cos(), (phase + 2.1).cos(), (phase + 4.2).cos());
    (look.color * (Vec3::splat(0.5) + 0.5 * wave)).clamp(Vec3::ZERO, Vec3::ONE)
}

fn normal_epsilon(limits: &MarchLimits) -> f32 {
    (limits.min_dist * 2.0).max(1e-5)
}

fn occlusion(iterations: u32, limits: &MarchLimits) -> f32 {
    1.0 - iterations as f32 / limits.max_iterations.max(1) as f32
}

fn preview<F: Field + ?Sized>(ray: &Ray, field: &F, options: &SceneOptions) -> Vec3 {
    let limits = MarchLimits::from(&options.renderer);
    match march(ray, field, &limits, false) {
        MarchResult::Hit {
            point,
            iterations,
            sample,
            ..
        } => {
            let normal = estimate_normal(field, point, normal_epsilon(&limits));
            let diffuse = 0.2 + 0.8 * normal.dot(PREVIEW_LIGHT).max(0.0);
            albedo(&sample, &options.look) * diffuse * occlusion(iterations, &limits)
        }
        MarchResult::Miss { .. } => sky(ray.direction),
    }
}

fn direct<F: Field + ?Sized>(ray: &Ray, field: &F, options: &SceneOptions) -> Vec3 {
    let limits = MarchLimits::from(&options.renderer);
    let background = sky(ray.direction);
    match march(ray, field, &limits, false) {
        MarchResult::Hit {
            point,
            distance,
            iterations,
            sample,
        } => {
            let normal = estimate_normal(field, point, normal_epsilon(&limits));
            let base = albedo(&sample, &options.look);
            let view = -ray.direction;
            let ao = occlusion(iterations, &limits);

            let mut color = base * AMBIENT * ao;
            for (direction, light) in [KEY_LIGHT, FILL_LIGHT] {
                let to_light = direction.normalize();
                let diffuse = normal.dot(to_light).max(0.0);
                let half = (to_light + view).normalize_or_zero();
                let specular = normal.dot(half).max(0.0).powf(SPECULAR_EXPONENT);
                color += (base * diffuse + Vec3::splat(specular * 0.4)) * light * ao;
            }

            let fog = 1.0 - (-distance / options.renderer.fog_dist.max(1e-4)).exp();
            color.lerp(background, fog.clamp(0.0, 1.0))
        }
        MarchResult::Miss { .. } => background,
    }
}

fn path_trace<F, R>(primary: &Ray, field: &F, options: &SceneOptions, rng: &mut R) -> Vec3
where
    F: Field + ?Sized,
    R: Rng + ?Sized,
{
    let limits = MarchLimits::from(&options.renderer);
    let material = options.material.material();
    let bias = (limits.min_dist * 8.0).max(1e-4);
    let mut ray = *primary;
    let mut throughput = Vec3::ONE;
    let mut inside = false;

    for _ in 0..=options.renderer.max_bounce {
        let (point, sample) = match march(&ray, field, &limits, inside) {
            MarchResult::Hit { point, sample, .. } => (point, sample),
            MarchResult::Miss { .. } => return throughput * sky(ray.direction),
        };

        let outward = estimate_normal(field, point, normal_epsilon(&limits));
        let front_face = ray.direction.dot(outward) < 0.0;
        let normal = if front_face { outward } else { -outward };
        let surface = if sample.ground {
            MaterialKind::Lambertian
        } else {
            material
        };

        match scatter(&surface, ray.direction, normal, front_face, rng) {
            Scatter::Reflect(direction) => {
                throughput *= albedo(&sample, &options.look);
                ray = Ray::new(point + normal * bias, direction);
            }
            Scatter::Transmit { direction, refracted } => {
                if refracted {
                    inside = !inside;
                    ray = Ray::new(point - normal * bias, direction);
                } else {
                    ray = Ray::new(point + normal * bias, direction);
                }
            }
            Scatter::Absorbed => return Vec3::ZERO,
        }
    }

    if options.renderer.bounce_black {
        Vec3::ZERO
    } else {
        throughput * sky(ray.direction)
    }
}

enum Scatter {
    /// Tinted by the surface albedo.
    Reflect(Vec3),
    /// Untinted dielectric interaction.
    Transmit { direction: Vec3, refracted: bool },
    Absorbed,
}

fn scatter<R: Rng + ?Sized>(
    material: &MaterialKind,
    incoming: Vec3,
    normal: Vec3,
    front_face: bool,
    rng: &mut R,
) -> Scatter {
    match *material {
        MaterialKind::Lambertian => {
            let direction = normal + random_unit_vector(rng);
            if direction.length_squared() < 1e-8 {
                Scatter::Reflect(normal)
            } else {
                Scatter::Reflect(direction)
            }
        }
        MaterialKind::Metal { roughness } => {
            let direction = reflect(incoming, normal) + roughness * random_in_unit_sphere(rng);
            if direction.dot(normal) > 0.0 {
                Scatter::Reflect(direction)
            } else {
                Scatter::Absorbed
            }
        }
        MaterialKind::Dielectric { refraction_ratio } => {
            let eta = if front_face {
                1.0 / refraction_ratio
            } else {
                refraction_ratio
            };
            let cos_theta = (-incoming).dot(normal).min(1.0);
            let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
            let total_internal = eta * sin_theta > 1.0;
            if total_internal || schlick(cos_theta, eta) > rng.gen::<f32>() {
                Scatter::Transmit {
                    direction: reflect(incoming, normal),
                    refracted: false,
                }
            } else {
                Scatter::Transmit {
                    direction: refract(incoming, normal, eta, cos_theta),
                    refracted: true,
                }
            }
        }
    }
}

pub(crate) fn reflect(incoming: Vec3, normal: Vec3) -> Vec3 {
    incoming - 2.0 * incoming.dot(normal) * normal
}

fn refract(incoming: Vec3, normal: Vec3, eta: f32, cos_theta: f32) -> Vec3 {
    let perpendicular = eta * (incoming + cos_theta * normal);
    let parallel = -(1.0 - perpendicular.length_squared()).abs().sqrt() * normal;
    perpendicular + parallel
}

fn schlick(cosine: f32, eta: f32) -> f32 {
    let r0 = ((1.0 - eta) / (1.0 + eta)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

pub(crate) fn random_in_unit_sphere<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let candidate = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if candidate.length_squared() < 1.0 {
            return candidate;
        }
    }
}

fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    random_in_unit_sphere(rng).try_normalize().unwrap_or(Vec3::Y)
}

pub(crate) fn random_in_unit_disk<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
    loop {
        let candidate = Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        if candidate.length_squared() < 1.0 {
            return candidate;
        }
    }
}
