use std::borrow::Cow;

use engine::CompileError;
use wgpu::naga::ShaderStage;

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn compile_vertex_shader(
    device: &wgpu::Device,
) -> Result<wgpu::ShaderModule, CompileError> {
    compile_glsl(device, "fullscreen triangle vertex", VERTEX_SHADER_GLSL, ShaderStage::Vertex)
}

/// Compiles the fragment stage that scales the evaluated frame onto the
/// surface and draws the capture progress bar.
pub(crate) fn compile_present_shader(
    device: &wgpu::Device,
) -> Result<wgpu::ShaderModule, CompileError> {
    compile_glsl(device, "frame present fragment", PRESENT_SHADER_GLSL, ShaderStage::Fragment)
}

/// Builds a GLSL module inside a validation error scope so a failed build
/// surfaces as an error instead of an uncaptured-error panic later on.
pub(crate) fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, CompileError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_owned()),
            stage,
            defines: &[],
        },
    });
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(module),
        Some(err) => Err(CompileError {
            label: label.to_owned(),
            stage: stage_name(stage),
            message: err.to_string(),
        }),
    }
}

fn stage_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        ShaderStage::Compute => "compute",
        _ => "unknown",
    }
}

/// Minimal full-screen triangle vertex shader.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// The layout of `PresentParams` must match `PresentUniforms` in the gpu pipeline module.
const PRESENT_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform PresentParams {
    vec4 surface;
    vec4 capture;
} params;

layout(set = 0, binding = 1) uniform texture2D frame_texture;
layout(set = 0, binding = 2) uniform sampler frame_sampler;

const float BAR_HEIGHT = 4.0;

void main() {
    vec3 color = texture(sampler2D(frame_texture, frame_sampler), v_uv).rgb;

    // capture = (active, progress, rendering, unused)
    if (params.capture.x > 0.5 && v_uv.y * params.surface.y < BAR_HEIGHT) {
        vec3 bar = params.capture.z > 0.5 ? vec3(0.9, 0.2, 0.2) : vec3(0.2, 0.6, 0.9);
        color = v_uv.x <= params.capture.y ? bar : color * 0.4;
    }

    outColor = vec4(color, 1.0);
}
";
