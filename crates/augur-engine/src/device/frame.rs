use std::collections::BTreeMap;
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use crate::context::{Location, RawHandle, UniformValue};
use crate::math::Viewport;
use crate::shader::UniformKind;

use super::objects::{GpuMesh, GpuObject, ObjectTable};
use super::pipeline::TargetFormats;

/// Binds currently in effect while recording.
#[derive(Debug, Default)]
pub(super) struct BoundState {
    pub framebuffer: Option<RawHandle>,
    pub program: Option<RawHandle>,
    pub mesh: Option<RawHandle>,
    pub texture_slot: Option<Location>,
    pub textures: BTreeMap<Location, RawHandle>,
    pub uniforms: BTreeMap<Location, UniformValue>,
    pub viewport: Option<Viewport>,
}

pub(super) struct RecordedDraw {
    framebuffer: RawHandle,
    program: RawHandle,
    mesh: RawHandle,
    textures: BTreeMap<Location, RawHandle>,
    uniforms: BTreeMap<Location, UniformValue>,
    viewport: Option<Viewport>,
}

pub(super) enum FrameOp {
    Clear { framebuffer: RawHandle, color: [f32; 4], depth: f32 },
    Draw(RecordedDraw),
}

/// An acquired surface image plus everything recorded for it.
///
/// Holding the surface texture prevents acquisition of the next frame, so a
/// recording must be presented or dropped before `begin_frame` is called again.
pub(super) struct FrameRecording {
    pub surface_texture: wgpu::SurfaceTexture,
    pub surface_view: wgpu::TextureView,
    ops: Vec<FrameOp>,
    error: Option<String>,
}

impl FrameRecording {
    pub fn new(surface_texture: wgpu::SurfaceTexture) -> Self {
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            surface_texture,
            surface_view,
            ops: Vec::new(),
            error: None,
        }
    }

    /// Remembers the first error; `present` reports it instead of submitting.
    pub fn fail(&mut self, reason: String) {
        if self.error.is_none() {
            self.error = Some(reason);
        }
    }

    pub fn clear(&mut self, bound: &BoundState, color: [f32; 4], depth: f32) {
        match bound.framebuffer {
            Some(framebuffer) => self.ops.push(FrameOp::Clear { framebuffer, color, depth }),
            None => self.fail("clear with no framebuffer bound".into()),
        }
    }

    pub fn draw(&mut self, bound: &BoundState) {
        let (Some(framebuffer), Some(program), Some(mesh)) = (bound.framebuffer, bound.program, bound.mesh) else {
            self.fail("draw needs a framebuffer, a program and a mesh bound".into());
            return;
        };
        self.ops.push(FrameOp::Draw(RecordedDraw {
            framebuffer,
            program,
            mesh,
            textures: bound.textures.clone(),
            uniforms: bound.uniforms.clone(),
            viewport: bound.viewport,
        }));
    }
}

/// Consecutive ops targeting one framebuffer.
struct PassPlan {
    framebuffer: RawHandle,
    clear: Option<([f32; 4], f32)>,
    draws: Vec<usize>,
}

fn plan_passes(ops: &[FrameOp]) -> (Vec<PassPlan>, Vec<&RecordedDraw>) {
    let mut passes: Vec<PassPlan> = Vec::new();
    let mut draws = Vec::new();
    for op in ops {
        match op {
            FrameOp::Clear { framebuffer, color, depth } => passes.push(PassPlan {
                framebuffer: *framebuffer,
                clear: Some((*color, *depth)),
                draws: Vec::new(),
            }),
            FrameOp::Draw(draw) => {
                let index = draws.len();
                draws.push(draw);
                match passes.last_mut() {
                    Some(pass) if pass.framebuffer == draw.framebuffer => pass.draws.push(index),
                    _ => passes.push(PassPlan {
                        framebuffer: draw.framebuffer,
                        clear: None,
                        draws: vec![index],
                    }),
                }
            }
        }
    }
    (passes, draws)
}

/// Resolved attachments of a framebuffer.
struct Attachments<'a> {
    color: &'a wgpu::TextureView,
    depth: &'a wgpu::TextureView,
    formats: TargetFormats,
    size: (u32, u32),
}

fn attachments<'a>(
    objects: &'a ObjectTable,
    surface_view: &'a wgpu::TextureView,
    surface_format: wgpu::TextureFormat,
    framebuffer: RawHandle,
) -> Result<Attachments<'a>, String> {
    let (color, depth) = objects
        .attachments(framebuffer)
        .ok_or_else(|| format!("{} is not a live framebuffer", framebuffer.get()))?;

    let (color_view, color_format, size) = match objects.get(color) {
        Some(GpuObject::ColorTarget { size }) => (surface_view, surface_format, *size),
        Some(GpuObject::Texture(t)) if !t.is_depth() => (&t.view, t.format, t.size),
        _ => return Err(format!("color attachment {} is gone", color.get())),
    };
    let (depth_view, depth_format) = match objects.get(depth) {
        Some(GpuObject::DepthTarget(t)) => (&t.view, t.format),
        Some(GpuObject::Texture(t)) if t.is_depth() => (&t.view, t.format),
        _ => return Err(format!("depth attachment {} is gone", depth.get())),
    };

    Ok(Attachments {
        color: color_view,
        depth: depth_view,
        formats: (color_format, depth_format),
        size: (size.width, size.height),
    })
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Per-draw slice of the uniform arena.
struct UniformRange {
    binding: u32,
    offset: u64,
    size: u64,
}

/// Everything a draw needs inside a render pass.
struct ResolvedDraw<'a> {
    pipeline: &'a wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    mesh: &'a GpuMesh,
    viewport: Option<Viewport>,
}

/// Encodes a finished recording, submits it and presents the surface image.
pub(super) fn submit(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    objects: &mut ObjectTable,
    sampler: &wgpu::Sampler,
    surface_format: wgpu::TextureFormat,
    recording: FrameRecording,
) -> Result<(), String> {
    if let Some(reason) = recording.error {
        return Err(reason);
    }
    let (passes, draws) = plan_passes(&recording.ops);

    // Pipelines are built lazily and need mutable access to the program.
    for draw in &draws {
        let formats = attachments(objects, &recording.surface_view, surface_format, draw.framebuffer)?.formats;
        objects
            .program_mut(draw.program)
            .ok_or_else(|| format!("program {} is gone", draw.program.get()))?
            .ensure_pipeline(device, formats);
    }
    let objects = &*objects;

    // Uniform arena: one aligned slice per uniform slot per draw.
    let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment).max(16);
    let mut arena: Vec<u8> = Vec::new();
    let mut ranges: Vec<Vec<UniformRange>> = Vec::with_capacity(draws.len());
    for draw in &draws {
        let program = objects
            .program(draw.program)
            .ok_or_else(|| format!("program {} is gone", draw.program.get()))?;
        let mut slots = Vec::new();
        for slot in program.interface().uniforms() {
            let size = slot.kind.byte_size();
            if size == 0 {
                continue;
            }
            let offset = align_to(arena.len() as u64, alignment);
            arena.resize(offset as usize, 0);
            match draw.uniforms.get(&Location(slot.binding)) {
                Some(value) if value.as_bytes().len() as u64 == size => arena.extend_from_slice(value.as_bytes()),
                Some(_) => return Err(format!("uniform '{}' written with the wrong type", slot.name)),
                None => arena.resize((offset + size) as usize, 0),
            }
            slots.push(UniformRange { binding: slot.binding, offset, size });
        }
        ranges.push(slots);
    }
    let uniforms = (!arena.is_empty()).then(|| {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame uniforms"),
            contents: &arena,
            usage: wgpu::BufferUsages::UNIFORM,
        })
    });

    let mut resolved = Vec::with_capacity(draws.len());
    for (draw, slots) in draws.iter().zip(&ranges) {
        resolved.push(resolve_draw(
            device,
            objects,
            sampler,
            uniforms.as_ref(),
            &recording.surface_view,
            surface_format,
            draw,
            slots,
        )?);
    }

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("augur frame encoder"),
    });

    for pass in &passes {
        let target = attachments(objects, &recording.surface_view, surface_format, pass.framebuffer)?;
        let (color_load, depth_load) = match pass.clear {
            Some(([r, g, b, a], depth)) => (
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                }),
                wgpu::LoadOp::Clear(depth),
            ),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("augur pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target.depth,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for &index in &pass.draws {
            let draw = &resolved[index];
            let Some((x, y, w, h)) = clamp_viewport(draw.viewport, target.size) else { continue };
            rpass.set_viewport(x, y, w, h, 0.0, 1.0);
            rpass.set_pipeline(draw.pipeline);
            rpass.set_bind_group(0, &draw.bind_group, &[]);
            rpass.set_vertex_buffer(0, draw.mesh.vertices.slice(..));
            rpass.set_index_buffer(draw.mesh.indices.slice(..), wgpu::IndexFormat::Uint16);
            rpass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
        }
    }

    queue.submit(std::iter::once(encoder.finish()));
    drop(recording.surface_view);
    recording.surface_texture.present();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn resolve_draw<'a>(
    device: &wgpu::Device,
    objects: &'a ObjectTable,
    sampler: &wgpu::Sampler,
    uniforms: Option<&wgpu::Buffer>,
    surface_view: &wgpu::TextureView,
    surface_format: wgpu::TextureFormat,
    draw: &RecordedDraw,
    slots: &[UniformRange],
) -> Result<ResolvedDraw<'a>, String> {
    let program = objects
        .program(draw.program)
        .ok_or_else(|| format!("program {} is gone", draw.program.get()))?;
    let mesh = objects
        .mesh(draw.mesh)
        .ok_or_else(|| format!("mesh {} is gone", draw.mesh.get()))?;
    let formats = attachments(objects, surface_view, surface_format, draw.framebuffer)?.formats;
    let pipeline = program
        .pipeline(formats)
        .ok_or_else(|| "pipeline missing for target formats".to_string())?;

    let mut entries = Vec::with_capacity(program.interface().uniforms().len());
    for slot in program.interface().uniforms() {
        let resource = match slot.kind {
            UniformKind::Mat4 | UniformKind::Vec4 => {
                let range = slots
                    .iter()
                    .find(|r| r.binding == slot.binding)
                    .ok_or_else(|| format!("no uniform storage for '{}'", slot.name))?;
                let buffer = uniforms.ok_or("uniform arena missing")?;
                wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: range.offset,
                    size: NonZeroU64::new(range.size),
                })
            }
            UniformKind::Texture => {
                let raw = draw
                    .textures
                    .get(&Location(slot.binding))
                    .ok_or_else(|| format!("no texture bound for '{}'", slot.name))?;
                let texture = objects
                    .texture(*raw)
                    .filter(|t| !t.is_depth())
                    .ok_or_else(|| format!("'{}' is bound to a missing or depth texture", slot.name))?;
                wgpu::BindingResource::TextureView(&texture.view)
            }
            UniformKind::Sampler => wgpu::BindingResource::Sampler(sampler),
        };
        entries.push(wgpu::BindGroupEntry {
            binding: slot.binding,
            resource,
        });
    }

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("augur draw bind group"),
        layout: program.bind_group_layout(),
        entries: &entries,
    });

    Ok(ResolvedDraw {
        pipeline,
        bind_group,
        mesh,
        viewport: draw.viewport,
    })
}

/// Clips a viewport to the target. `None` when nothing remains.
fn clamp_viewport(viewport: Option<Viewport>, (width, height): (u32, u32)) -> Option<(f32, f32, f32, f32)> {
    let (tw, th) = (width as f32, height as f32);
    let vp = viewport.unwrap_or(Viewport { x: 0.0, y: 0.0, width: tw, height: th });
    let x = vp.x.clamp(0.0, tw);
    let y = vp.y.clamp(0.0, th);
    let w = vp.width.min(tw - x);
    let h = vp.height.min(th - y);
    (w > 0.0 && h > 0.0).then_some((x, y, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up_to_multiple() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
    }

    #[test]
    fn viewport_is_clipped_to_target() {
        let vp = Viewport { x: 512.0, y: 0.0, width: 1024.0, height: 768.0 };
        assert_eq!(clamp_viewport(Some(vp), (1024, 768)), Some((512.0, 0.0, 512.0, 768.0)));
        assert_eq!(clamp_viewport(None, (64, 32)), Some((0.0, 0.0, 64.0, 32.0)));

        let outside = Viewport { x: 2000.0, y: 0.0, width: 10.0, height: 10.0 };
        assert_eq!(clamp_viewport(Some(outside), (1024, 768)), None);
    }
}
