use std::collections::HashMap;
use std::num::NonZeroU64;

use crate::scene::Vertex;
use crate::shader::{LinkedProgram, ProgramInterface, UniformKind};

/// Color + depth formats a pipeline was built for.
pub(super) type TargetFormats = (wgpu::TextureFormat, wgpu::TextureFormat);

/// Linked program on the device: modules, layouts and one pipeline per
/// target format pair, built lazily.
pub(super) struct GpuProgram {
    label: String,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    attributes: Vec<wgpu::VertexAttribute>,
    interface: ProgramInterface,
    depth_test: bool,
    alpha_blend: bool,
    pipelines: HashMap<TargetFormats, wgpu::RenderPipeline>,
}

impl GpuProgram {
    pub fn new(device: &wgpu::Device, linked: &LinkedProgram) -> Self {
        let label = linked.label.as_str();

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} vs")),
            source: wgpu::ShaderSource::Wgsl(linked.vertex_source.as_str().into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} fs")),
            source: wgpu::ShaderSource::Wgsl(linked.fragment_source.as_str().into()),
        });

        let entries: Vec<wgpu::BindGroupLayoutEntry> = linked
            .interface
            .uniforms()
            .iter()
            .map(|slot| {
                let mut visibility = wgpu::ShaderStages::NONE;
                if slot.vertex {
                    visibility |= wgpu::ShaderStages::VERTEX;
                }
                if slot.fragment {
                    visibility |= wgpu::ShaderStages::FRAGMENT;
                }
                wgpu::BindGroupLayoutEntry {
                    binding: slot.binding,
                    visibility,
                    ty: binding_type(slot.kind),
                    count: None,
                }
            })
            .collect();

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} bgl")),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} pipeline layout")),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let attributes = linked
            .interface
            .attributes()
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: match a.semantic.components() {
                    2 => wgpu::VertexFormat::Float32x2,
                    _ => wgpu::VertexFormat::Float32x3,
                },
                offset: a.semantic.offset(),
                shader_location: a.location,
            })
            .collect();

        Self {
            label: linked.label.clone(),
            vertex,
            fragment,
            bind_group_layout,
            pipeline_layout,
            attributes,
            interface: linked.interface.clone(),
            depth_test: linked.depth_test,
            alpha_blend: linked.alpha_blend,
            pipelines: HashMap::new(),
        }
    }

    #[inline]
    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    #[inline]
    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    #[inline]
    pub fn pipeline(&self, formats: TargetFormats) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&formats)
    }

    /// Builds the pipeline for `formats` unless it already exists.
    pub fn ensure_pipeline(&mut self, device: &wgpu::Device, formats: TargetFormats) {
        if self.pipelines.contains_key(&formats) {
            return;
        }
        let (color_format, depth_format) = formats;
        log::debug!("building '{}' pipeline for {color_format:?}/{depth_format:?}", self.label);

        let buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attributes,
        }];

        let blend = if self.alpha_blend {
            wgpu::BlendState::ALPHA_BLENDING
        } else {
            wgpu::BlendState::REPLACE
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} pipeline", self.label)),
            layout: Some(&self.pipeline_layout),

            vertex: wgpu::VertexState {
                module: &self.vertex,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &self.fragment,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Augmentation quads are seen from both sides.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: self.depth_test,
                depth_compare: if self.depth_test {
                    wgpu::CompareFunction::LessEqual
                } else {
                    wgpu::CompareFunction::Always
                },
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.pipelines.insert(formats, pipeline);
    }
}

fn binding_type(kind: UniformKind) -> wgpu::BindingType {
    match kind {
        UniformKind::Mat4 | UniformKind::Vec4 => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(kind.byte_size()),
        },
        UniformKind::Texture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        UniformKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
    }
}
