//! The main rendering engine.

mod capture;
mod pipelines;
mod rendering;

use std::num::NonZeroU64;
use std::sync::Arc;

use cloudlens_core::{ClipPlaneUniforms, ClippingRegionManager, Options};
use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::camera::OrbitCamera;
use crate::ellipsoid_render::SphereMesh;
use crate::error::{RenderError, RenderResult};
use crate::legend::LegendImage;
use crate::point_cloud_render::{create_point_uniform_buffer, update_point_uniforms, PointUniforms};

/// Depth buffer format shared by every pipeline.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Gap between the legend and the bottom-left corner, in pixels.
const LEGEND_MARGIN: u32 = 10;

/// Camera uniforms for GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct CameraUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub inv_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub _padding: f32,
}

impl CameraUniforms {
    pub fn from_camera(camera: &OrbitCamera) -> Self {
        let view = camera.view_matrix();
        let proj = camera.projection_matrix();
        Self {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            view_proj: (proj * view).to_cols_array_2d(),
            inv_proj: proj.inverse().to_cols_array_2d(),
            camera_pos: camera.position().to_array(),
            _padding: 0.0,
        }
    }
}

impl Default for CameraUniforms {
    fn default() -> Self {
        Self {
            view: glam::Mat4::IDENTITY.to_cols_array_2d(),
            proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            inv_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            camera_pos: [0.0, 0.0, 500.0],
            _padding: 0.0,
        }
    }
}

/// The legend texture currently shown in the overlay.
pub(crate) struct LegendOverlay {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// The main rendering engine backed by wgpu.
pub struct RenderEngine {
    /// The wgpu instance.
    pub instance: wgpu::Instance,
    /// The wgpu adapter.
    pub adapter: wgpu::Adapter,
    /// The wgpu device.
    pub device: wgpu::Device,
    /// The wgpu queue.
    pub queue: wgpu::Queue,
    /// The render surface, absent in headless mode.
    pub surface: Option<wgpu::Surface<'static>>,
    /// Surface configuration. Headless engines keep one to record the target format.
    pub surface_config: wgpu::SurfaceConfiguration,
    pub depth_texture: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
    /// The orbit camera.
    pub camera: OrbitCamera,
    /// Current viewport width.
    pub width: u32,
    /// Current viewport height.
    pub height: u32,
    /// Clear color, linear RGB.
    pub background_color: Vec3,

    camera_buffer: wgpu::Buffer,
    point_uniform_buffer: wgpu::Buffer,
    clip_buffer: wgpu::Buffer,
    clip_bind_group: wgpu::BindGroup,
    camera_bind_group: wgpu::BindGroup,

    point_bind_group_layout: wgpu::BindGroupLayout,
    point_pipeline: wgpu::RenderPipeline,
    ellipsoid_pipeline: wgpu::RenderPipeline,
    sphere_mesh: SphereMesh,

    legend_bind_group_layout: wgpu::BindGroupLayout,
    legend_pipeline: wgpu::RenderPipeline,
    legend_sampler: wgpu::Sampler,
    legend: Option<LegendOverlay>,
}

impl RenderEngine {
    /// Creates a new windowed render engine.
    pub async fn new_windowed(
        window: Arc<winit::window::Window>,
        options: &Options,
    ) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = Self::request_device(&adapter, "cloudlens device").await?;

        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderError::AdapterCreationFailed)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        Ok(Self::from_parts(
            instance,
            adapter,
            device,
            queue,
            Some(surface),
            surface_config,
            options,
        ))
    }

    /// Creates a new headless render engine rendering into offscreen textures.
    pub async fn new_headless(width: u32, height: u32, options: &Options) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = Self::request_device(&adapter, "cloudlens device (headless)").await?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        Ok(Self::from_parts(
            instance,
            adapter,
            device,
            queue,
            None,
            surface_config,
            options,
        ))
    }

    async fn request_device(
        adapter: &wgpu::Adapter,
        label: &str,
    ) -> RenderResult<(wgpu::Device, wgpu::Queue)> {
        let pair = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: wgpu::Features::empty(),
                // Large clouds need the adapter's full storage binding size.
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;
        Ok(pair)
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_parts(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: Option<wgpu::Surface<'static>>,
        surface_config: wgpu::SurfaceConfiguration,
        options: &Options,
    ) -> Self {
        let width = surface_config.width;
        let height = surface_config.height;
        let format = surface_config.format;

        let (depth_texture, depth_view) = Self::create_depth_texture(&device, width, height);

        let camera = OrbitCamera::new(&options.camera, width as f32 / height as f32);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera uniforms"),
            contents: bytemuck::bytes_of(&CameraUniforms::from_camera(&camera)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let point_uniform_buffer = create_point_uniform_buffer(
            &device,
            &PointUniforms::new(options.point_size, options.points_visible),
        );

        let clip_uniforms = ClippingRegionManager::with_offsets(options.clip_offsets).uniforms();
        let clip_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("clip plane buffer"),
            contents: bytemuck::bytes_of(&clip_uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let clip_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("clip plane bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(64),
                },
                count: None,
            }],
        });
        let clip_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("clip plane bind group"),
            layout: &clip_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: clip_buffer.as_entire_binding(),
            }],
        });

        let camera_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(272),
                },
                count: None,
            }],
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera bind group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let (point_pipeline, point_bind_group_layout) =
            pipelines::create_point_pipeline(&device, format, &clip_bind_group_layout);
        let ellipsoid_pipeline = pipelines::create_ellipsoid_pipeline(
            &device,
            format,
            &camera_bind_group_layout,
            &clip_bind_group_layout,
        );
        let (legend_pipeline, legend_bind_group_layout) =
            pipelines::create_legend_pipeline(&device, format);

        let legend_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("legend sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let sphere_mesh = SphereMesh::new(&device, options.sphere_segments);

        Self {
            instance,
            adapter,
            device,
            queue,
            surface,
            surface_config,
            depth_texture,
            depth_view,
            camera,
            width,
            height,
            background_color: options.background_color,
            camera_buffer,
            point_uniform_buffer,
            clip_buffer,
            clip_bind_group,
            camera_bind_group,
            point_bind_group_layout,
            point_pipeline,
            ellipsoid_pipeline,
            sphere_mesh,
            legend_bind_group_layout,
            legend_pipeline,
            legend_sampler,
            legend: None,
        }
    }

    /// Resizes the render targets.
    #[allow(clippy::cast_precision_loss)]
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.width = width;
        self.height = height;
        self.surface_config.width = width;
        self.surface_config.height = height;

        if let Some(ref surface) = self.surface {
            surface.configure(&self.device, &self.surface_config);
        }

        let (depth_texture, depth_view) = Self::create_depth_texture(&self.device, width, height);
        self.depth_texture = depth_texture;
        self.depth_view = depth_view;

        self.camera.set_aspect_ratio(width as f32 / height as f32);
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Uploads the camera matrices.
    pub fn update_camera_uniforms(&self) {
        let uniforms = CameraUniforms::from_camera(&self.camera);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Uploads the three clipping planes.
    pub fn update_clip_uniforms(&self, uniforms: &ClipPlaneUniforms) {
        self.queue
            .write_buffer(&self.clip_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Uploads point size and visibility.
    pub fn update_point_uniforms(&self, uniforms: &PointUniforms) {
        update_point_uniforms(&self.queue, &self.point_uniform_buffer, uniforms);
    }

    /// Replaces the legend overlay texture.
    pub fn set_legend(&mut self, legend: &LegendImage) {
        let size = wgpu::Extent3d {
            width: legend.width(),
            height: legend.height(),
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("legend texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            legend.image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * legend.width()),
                rows_per_image: Some(legend.height()),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("legend bind group"),
            layout: &self.legend_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.legend_sampler),
                },
            ],
        });

        if let Some(old) = self.legend.take() {
            old.texture.destroy();
        }
        self.legend = Some(LegendOverlay {
            texture,
            bind_group,
            width: legend.width(),
            height: legend.height(),
        });
    }

    /// Removes the legend overlay.
    pub fn clear_legend(&mut self) {
        if let Some(old) = self.legend.take() {
            old.texture.destroy();
        }
    }

    pub fn has_legend(&self) -> bool {
        self.legend.is_some()
    }

    /// Layout for per-scene point bind groups.
    pub fn point_bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.point_bind_group_layout
    }

    pub fn camera_buffer(&self) -> &wgpu::Buffer {
        &self.camera_buffer
    }

    pub fn point_uniform_buffer(&self) -> &wgpu::Buffer {
        &self.point_uniform_buffer
    }

    /// Bottom-left legend rectangle `(x, y, w, h)`, or `None` if it does not fit.
    pub fn legend_viewport(&self) -> Option<(u32, u32, u32, u32)> {
        let legend = self.legend.as_ref()?;
        legend_rect(self.width, self.height, legend.width, legend.height)
    }
}

/// Places a `w` x `h` legend in the bottom-left corner of a target.
pub(crate) fn legend_rect(
    target_width: u32,
    target_height: u32,
    w: u32,
    h: u32,
) -> Option<(u32, u32, u32, u32)> {
    if w + 2 * LEGEND_MARGIN > target_width || h + 2 * LEGEND_MARGIN > target_height {
        return None;
    }
    Some((LEGEND_MARGIN, target_height - h - LEGEND_MARGIN, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_uniforms_layout() {
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 272);
    }

    #[test]
    fn test_camera_uniforms_from_camera() {
        let camera = OrbitCamera::default();
        let uniforms = CameraUniforms::from_camera(&camera);
        assert!((uniforms.camera_pos[2] - 500.0).abs() < 1e-3);
        let view_proj = glam::Mat4::from_cols_array_2d(&uniforms.view_proj);
        let origin = view_proj.project_point3(Vec3::ZERO);
        assert!(origin.x.abs() < 1e-5 && origin.y.abs() < 1e-5);
    }

    #[test]
    fn test_legend_rect() {
        assert_eq!(legend_rect(800, 600, 300, 31), Some((10, 559, 300, 31)));
        assert_eq!(legend_rect(200, 600, 300, 31), None);
        assert_eq!(legend_rect(800, 40, 300, 31), None);
    }
}
