//! Frame encoding.

use crate::error::{RenderError, RenderResult};
use crate::scene::GpuScene;

use super::RenderEngine;

impl RenderEngine {
    fn clear_color(&self) -> wgpu::Color {
        wgpu::Color {
            r: f64::from(self.background_color.x),
            g: f64::from(self.background_color.y),
            b: f64::from(self.background_color.z),
            a: 1.0,
        }
    }

    /// Records the scene pass into `encoder`: points, then ellipsoids, then
    /// the legend overlay.
    #[allow(clippy::cast_precision_loss)]
    pub fn encode_scene(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        scene: Option<&GpuScene>,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color()),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            ..Default::default()
        });

        if let Some(scene) = scene {
            if scene.points.num_points > 0 {
                pass.set_pipeline(&self.point_pipeline);
                pass.set_bind_group(0, &scene.points.bind_group, &[]);
                pass.set_bind_group(1, &self.clip_bind_group, &[]);
                pass.draw(0..scene.points.vertex_count(), 0..1);
            }

            if let Some(ellipsoids) = scene.ellipsoids.as_ref().filter(|_| scene.ellipsoids_visible) {
                pass.set_pipeline(&self.ellipsoid_pipeline);
                pass.set_bind_group(0, &self.camera_bind_group, &[]);
                pass.set_bind_group(1, &self.clip_bind_group, &[]);
                pass.set_vertex_buffer(0, self.sphere_mesh.vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, ellipsoids.instance_buffer.slice(..));
                pass.set_index_buffer(
                    self.sphere_mesh.index_buffer.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                pass.draw_indexed(
                    0..self.sphere_mesh.index_count,
                    0,
                    0..ellipsoids.instance_count,
                );
            }
        }

        if let (Some(legend), Some((x, y, w, h))) = (&self.legend, self.legend_viewport()) {
            pass.set_viewport(x as f32, y as f32, w as f32, h as f32, 0.0, 1.0);
            pass.set_pipeline(&self.legend_pipeline);
            pass.set_bind_group(0, &legend.bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
    }

    /// Renders one frame to the window surface and presents it.
    ///
    /// A lost or outdated surface is reconfigured and reported as
    /// [`RenderError::SurfaceLost`]; the caller skips the frame.
    pub fn render_frame(&mut self, scene: Option<&GpuScene>) -> RenderResult<()> {
        let Some(surface) = &self.surface else {
            return Err(RenderError::SurfaceLost);
        };

        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(&self.device, &self.surface_config);
                return Err(RenderError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(wgpu::SurfaceError::Timeout) => return Err(RenderError::Timeout),
            Err(wgpu::SurfaceError::Other) => {
                log::warn!("Surface error: other");
                return Err(RenderError::SurfaceLost);
            }
        };

        self.update_camera_uniforms();

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        self.encode_scene(&mut encoder, &view, scene);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
