//! Live render state and its upload to the GPU.

use cloudlens_core::{
    ClipAxis, ClippingRegionManager, CloudlensError, Dataset, EllipsoidInstance, EllipsoidTransform,
    Options, PointCloud, Rgb, Vec3,
};
use cloudlens_render::{
    clamp_point_size, GpuScene, LegendImage, LegendRenderer, OrbitCamera, PointUniforms,
    RenderEngine, RenderResult,
};
use log::info;

/// CPU copy of the buffers drawn for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneBuffers {
    pub positions: Vec<Vec3>,
    pub colors: Vec<Rgb>,
    pub ellipsoids: Vec<EllipsoidInstance>,
    /// Incremented on every load.
    pub generation: u64,
}

impl SceneBuffers {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Axis-aligned bounds of the points, if there are any.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p))),
        )
    }
}

/// State read by every frame. Clipping, point size and visibility survive
/// dataset changes; the scene and legend are replaced on each load.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub scene: Option<SceneBuffers>,
    pub clipping: ClippingRegionManager,
    pub point_size: f32,
    pub points_visible: bool,
    pub ellipsoids_visible: bool,
    pub ellipsoid_opacity: f32,
    pub legend: Option<LegendImage>,
}

impl RenderContext {
    pub fn new(options: &Options) -> Self {
        Self {
            scene: None,
            clipping: ClippingRegionManager::with_offsets(options.clip_offsets),
            point_size: clamp_point_size(options.point_size),
            points_visible: options.points_visible,
            ellipsoids_visible: options.show_ellipsoids,
            ellipsoid_opacity: options.ellipsoid_opacity.clamp(0.0, 1.0),
            legend: None,
        }
    }

    pub fn point_uniforms(&self) -> PointUniforms {
        PointUniforms::new(self.point_size, self.points_visible)
    }

    /// Number of points that pass the clipping planes.
    pub fn visible_point_count(&self) -> usize {
        if !self.points_visible {
            return 0;
        }
        self.scene
            .as_ref()
            .map_or(0, |s| self.clipping.count_visible(&s.positions))
    }
}

/// Owns the [`RenderContext`] and keeps the GPU copy of it current.
pub struct PointCloudRenderer {
    context: RenderContext,
    legend_renderer: LegendRenderer,
    show_legend: bool,
    generation: u64,
    gpu: Option<GpuScene>,
    uniforms_dirty: bool,
    legend_dirty: bool,
}

impl PointCloudRenderer {
    pub fn new(options: &Options) -> Self {
        Self {
            context: RenderContext::new(options),
            legend_renderer: LegendRenderer::new(options.legend),
            show_legend: options.show_legend,
            generation: 0,
            gpu: None,
            uniforms_dirty: true,
            legend_dirty: false,
        }
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Generation of the most recently loaded scene, 0 before the first load.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the active scene. `colors` must pair with the cloud's positions.
    ///
    /// The GPU copy is rebuilt on the next [`prepare`](Self::prepare).
    pub fn load(
        &mut self,
        cloud: &PointCloud,
        colors: Vec<Rgb>,
        ellipsoids: &[EllipsoidTransform],
    ) -> Result<u64, CloudlensError> {
        if colors.len() != cloud.len() {
            return Err(CloudlensError::SizeMismatch {
                expected: cloud.len(),
                actual: colors.len(),
            });
        }

        self.generation += 1;
        let opacity = self.context.ellipsoid_opacity;
        self.context.scene = Some(SceneBuffers {
            positions: cloud.positions().to_vec(),
            colors,
            ellipsoids: ellipsoids.iter().map(|e| e.to_instance(opacity)).collect(),
            generation: self.generation,
        });
        Ok(self.generation)
    }

    /// Loads a dataset's points, colors, ellipsoids and legend.
    pub fn load_dataset(&mut self, dataset: &Dataset) -> Result<u64, CloudlensError> {
        let ellipsoids = dataset.ellipsoids();
        let generation = self.load(&dataset.cloud, dataset.colors(), &ellipsoids)?;

        let legend = self
            .legend_renderer
            .render(dataset.range, &dataset.gradient)
            .with_explanation(dataset.explanation.clone());
        self.context.legend = Some(legend);
        self.legend_dirty = true;

        info!(
            "loaded dataset {generation}: {} points, {} of {} ellipsoids",
            dataset.cloud.len(),
            ellipsoids.len(),
            dataset.gaussians.len()
        );
        Ok(generation)
    }

    pub fn set_point_size(&mut self, size: f32) {
        self.context.point_size = clamp_point_size(size);
        self.uniforms_dirty = true;
    }

    pub fn set_clip_offset(&mut self, axis: ClipAxis, value: f32) {
        self.context.clipping.set_offset(axis, value);
        self.uniforms_dirty = true;
    }

    pub fn set_points_visible(&mut self, visible: bool) {
        self.context.points_visible = visible;
        self.uniforms_dirty = true;
    }

    pub fn set_ellipsoids_visible(&mut self, visible: bool) {
        self.context.ellipsoids_visible = visible;
        if let Some(gpu) = &mut self.gpu {
            gpu.ellipsoids_visible = visible;
        }
    }

    /// Points the camera at the current scene.
    pub fn fit_camera(&self, camera: &mut OrbitCamera) -> bool {
        match self.context.scene.as_ref().and_then(SceneBuffers::bounds) {
            Some((lo, hi)) => {
                camera.look_at_box(lo, hi);
                true
            }
            None => false,
        }
    }

    /// Brings the GPU copy up to date: rebuilds the scene after a load,
    /// uploads changed uniforms and the new legend.
    pub fn prepare(&mut self, engine: &mut RenderEngine) -> RenderResult<()> {
        let stale = match (&self.gpu, &self.context.scene) {
            (Some(gpu), Some(scene)) => gpu.generation() != scene.generation,
            (None, Some(_)) => true,
            _ => false,
        };
        if stale {
            // Release the previous buffers before allocating the new ones.
            if let Some(old) = self.gpu.take() {
                old.destroy();
            }
            if let Some(scene) = &self.context.scene {
                let mut gpu = GpuScene::new(
                    engine,
                    &scene.positions,
                    &scene.colors,
                    &scene.ellipsoids,
                    scene.generation,
                )?;
                gpu.ellipsoids_visible = self.context.ellipsoids_visible;
                self.gpu = Some(gpu);
            }
        }

        if self.uniforms_dirty {
            engine.update_point_uniforms(&self.context.point_uniforms());
            engine.update_clip_uniforms(&self.context.clipping.uniforms());
            self.uniforms_dirty = false;
        }

        if self.legend_dirty {
            match (&self.context.legend, self.show_legend) {
                (Some(legend), true) => engine.set_legend(legend),
                _ => engine.clear_legend(),
            }
            self.legend_dirty = false;
        }

        Ok(())
    }

    /// The uploaded scene, if any.
    pub fn gpu_scene(&self) -> Option<&GpuScene> {
        self.gpu.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudlens_core::{
        ColorGradient, ColorMapName, Covariance, GaussianComponent, PointAttributes,
        PointCloudResponse, ValueRange,
    };

    fn cloud(n: usize) -> PointCloud {
        let positions = (0..n).map(|i| Vec3::new(i as f32, 0.0, 50.0)).collect();
        PointCloud::new(positions, PointAttributes::Scalars(vec![0.0; n])).unwrap()
    }

    #[test]
    fn test_load_validates_lengths() {
        let mut renderer = PointCloudRenderer::new(&Options::default());
        let err = renderer.load(&cloud(3), vec![Rgb::BLACK; 2], &[]).unwrap_err();
        assert!(matches!(
            err,
            CloudlensError::SizeMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(renderer.context().scene.is_none());
        assert_eq!(renderer.generation(), 0);
    }

    #[test]
    fn test_load_replaces_scene_and_bumps_generation() {
        let mut renderer = PointCloudRenderer::new(&Options::default());
        assert_eq!(renderer.load(&cloud(3), vec![Rgb::BLACK; 3], &[]).unwrap(), 1);
        assert_eq!(renderer.load(&cloud(5), vec![Rgb::BLACK; 5], &[]).unwrap(), 2);
        let scene = renderer.context().scene.as_ref().unwrap();
        assert_eq!(scene.len(), 5);
        assert_eq!(scene.generation, 2);
    }

    #[test]
    fn test_live_state_survives_loads() {
        let mut renderer = PointCloudRenderer::new(&Options::default());
        renderer.set_point_size(10.0);
        renderer.set_clip_offset(ClipAxis::Z, 30.0);
        renderer.set_points_visible(false);
        renderer.load(&cloud(2), vec![Rgb::BLACK; 2], &[]).unwrap();

        let ctx = renderer.context();
        assert_eq!(ctx.point_size, 3.0);
        assert_eq!(ctx.clipping.offset(ClipAxis::Z), 30.0);
        assert!(!ctx.points_visible);
        assert_eq!(ctx.point_uniforms().visible, 0);
    }

    #[test]
    fn test_clipping_counts_visible_points() {
        let mut renderer = PointCloudRenderer::new(&Options::default());
        renderer.load(&cloud(4), vec![Rgb::BLACK; 4], &[]).unwrap();
        assert_eq!(renderer.context().visible_point_count(), 4);

        // Every point sits at z = 50; 50 + 30 > 0 hides them.
        renderer.set_clip_offset(ClipAxis::Z, 30.0);
        assert_eq!(renderer.context().visible_point_count(), 0);
        renderer.set_clip_offset(ClipAxis::Z, -60.0);
        assert_eq!(renderer.context().visible_point_count(), 4);

        renderer.set_points_visible(false);
        assert_eq!(renderer.context().visible_point_count(), 0);
    }

    #[test]
    fn test_load_dataset_builds_legend_and_ellipsoids() {
        let mut dataset = Dataset::from_response(
            PointCloudResponse {
                point_cloud: vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
                values: Some(vec![0.0, 10.0]),
                max_value: 10.0,
                explanation_text: "density".into(),
                color_gradient: Some(ColorGradient::new(vec![Rgb([0, 0, 255]), Rgb([255, 0, 0])])),
                ..PointCloudResponse::default()
            },
            ColorMapName::Viridis,
        )
        .unwrap();
        dataset.gaussians = vec![
            GaussianComponent::new(Vec3::ZERO, Covariance::diagonal([4.0, 1.0, 0.0])),
            GaussianComponent::new(Vec3::ONE, Covariance([[1.0, 5.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])),
        ];

        let mut renderer = PointCloudRenderer::new(&Options::default());
        renderer.load_dataset(&dataset).unwrap();

        let ctx = renderer.context();
        let scene = ctx.scene.as_ref().unwrap();
        assert_eq!(scene.colors, vec![Rgb([0, 0, 255]), Rgb([255, 0, 0])]);
        // The non-symmetric covariance is skipped.
        assert_eq!(scene.ellipsoids.len(), 1);
        assert!((scene.ellipsoids[0].color[3] - 0.2).abs() < 1e-6);

        let legend = ctx.legend.as_ref().unwrap();
        assert_eq!(legend.min_label, "0.00");
        assert_eq!(legend.max_label, "10.00");
        assert_eq!(legend.explanation, "density");
        assert_eq!(dataset.range, ValueRange::new(0.0, 10.0));
    }

    #[test]
    fn test_fit_camera() {
        let mut renderer = PointCloudRenderer::new(&Options::default());
        let mut camera = OrbitCamera::default();
        assert!(!renderer.fit_camera(&mut camera));

        renderer.load(&cloud(3), vec![Rgb::BLACK; 3], &[]).unwrap();
        assert!(renderer.fit_camera(&mut camera));
        assert_eq!(camera.target, Vec3::new(1.0, 0.0, 50.0));
    }
}
