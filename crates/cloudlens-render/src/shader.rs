//! WGSL module assembly.

/// Struct definitions and helpers shared by every scene shader.
pub const COMMON_WGSL: &str = include_str!("shaders/common.wgsl");
pub const POINT_SPRITE_WGSL: &str = include_str!("shaders/point_sprite.wgsl");
pub const ELLIPSOID_WGSL: &str = include_str!("shaders/ellipsoid.wgsl");
pub const LEGEND_WGSL: &str = include_str!("shaders/legend.wgsl");

/// Concatenates WGSL sources into one shader module.
pub struct ShaderBuilder {
    sources: Vec<&'static str>,
    label: Option<String>,
}

impl ShaderBuilder {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            label: None,
        }
    }

    /// Starts from the shared scene definitions.
    pub fn scene() -> Self {
        Self::new().with_source(COMMON_WGSL)
    }

    /// Appends a source chunk.
    #[must_use]
    pub fn with_source(mut self, source: &'static str) -> Self {
        self.sources.push(source);
        self
    }

    /// Sets the shader label for debugging.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The combined source text.
    pub fn source(&self) -> String {
        self.sources.join("\n\n")
    }

    /// Builds the shader module.
    pub fn build_module(self, device: &wgpu::Device) -> wgpu::ShaderModule {
        let source = self.source();
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: self.label.as_deref(),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    }
}

impl Default for ShaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_shaders_include_common_definitions() {
        let source = ShaderBuilder::scene().with_source(POINT_SPRITE_WGSL).source();
        assert!(source.contains("struct CameraUniforms"));
        assert!(source.contains("fn is_clipped"));
        assert!(source.contains("fn vs_main"));
    }

    #[test]
    fn test_entry_points_present() {
        for src in [POINT_SPRITE_WGSL, ELLIPSOID_WGSL, LEGEND_WGSL] {
            assert!(src.contains("fn vs_main"));
            assert!(src.contains("fn fs_main"));
        }
    }

    #[test]
    fn test_point_sprite_edge_fades() {
        assert!(POINT_SPRITE_WGSL.contains("1.0 - smoothstep(0.9, 1.0, r)"));
        assert!(POINT_SPRITE_WGSL.contains("vec4<f32>(color, alpha)"));
        assert!(!POINT_SPRITE_WGSL.contains("r > 1.0"));
    }
}
