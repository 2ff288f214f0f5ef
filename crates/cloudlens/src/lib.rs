//! cloudlens: an interactive viewer for scalar-annotated point clouds.
//!
//! Datasets come from a [`DataProvider`] as JSON bodies: a list of dataset
//! names and, per selection, a point cloud with colors, scalar values or
//! labels, optionally with Gaussian mixture components drawn as one-sigma
//! ellipsoids. Three axis-aligned clipping planes cut the scene.
//!
//! # Quick Start
//!
//! ```no_run
//! use cloudlens::*;
//!
//! fn main() -> Result<()> {
//!     // data_names.json and <dataname>/<property>.json under ./data
//!     let provider = DirectoryProvider::new("data");
//!     run(Box::new(provider), Options::default())
//! }
//! ```
//!
//! # Headless
//!
//! [`render_to_image`] and [`render_to_file`] draw a single [`Dataset`]
//! without opening a window.

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

mod app;
pub mod controls;
pub mod error;
pub mod provider;
pub mod renderer;
pub mod session;

use std::path::Path;
use std::sync::mpsc::Receiver;

use pollster::FutureExt;

// Re-export core types
pub use cloudlens_core::{
    ClipAxis, ClippingPlane, CloudlensError, ColorGradient, ColorMapName, Covariance,
    DataNamesResponse, Dataset, FetchProgress, GaussianComponent, LegendConfig, Options,
    PointAttributes, PointCloud, PointCloudResponse, Property, Rgb, Selection, ValueRange, Vec3,
};

// Re-export render types
pub use cloudlens_render::{OrbitCamera, RenderEngine};

pub use app::App;
pub use controls::{ControlChange, ViewerControls};
pub use error::{Result, ViewerError};
pub use provider::{DataProvider, DirectoryProvider, MemoryProvider, ProviderEvent};
pub use renderer::PointCloudRenderer;
pub use session::Session;

/// Opens the viewer with default options and blocks until it is closed.
///
/// Errors are logged rather than returned.
pub fn show(provider: Box<dyn DataProvider>) {
    if let Err(e) = run(provider, Options::default()) {
        log::error!("cloudlens exited with an error: {e}");
    }
}

/// Installs `env_logger` unless the application already set a logger.
fn init_logging() {
    let _ = env_logger::try_init();
}

/// Opens the viewer and blocks until it is closed.
pub fn run(provider: Box<dyn DataProvider>, options: Options) -> Result<()> {
    init_logging();
    app::run_app(App::new(provider, options))
}

/// Like [`run`], additionally applying every [`ControlChange`] sent on `controls`.
///
/// ```no_run
/// use std::sync::mpsc::channel;
/// use cloudlens::*;
///
/// let (tx, rx) = channel();
/// std::thread::spawn(move || {
///     let _ = tx.send(ControlChange::SetClipOffset(ClipAxis::Z, 0.0));
/// });
/// run_with_controls(Box::new(DirectoryProvider::new("data")), Options::default(), rx).unwrap();
/// ```
pub fn run_with_controls(
    provider: Box<dyn DataProvider>,
    options: Options,
    controls: Receiver<ControlChange>,
) -> Result<()> {
    init_logging();
    app::run_app(App::new(provider, options).with_controls(controls))
}

/// Renders `dataset` to tightly packed RGBA8 pixels without a window.
///
/// The camera is fitted to the dataset's bounds. The returned buffer is
/// `width * height * 4` bytes, top row first.
pub fn render_to_image(
    dataset: &Dataset,
    options: &Options,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let mut engine = RenderEngine::new_headless(width, height, options).block_on()?;

    let mut renderer = PointCloudRenderer::new(options);
    renderer.load_dataset(dataset)?;
    renderer.fit_camera(&mut engine.camera);
    renderer.prepare(&mut engine)?;

    Ok(engine.render_to_buffer(renderer.gpu_scene())?)
}

/// Renders `dataset` and saves it as PNG or JPEG, chosen by the extension.
pub fn render_to_file(
    path: impl AsRef<Path>,
    dataset: &Dataset,
    options: &Options,
    width: u32,
    height: u32,
) -> Result<()> {
    let pixels = render_to_image(dataset, options, width, height)?;
    cloudlens_render::save_image(path, &pixels, width, height)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
        log::debug!("logger installed");
    }
}
