//! Application window and event loop management.

mod input;

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use pollster::FutureExt;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use cloudlens_core::Options;
use cloudlens_render::{RenderEngine, RenderError};

use crate::controls::ControlChange;
use crate::error::{Result, ViewerError};
use crate::provider::DataProvider;
use crate::renderer::PointCloudRenderer;
use crate::session::Session;

/// The cloudlens application state.
pub struct App {
    pub(super) window: Option<Arc<Window>>,
    pub(super) engine: Option<RenderEngine>,
    pub(super) options: Options,
    pub(super) session: Session,
    pub(super) renderer: PointCloudRenderer,
    pub(super) control_rx: Option<Receiver<ControlChange>>,
    pub(super) close_requested: bool,
    // Mouse state for camera control
    pub(super) mouse_pos: (f64, f64),
    pub(super) left_mouse_down: bool,
    pub(super) right_mouse_down: bool,
    pub(super) shift_down: bool,
    // Whether the camera has been fitted to the first dataset
    pub(super) camera_fitted: bool,
    pub(super) title: String,
    pub(super) fatal: Option<ViewerError>,
}

impl App {
    /// Creates a new application.
    pub fn new(provider: Box<dyn DataProvider>, options: Options) -> Self {
        let session = Session::new(provider, &options);
        let renderer = PointCloudRenderer::new(&options);
        Self {
            window: None,
            engine: None,
            title: options.title.clone(),
            options,
            session,
            renderer,
            control_rx: None,
            close_requested: false,
            mouse_pos: (0.0, 0.0),
            left_mouse_down: false,
            right_mouse_down: false,
            shift_down: false,
            camera_fitted: false,
            fatal: None,
        }
    }

    /// Accepts control changes from another thread.
    #[must_use]
    pub fn with_controls(mut self, rx: Receiver<ControlChange>) -> Self {
        self.control_rx = Some(rx);
        self
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: ViewerError) {
        log::error!("{error}");
        self.fatal = Some(error);
        event_loop.exit();
    }

    /// Applies pending control changes and provider events.
    fn pump(&mut self) {
        if let Some(rx) = &self.control_rx {
            let changes: Vec<ControlChange> = rx.try_iter().collect();
            for change in changes {
                self.session.apply(change, &mut self.renderer);
            }
        }

        let loaded = self.session.pump(&mut self.renderer);
        if loaded && !self.camera_fitted && self.options.normalize_extent.is_none() {
            if let Some(engine) = &mut self.engine {
                self.camera_fitted = self.renderer.fit_camera(&mut engine.camera);
            }
        }
        self.update_title();
    }

    fn update_title(&mut self) {
        let title = match (self.session.is_loading(), self.session.controls().selection()) {
            (true, _) => match self.session.progress().and_then(|p| p.fraction()) {
                Some(f) => format!("{} - loading {:.0}%", self.options.title, f * 100.0),
                None => format!("{} - loading", self.options.title),
            },
            (false, Some(selection)) => {
                let explanation = self
                    .renderer
                    .context()
                    .legend
                    .as_ref()
                    .map(|l| l.explanation.as_str())
                    .unwrap_or_default();
                format!(
                    "{} - {}/{} {explanation}",
                    self.options.title, selection.dataname, selection.property
                )
            }
            (false, None) => self.options.title.clone(),
        };
        if title != self.title {
            if let Some(window) = &self.window {
                window.set_title(&title);
            }
            self.title = title;
        }
    }

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        let Some(engine) = &mut self.engine else {
            return;
        };

        engine.camera.update();
        if let Err(e) = self.renderer.prepare(engine) {
            log::error!("failed to upload scene: {e}");
            return;
        }

        match engine.render_frame(self.renderer.gpu_scene()) {
            Ok(()) | Err(RenderError::SurfaceLost) => {}
            Err(RenderError::Timeout) => log::warn!("Surface timeout"),
            Err(RenderError::OutOfMemory) => {
                self.fail(event_loop, ViewerError::Render(RenderError::OutOfMemory));
            }
            Err(e) => log::warn!("frame skipped: {e}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title(self.options.title.clone())
            .with_inner_size(LogicalSize::new(
                self.options.window_width,
                self.options.window_height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, e.into());
                return;
            }
        };

        let engine = match RenderEngine::new_windowed(window.clone(), &self.options).block_on() {
            Ok(engine) => engine,
            Err(e) => {
                self.fail(event_loop, e.into());
                return;
            }
        };

        self.window = Some(window);
        self.engine = Some(engine);
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                if let Some(engine) = &mut self.engine {
                    engine.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.render(event_loop);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            other => self.handle_input(&other),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.pump();
        if self.close_requested {
            event_loop.exit();
        }
    }
}

/// Runs the viewer until the window is closed.
pub fn run_app(mut app: App) -> Result<()> {
    let event_loop = EventLoop::new()?;
    app.session.start();
    event_loop.run_app(&mut app)?;
    match app.fatal.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
