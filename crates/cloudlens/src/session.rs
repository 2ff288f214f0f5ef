//! Selection handling between the provider and the renderer.
//!
//! Runs on the event loop thread: applies control changes, issues fetches,
//! and turns accepted responses into loaded datasets.

use cloudlens_core::{
    CloudlensError, DataNamesResponse, Dataset, FetchProgress, Options, PointCloudResponse,
    RequestToken, Selection, SelectionTracker,
};
use log::{debug, info, warn};

use crate::controls::{ControlChange, ControlEffect, ViewerControls};
use crate::provider::{DataProvider, ProviderEvent};
use crate::renderer::PointCloudRenderer;

/// Viewer state that is not GPU state.
pub struct Session {
    provider: Box<dyn DataProvider>,
    tracker: SelectionTracker,
    controls: ViewerControls,
    data_names: Vec<String>,
    progress: Option<FetchProgress>,
    normalize_extent: Option<f32>,
}

impl Session {
    pub fn new(provider: Box<dyn DataProvider>, options: &Options) -> Self {
        Self {
            provider,
            tracker: SelectionTracker::new(),
            controls: ViewerControls::from_options(options),
            data_names: Vec::new(),
            progress: None,
            normalize_extent: options.normalize_extent,
        }
    }

    /// Requests the dataset list; the first dataset is fetched once it arrives.
    pub fn start(&mut self) {
        self.provider.request_data_names();
    }

    pub fn controls(&self) -> &ViewerControls {
        &self.controls
    }

    pub fn data_names(&self) -> &[String] {
        &self.data_names
    }

    /// Whether a fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        self.tracker.is_loading()
    }

    /// Progress of the outstanding fetch, if the provider reports it.
    pub fn progress(&self) -> Option<FetchProgress> {
        self.progress
    }

    /// Applies a control change: selection changes start a fetch, the rest
    /// go straight to the renderer.
    pub fn apply(&mut self, change: ControlChange, renderer: &mut PointCloudRenderer) {
        match self.controls.apply(change) {
            ControlEffect::Refetch => self.refetch(),
            ControlEffect::Live => self.sync_live_state(renderer),
            ControlEffect::Unchanged => {}
        }
    }

    fn sync_live_state(&self, renderer: &mut PointCloudRenderer) {
        let c = &self.controls;
        for axis in cloudlens_core::ClipAxis::ALL {
            renderer.set_clip_offset(axis, c.clip_offsets[axis.index()]);
        }
        renderer.set_point_size(c.point_size);
        renderer.set_points_visible(c.points_visible);
        renderer.set_ellipsoids_visible(c.ellipsoids_visible);
    }

    fn refetch(&mut self) {
        let Some(selection) = self.controls.selection() else {
            return;
        };
        let token = self.tracker.begin(selection.clone());
        self.progress = None;
        debug!(
            "request {}: {}/{} ({})",
            token.value(),
            selection.dataname,
            selection.property,
            selection.colormap
        );
        self.provider.request_point_cloud(token, &selection);
    }

    /// Handles everything the provider delivered. Returns true if a new
    /// dataset was loaded.
    pub fn pump(&mut self, renderer: &mut PointCloudRenderer) -> bool {
        let mut loaded = false;
        for event in self.provider.poll_events() {
            loaded |= self.handle_event(event, renderer);
        }
        loaded
    }

    /// Handles one provider event. Returns true if a new dataset was loaded.
    pub fn handle_event(&mut self, event: ProviderEvent, renderer: &mut PointCloudRenderer) -> bool {
        match event {
            ProviderEvent::DataNames(body) => {
                self.on_data_names(body);
                false
            }
            ProviderEvent::Progress { token, progress } => {
                if self.tracker.is_loading() && self.tracker.latest() == Some(token) {
                    self.progress = Some(progress);
                }
                false
            }
            ProviderEvent::PointCloud {
                token,
                selection,
                body,
            } => self.on_point_cloud(token, &selection, body, renderer),
        }
    }

    fn on_data_names(&mut self, body: Result<Vec<u8>, CloudlensError>) {
        let names = body.and_then(|bytes| {
            serde_json::from_slice::<DataNamesResponse>(&bytes).map_err(CloudlensError::from)
        });
        match names {
            Ok(names) => {
                let default = names.default_selection().map(str::to_string);
                self.data_names = names.data_name;
                let current_listed = self
                    .controls
                    .dataname
                    .as_ref()
                    .is_some_and(|n| self.data_names.contains(n));
                match default {
                    Some(name) if !current_listed => {
                        self.controls.apply(ControlChange::SetDataName(name));
                        self.refetch();
                    }
                    Some(_) => {}
                    None => warn!("provider lists no datasets"),
                }
            }
            Err(e) => warn!("failed to load dataset names: {e}"),
        }
    }

    fn on_point_cloud(
        &mut self,
        token: RequestToken,
        selection: &Selection,
        body: Result<Vec<u8>, CloudlensError>,
        renderer: &mut PointCloudRenderer,
    ) -> bool {
        let bytes = match body {
            Ok(bytes) => bytes,
            Err(e) => {
                if self.tracker.fail(token) {
                    self.progress = None;
                    warn!(
                        "fetch of {}/{} failed, keeping the current dataset: {e}",
                        selection.dataname, selection.property
                    );
                }
                return false;
            }
        };

        if !self.tracker.accept(token, selection) {
            return false;
        }
        self.progress = None;

        match self.build_dataset(&bytes, selection) {
            Ok(dataset) => match renderer.load_dataset(&dataset) {
                Ok(_) => {
                    info!(
                        "showing {}/{} with {}",
                        selection.dataname, selection.property, selection.colormap
                    );
                    true
                }
                Err(e) => {
                    warn!("could not load {}: {e}", selection.dataname);
                    false
                }
            },
            Err(e) => {
                warn!(
                    "discarding response for {}/{}: {e}",
                    selection.dataname, selection.property
                );
                false
            }
        }
    }

    fn build_dataset(&self, bytes: &[u8], selection: &Selection) -> Result<Dataset, CloudlensError> {
        let response: PointCloudResponse = serde_json::from_slice(bytes)?;
        let mut dataset = Dataset::from_response(response, selection.colormap)?;
        if let Some(extent) = self.normalize_extent {
            dataset.normalize(extent);
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use cloudlens_core::{ClipAxis, ColorMapName, Property, Vec3};

    const CLOUD_A: &str = r#"{
        "point_cloud": [[0, 0, 0], [1, 0, 0]],
        "values": [0.0, 1.0],
        "min_value": 0.0,
        "max_value": 1.0,
        "explanation_text": "a"
    }"#;

    const CLOUD_B: &str = r#"{
        "point_cloud": [[5, 5, 5]],
        "colors": [[255, 0, 0]],
        "min_value": 0.0,
        "max_value": 1.0,
        "explanation_text": "b",
        "gaussians": {
            "means": [[5, 5, 5]],
            "covariances": [[[4, 0, 0], [0, 1, 0], [0, 0, 0]]]
        }
    }"#;

    fn session(provider: MemoryProvider) -> (Session, PointCloudRenderer) {
        let options = Options::default();
        (
            Session::new(Box::new(provider), &options),
            PointCloudRenderer::new(&options),
        )
    }

    fn provider() -> MemoryProvider {
        MemoryProvider::new()
            .with_body("a", Property::Density, CLOUD_A)
            .with_body("b", Property::Density, CLOUD_B)
    }

    #[test]
    fn test_first_dataset_loads_after_names() {
        let (mut s, mut r) = session(provider());
        s.start();
        assert!(!s.pump(&mut r));
        assert_eq!(s.data_names(), ["a", "b"]);
        assert!(s.is_loading());

        assert!(s.pump(&mut r));
        assert!(!s.is_loading());
        assert_eq!(r.generation(), 1);
        let scene = r.context().scene.as_ref().unwrap();
        assert_eq!(scene.positions.len(), 2);
        assert_eq!(r.context().legend.as_ref().unwrap().explanation, "a");
    }

    #[test]
    fn test_only_last_selection_is_applied() {
        let (mut s, mut r) = session(provider());
        s.start();
        s.pump(&mut r); // names arrive, "a" requested
        s.apply(ControlChange::SetDataName("b".into()), &mut r); // "b" requested before "a" resolved

        assert!(s.pump(&mut r));
        assert_eq!(r.generation(), 1);
        let scene = r.context().scene.as_ref().unwrap();
        assert_eq!(scene.positions, vec![Vec3::splat(5.0)]);
        assert_eq!(scene.colors, vec![cloudlens_core::Rgb([255, 0, 0])]);
        assert_eq!(scene.ellipsoids.len(), 1);
    }

    #[test]
    fn test_failed_fetch_keeps_last_dataset() {
        let (mut s, mut r) = session(provider());
        s.start();
        s.pump(&mut r);
        s.pump(&mut r);
        assert_eq!(r.generation(), 1);

        s.apply(ControlChange::SetDataName("missing".into()), &mut r);
        assert!(s.is_loading());
        assert!(!s.pump(&mut r));
        assert!(!s.is_loading());
        assert_eq!(r.generation(), 1);
        assert_eq!(r.context().scene.as_ref().unwrap().positions.len(), 2);
    }

    #[test]
    fn test_malformed_response_is_discarded() {
        let provider = MemoryProvider::new()
            .with_body("good", Property::Density, CLOUD_A)
            .with_body("bad", Property::Density, r#"{"point_cloud": [[0, 0, 0]], "values": []}"#);
        let (mut s, mut r) = session(provider);
        s.start();
        s.pump(&mut r);
        s.pump(&mut r);

        s.apply(ControlChange::SetDataName("bad".into()), &mut r);
        assert!(!s.pump(&mut r));
        assert_eq!(r.generation(), 1);
    }

    #[test]
    fn test_live_controls_do_not_fetch() {
        let (mut s, mut r) = session(provider());
        s.start();
        s.pump(&mut r);
        s.pump(&mut r);

        s.apply(ControlChange::SetClipOffset(ClipAxis::Z, 30.0), &mut r);
        s.apply(ControlChange::SetPointSize(2.0), &mut r);
        assert!(!s.is_loading());
        assert_eq!(r.context().clipping.offset(ClipAxis::Z), 30.0);
        assert_eq!(r.context().point_size, 2.0);
        assert!(!s.pump(&mut r));
        assert_eq!(r.generation(), 1);
    }

    #[test]
    fn test_colormap_change_refetches() {
        let (mut s, mut r) = session(provider());
        s.start();
        s.pump(&mut r);
        s.pump(&mut r);

        s.apply(ControlChange::SetColorMap(ColorMapName::Jet), &mut r);
        assert!(s.is_loading());
        assert!(s.pump(&mut r));
        assert_eq!(r.generation(), 2);
        assert_eq!(s.controls().colormap, ColorMapName::Jet);
    }

    #[test]
    fn test_empty_name_list_selects_nothing() {
        let (mut s, mut r) = session(MemoryProvider::new());
        s.start();
        s.pump(&mut r);
        assert!(s.data_names().is_empty());
        assert!(s.controls().selection().is_none());
        assert!(!s.is_loading());
    }
}
