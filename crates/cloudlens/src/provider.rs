//! Data delivery seam.
//!
//! A [`DataProvider`] answers dataset-list and point-cloud requests with raw
//! JSON bodies. Providers may block on their own threads, but everything
//! they deliver is picked up on the event loop through
//! [`DataProvider::poll_events`], where it is parsed and applied.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

use cloudlens_core::{CloudlensError, FetchProgress, Property, RequestToken, Selection};
use log::debug;

const READ_CHUNK: usize = 64 * 1024;

/// A completion or progress notification from a provider.
#[derive(Debug)]
pub enum ProviderEvent {
    /// Body of `GET data_names`.
    DataNames(Result<Vec<u8>, CloudlensError>),
    /// Transfer progress of a point cloud request.
    Progress {
        token: RequestToken,
        progress: FetchProgress,
    },
    /// Body of `GET pointcloud` for the request tagged `token`.
    PointCloud {
        token: RequestToken,
        selection: Selection,
        body: Result<Vec<u8>, CloudlensError>,
    },
}

/// Source of datasets.
pub trait DataProvider {
    /// Starts fetching the list of dataset names.
    fn request_data_names(&mut self);

    /// Starts fetching one point cloud. The completion carries `token`.
    fn request_point_cloud(&mut self, token: RequestToken, selection: &Selection);

    /// Returns every event that arrived since the last call without blocking.
    fn poll_events(&mut self) -> Vec<ProviderEvent>;
}

/// Serves the response schema from JSON files:
/// `<root>/data_names.json` and `<root>/<dataname>/<property>.json`.
///
/// Each request is read on its own thread.
pub struct DirectoryProvider {
    root: PathBuf,
    tx: Sender<ProviderEvent>,
    rx: Receiver<ProviderEvent>,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (tx, rx) = channel();
        Self {
            root: root.into(),
            tx,
            rx,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File answering `selection`. Names that would escape the root are rejected.
    pub fn point_cloud_path(&self, selection: &Selection) -> Result<PathBuf, CloudlensError> {
        let name = selection.dataname.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(CloudlensError::FetchFailure(format!(
                "invalid dataset name '{name}'"
            )));
        }
        Ok(self
            .root
            .join(name)
            .join(format!("{}.json", selection.property)))
    }
}

impl DataProvider for DirectoryProvider {
    fn request_data_names(&mut self) {
        let path = self.root.join("data_names.json");
        let tx = self.tx.clone();
        thread::spawn(move || {
            let body = read_with_progress(&path, |_| {});
            let _ = tx.send(ProviderEvent::DataNames(body));
        });
    }

    fn request_point_cloud(&mut self, token: RequestToken, selection: &Selection) {
        let selection = selection.clone();
        let path = match self.point_cloud_path(&selection) {
            Ok(path) => path,
            Err(e) => {
                let _ = self.tx.send(ProviderEvent::PointCloud {
                    token,
                    selection,
                    body: Err(e),
                });
                return;
            }
        };

        debug!("request {} reading {}", token.value(), path.display());
        let tx = self.tx.clone();
        thread::spawn(move || {
            let progress_tx = tx.clone();
            let body = read_with_progress(&path, |progress| {
                let _ = progress_tx.send(ProviderEvent::Progress { token, progress });
            });
            let _ = tx.send(ProviderEvent::PointCloud {
                token,
                selection,
                body,
            });
        });
    }

    fn poll_events(&mut self) -> Vec<ProviderEvent> {
        self.rx.try_iter().collect()
    }
}

/// Reads a whole file, reporting progress after every chunk.
pub fn read_with_progress(
    path: &Path,
    mut report: impl FnMut(FetchProgress),
) -> Result<Vec<u8>, CloudlensError> {
    let fail = |e: std::io::Error| CloudlensError::FetchFailure(format!("{}: {e}", path.display()));

    let mut file = File::open(path).map_err(fail)?;
    let expected = file.metadata().ok().map(|m| m.len());
    let mut body = Vec::with_capacity(expected.map_or(0, |n| usize::try_from(n).unwrap_or(0)));
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = file.read(&mut chunk).map_err(fail)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
        report(FetchProgress {
            received: body.len() as u64,
            expected,
        });
    }

    Ok(body)
}

/// In-memory provider. Requests complete on the next poll, in request order.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    names: Vec<String>,
    bodies: HashMap<(String, Property), Vec<u8>>,
    pending: Vec<ProviderEvent>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the body served for (`dataname`, `property`). The first
    /// registered name becomes the default selection.
    #[must_use]
    pub fn with_body(mut self, dataname: &str, property: Property, body: impl Into<Vec<u8>>) -> Self {
        if !self.names.iter().any(|n| n == dataname) {
            self.names.push(dataname.to_string());
        }
        self.bodies
            .insert((dataname.to_string(), property), body.into());
        self
    }
}

impl DataProvider for MemoryProvider {
    fn request_data_names(&mut self) {
        let body = serde_json::to_vec(&serde_json::json!({ "data_name": self.names }))
            .map_err(CloudlensError::from);
        self.pending.push(ProviderEvent::DataNames(body));
    }

    fn request_point_cloud(&mut self, token: RequestToken, selection: &Selection) {
        let key = (selection.dataname.clone(), selection.property);
        let body = self.bodies.get(&key).cloned().ok_or_else(|| {
            CloudlensError::FetchFailure(format!(
                "no data for {}/{}",
                selection.dataname, selection.property
            ))
        });
        if let Ok(bytes) = &body {
            let n = bytes.len() as u64;
            self.pending.push(ProviderEvent::Progress {
                token,
                progress: FetchProgress {
                    received: n,
                    expected: Some(n),
                },
            });
        }
        self.pending.push(ProviderEvent::PointCloud {
            token,
            selection: selection.clone(),
            body,
        });
    }

    fn poll_events(&mut self) -> Vec<ProviderEvent> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudlens_core::{ColorMapName, SelectionTracker};
    use std::time::{Duration, Instant};

    fn temp_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("cloudlens-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    fn wait_for(provider: &mut DirectoryProvider, count: usize) -> Vec<ProviderEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while events.len() < count && Instant::now() < deadline {
            events.extend(provider.poll_events());
            thread::sleep(Duration::from_millis(5));
        }
        events
    }

    #[test]
    fn test_directory_provider_serves_files() {
        let root = temp_root("dir-provider");
        std::fs::write(root.join("data_names.json"), r#"{"data_name": ["galaxy"]}"#).unwrap();
        std::fs::create_dir_all(root.join("galaxy")).unwrap();
        std::fs::write(root.join("galaxy").join("density.json"), r#"{"point_cloud": []}"#).unwrap();

        let mut provider = DirectoryProvider::new(&root);
        provider.request_data_names();
        let events = wait_for(&mut provider, 1);
        match &events[0] {
            ProviderEvent::DataNames(Ok(body)) => assert!(body.starts_with(b"{\"data_name\"")),
            other => panic!("unexpected event {other:?}"),
        }

        let mut tracker = SelectionTracker::new();
        let selection = Selection::new(ColorMapName::Viridis, "galaxy", Property::Density);
        let token = tracker.begin(selection.clone());
        provider.request_point_cloud(token, &selection);

        let events = wait_for(&mut provider, 2);
        let completion = events
            .iter()
            .find_map(|e| match e {
                ProviderEvent::PointCloud { token: t, body, .. } => Some((*t, body)),
                _ => None,
            })
            .unwrap();
        assert_eq!(completion.0, token);
        assert_eq!(completion.1.as_ref().unwrap(), br#"{"point_cloud": []}"#);
        assert!(events
            .iter()
            .any(|e| matches!(e, ProviderEvent::Progress { progress, .. } if progress.fraction() == Some(1.0))));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_file_is_fetch_failure() {
        let root = temp_root("dir-missing");
        let mut provider = DirectoryProvider::new(&root);
        let mut tracker = SelectionTracker::new();
        let selection = Selection::new(ColorMapName::Viridis, "nope", Property::Shape);
        provider.request_point_cloud(tracker.begin(selection.clone()), &selection);

        let events = wait_for(&mut provider, 1);
        assert!(matches!(
            &events[0],
            ProviderEvent::PointCloud {
                body: Err(CloudlensError::FetchFailure(_)),
                ..
            }
        ));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_dataset_names_cannot_escape_root() {
        let provider = DirectoryProvider::new("/data");
        let bad = Selection::new(ColorMapName::Viridis, "../etc", Property::Density);
        assert!(provider.point_cloud_path(&bad).is_err());
        let good = Selection::new(ColorMapName::Viridis, "galaxy", Property::Shape);
        assert_eq!(
            provider.point_cloud_path(&good).unwrap(),
            Path::new("/data/galaxy/shape.json")
        );
    }

    #[test]
    fn test_read_with_progress_reports_chunks() {
        let root = temp_root("progress");
        let path = root.join("big.json");
        std::fs::write(&path, vec![b' '; READ_CHUNK * 2 + 10]).unwrap();

        let mut reports = Vec::new();
        let body = read_with_progress(&path, |p| reports.push(p)).unwrap();
        assert_eq!(body.len(), READ_CHUNK * 2 + 10);
        assert!(reports.len() >= 3);
        assert!(reports.windows(2).all(|w| w[0].received < w[1].received));
        assert_eq!(reports.last().unwrap().fraction(), Some(1.0));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_memory_provider_round_trip() {
        let mut provider = MemoryProvider::new().with_body("a", Property::Density, "{}");
        provider.request_data_names();
        let events = provider.poll_events();
        match &events[0] {
            ProviderEvent::DataNames(Ok(body)) => {
                let names: serde_json::Value = serde_json::from_slice(body).unwrap();
                assert_eq!(names["data_name"][0], "a");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(provider.poll_events().is_empty());
    }
}
