//! Dataset selection and request ordering.
//!
//! Each fetch is tagged with a [`RequestToken`]. A completion is committed
//! only if it answers the most recent request and the selection it was made
//! for is still current, so switching selection mid-flight leaves the viewer
//! showing the last choice only.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::color_map::ColorMapName;
use crate::dataset::Property;

/// The parameters identifying one point cloud request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub colormap: ColorMapName,
    pub dataname: String,
    pub property: Property,
}

impl Selection {
    pub fn new(colormap: ColorMapName, dataname: impl Into<String>, property: Property) -> Self {
        Self {
            colormap,
            dataname: dataname.into(),
            property,
        }
    }
}

/// Monotonically increasing request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Tracks the current selection and the newest outstanding request.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    current: Option<Selection>,
    next: u64,
    latest: Option<RequestToken>,
    loading: bool,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `selection` current and issues the token for its request.
    pub fn begin(&mut self, selection: Selection) -> RequestToken {
        self.next += 1;
        let token = RequestToken(self.next);
        self.current = Some(selection);
        self.latest = Some(token);
        self.loading = true;
        token
    }

    /// Returns true if a completion for (`token`, `selection`) should be
    /// applied. Accepting clears the loading flag.
    pub fn accept(&mut self, token: RequestToken, selection: &Selection) -> bool {
        let fresh = self.latest == Some(token) && self.current.as_ref() == Some(selection);
        if fresh {
            self.loading = false;
        } else {
            debug!(
                "dropping stale completion {} for {}/{}",
                token.value(),
                selection.dataname,
                selection.property
            );
        }
        fresh
    }

    /// Records that the latest request failed. Stale failures are ignored.
    pub fn fail(&mut self, token: RequestToken) -> bool {
        if self.latest == Some(token) {
            self.loading = false;
            true
        } else {
            false
        }
    }

    /// Token of the most recent request.
    pub fn latest(&self) -> Option<RequestToken> {
        self.latest
    }

    pub fn current(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    /// Whether a request is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

/// Bytes received against the expected total of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchProgress {
    pub received: u64,
    /// `None` when the size is not known in advance.
    pub expected: Option<u64>,
}

impl FetchProgress {
    /// Advisory completion fraction in `[0, 1]`, if the total is known.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn fraction(&self) -> Option<f32> {
        match self.expected {
            Some(0) => Some(1.0),
            Some(total) => Some((self.received as f64 / total as f64).min(1.0) as f32),
            None => None,
        }
    }
}
