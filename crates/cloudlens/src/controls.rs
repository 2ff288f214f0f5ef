//! Inbound control parameters.
//!
//! Whatever drives the viewer (keyboard bindings, an external UI, a test)
//! sends [`ControlChange`]s. Selection changes trigger a new fetch; every
//! other change is applied to live render state only.

use cloudlens_core::{ClipAxis, ClippingPlane, ColorMapName, Options, Property, Selection};
use cloudlens_render::clamp_point_size;

/// One parameter change.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlChange {
    SetColorMap(ColorMapName),
    SetDataName(String),
    SetProperty(Property),
    SetClipOffset(ClipAxis, f32),
    SetPointSize(f32),
    SetPointsVisible(bool),
    SetEllipsoidsVisible(bool),
}

/// What applying a change requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEffect {
    /// The selection changed; a new dataset must be fetched.
    Refetch,
    /// Only live uniforms changed.
    Live,
    /// The value was already current.
    Unchanged,
}

/// Current values of every control.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerControls {
    pub colormap: ColorMapName,
    /// `None` until the dataset list has arrived.
    pub dataname: Option<String>,
    pub property: Property,
    pub clip_offsets: [f32; 3],
    pub point_size: f32,
    pub points_visible: bool,
    pub ellipsoids_visible: bool,
}

impl ViewerControls {
    pub fn from_options(options: &Options) -> Self {
        Self {
            colormap: options.colormap,
            dataname: None,
            property: options.property,
            clip_offsets: ClipAxis::ALL
                .map(|axis| ClippingPlane::new(axis, options.clip_offsets[axis.index()]).offset()),
            point_size: clamp_point_size(options.point_size),
            points_visible: options.points_visible,
            ellipsoids_visible: options.show_ellipsoids,
        }
    }

    /// The selection to fetch, once a dataset name is known.
    pub fn selection(&self) -> Option<Selection> {
        self.dataname
            .as_ref()
            .map(|name| Selection::new(self.colormap, name.clone(), self.property))
    }

    /// Records `change` and reports what it requires.
    pub fn apply(&mut self, change: ControlChange) -> ControlEffect {
        match change {
            ControlChange::SetColorMap(colormap) => {
                refetch_if_changed(&mut self.colormap, colormap)
            }
            ControlChange::SetDataName(name) => {
                if self.dataname.as_deref() == Some(name.as_str()) {
                    ControlEffect::Unchanged
                } else {
                    self.dataname = Some(name);
                    ControlEffect::Refetch
                }
            }
            ControlChange::SetProperty(property) => {
                refetch_if_changed(&mut self.property, property)
            }
            ControlChange::SetClipOffset(axis, value) => {
                if value.is_nan() {
                    return ControlEffect::Unchanged;
                }
                let clamped = ClippingPlane::new(axis, value).offset();
                live_if_changed(&mut self.clip_offsets[axis.index()], clamped)
            }
            ControlChange::SetPointSize(size) => {
                live_if_changed(&mut self.point_size, clamp_point_size(size))
            }
            ControlChange::SetPointsVisible(visible) => {
                live_if_changed(&mut self.points_visible, visible)
            }
            ControlChange::SetEllipsoidsVisible(visible) => {
                live_if_changed(&mut self.ellipsoids_visible, visible)
            }
        }
    }
}

fn refetch_if_changed<T: PartialEq>(slot: &mut T, value: T) -> ControlEffect {
    if *slot == value {
        ControlEffect::Unchanged
    } else {
        *slot = value;
        ControlEffect::Refetch
    }
}

fn live_if_changed<T: PartialEq>(slot: &mut T, value: T) -> ControlEffect {
    if *slot == value {
        ControlEffect::Unchanged
    } else {
        *slot = value;
        ControlEffect::Live
    }
}
