//! Mouse and keyboard handling.

use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use cloudlens_core::{ClipAxis, ColorMapName, Property};

use crate::controls::{ControlChange, ViewerControls};

use super::App;

/// Radians of queued orbit per pixel of drag.
const ROTATE_SPEED: f32 = 0.005;
/// Zoom per scroll line.
const ZOOM_SPEED: f32 = 0.1;
/// Clip offset change per key press.
const CLIP_STEP: f32 = 10.0;
/// Point size change per key press.
const POINT_SIZE_STEP: f32 = 0.1;

impl App {
    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn handle_input(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { state, button, .. } => match (button, state) {
                (MouseButton::Left, state) => self.left_mouse_down = state.is_pressed(),
                (MouseButton::Right, state) => self.right_mouse_down = state.is_pressed(),
                _ => {}
            },
            WindowEvent::ModifiersChanged(modifiers) => {
                self.shift_down = modifiers.state().shift_key();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let delta_x = (position.x - self.mouse_pos.0) as f32;
                let delta_y = (position.y - self.mouse_pos.1) as f32;
                self.mouse_pos = (position.x, position.y);

                let Some(engine) = &mut self.engine else {
                    return;
                };
                if self.left_mouse_down && !self.shift_down {
                    engine
                        .camera
                        .orbit(delta_x * ROTATE_SPEED, delta_y * ROTATE_SPEED);
                } else if self.right_mouse_down || (self.left_mouse_down && self.shift_down) {
                    let height = engine.height.max(1) as f32;
                    engine.camera.pan(delta_x / height, delta_y / height);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y * ZOOM_SPEED,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 * ZOOM_SPEED * 0.01,
                };
                if let Some(engine) = &mut self.engine {
                    engine.camera.zoom(amount);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.handle_key(*code),
            _ => {}
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Escape => self.close_requested = true,
            KeyCode::KeyF => {
                if let Some(engine) = &mut self.engine {
                    self.renderer.fit_camera(&mut engine.camera);
                }
            }
            _ => {
                let change = key_to_change(
                    code,
                    self.shift_down,
                    self.session.controls(),
                    self.session.data_names(),
                );
                if let Some(change) = change {
                    self.session.apply(change, &mut self.renderer);
                }
            }
        }
    }
}

/// Keyboard bindings for every control.
///
/// - `P`/`E`: toggle points / ellipsoids
/// - `[`/`]`: shrink / grow points
/// - `X`/`Y`/`Z`: move a clipping plane (Shift moves it back)
/// - `Tab`, `M`, `N`: next dataset, colormap, property
pub(crate) fn key_to_change(
    code: KeyCode,
    shift: bool,
    controls: &ViewerControls,
    data_names: &[String],
) -> Option<ControlChange> {
    let clip = |axis: ClipAxis| {
        let step = if shift { -CLIP_STEP } else { CLIP_STEP };
        ControlChange::SetClipOffset(axis, controls.clip_offsets[axis.index()] + step)
    };

    match code {
        KeyCode::KeyP => Some(ControlChange::SetPointsVisible(!controls.points_visible)),
        KeyCode::KeyE => Some(ControlChange::SetEllipsoidsVisible(
            !controls.ellipsoids_visible,
        )),
        KeyCode::BracketLeft => Some(ControlChange::SetPointSize(
            controls.point_size - POINT_SIZE_STEP,
        )),
        KeyCode::BracketRight => Some(ControlChange::SetPointSize(
            controls.point_size + POINT_SIZE_STEP,
        )),
        KeyCode::KeyX => Some(clip(ClipAxis::X)),
        KeyCode::KeyY => Some(clip(ClipAxis::Y)),
        KeyCode::KeyZ => Some(clip(ClipAxis::Z)),
        KeyCode::Tab => {
            let current = controls
                .dataname
                .as_ref()
                .and_then(|name| data_names.iter().position(|n| n == name));
            let next = current.map_or(0, |i| (i + 1) % data_names.len().max(1));
            data_names
                .get(next)
                .map(|name| ControlChange::SetDataName(name.clone()))
        }
        KeyCode::KeyM => {
            let all = ColorMapName::ALL;
            let i = all.iter().position(|c| *c == controls.colormap).unwrap_or(0);
            Some(ControlChange::SetColorMap(all[(i + 1) % all.len()]))
        }
        KeyCode::KeyN => {
            let all = Property::ALL;
            let i = all.iter().position(|p| *p == controls.property).unwrap_or(0);
            Some(ControlChange::SetProperty(all[(i + 1) % all.len()]))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudlens_core::Options;

    fn controls() -> ViewerControls {
        ViewerControls::from_options(&Options::default())
    }

    #[test]
    fn test_clip_keys_step_offsets() {
        let c = controls();
        assert_eq!(
            key_to_change(KeyCode::KeyZ, false, &c, &[]),
            Some(ControlChange::SetClipOffset(ClipAxis::Z, -90.0))
        );
        assert_eq!(
            key_to_change(KeyCode::KeyX, true, &c, &[]),
            Some(ControlChange::SetClipOffset(ClipAxis::X, -110.0))
        );
    }

    #[test]
    fn test_tab_cycles_datasets() {
        let names = vec!["a".to_string(), "b".to_string()];
        let mut c = controls();
        assert_eq!(
            key_to_change(KeyCode::Tab, false, &c, &names),
            Some(ControlChange::SetDataName("a".into()))
        );
        c.dataname = Some("b".into());
        assert_eq!(
            key_to_change(KeyCode::Tab, false, &c, &names),
            Some(ControlChange::SetDataName("a".into()))
        );
        assert_eq!(key_to_change(KeyCode::Tab, false, &c, &[]), None);
    }

    #[test]
    fn test_toggles_and_cycles() {
        let c = controls();
        assert_eq!(
            key_to_change(KeyCode::KeyP, false, &c, &[]),
            Some(ControlChange::SetPointsVisible(false))
        );
        assert_eq!(
            key_to_change(KeyCode::KeyN, false, &c, &[]),
            Some(ControlChange::SetProperty(Property::Shape))
        );
        assert!(matches!(
            key_to_change(KeyCode::KeyM, false, &c, &[]),
            Some(ControlChange::SetColorMap(m)) if m != c.colormap
        ));
        assert_eq!(key_to_change(KeyCode::KeyQ, false, &c, &[]), None);
    }
}
