//! Platform abstraction layer
//!
//! Maps browser event codes onto editor input. The `web` module wires an
//! `Editor` to a page as a `wasm_bindgen` class.

use crate::input::{Modifiers, PointerButton};

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Longest frame fed to the simulation, in seconds
///
/// Tabs in the background deliver huge gaps between animation frames.
pub const MAX_FRAME_DT: f32 = 0.1;

/// `MouseEvent.button` to editor button (unknown codes act as primary)
pub fn pointer_button(code: i16) -> PointerButton {
    match code {
        1 => PointerButton::Middle,
        2 => PointerButton::Secondary,
        _ => PointerButton::Primary,
    }
}

pub fn modifiers(shift: bool) -> Modifiers {
    Modifiers { shift }
}

/// Milliseconds between two animation-frame timestamps as a clamped step
pub fn frame_dt(last_ms: f64, now_ms: f64) -> f32 {
    if last_ms <= 0.0 || now_ms <= last_ms {
        return 0.0;
    }
    (((now_ms - last_ms) / 1000.0) as f32).min(MAX_FRAME_DT)
}

/// `WheelEvent.deltaY` normalized to pixels
///
/// `delta_mode` 1 is lines, 2 is pages.
pub fn wheel_pixels(delta_y: f64, delta_mode: u32) -> f32 {
    let scale = match delta_mode {
        1 => 16.0,
        2 => 400.0,
        _ => 1.0,
    };
    (delta_y * scale) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_buttons() {
        assert_eq!(pointer_button(0), PointerButton::Primary);
        assert_eq!(pointer_button(1), PointerButton::Middle);
        assert_eq!(pointer_button(2), PointerButton::Secondary);
        assert_eq!(pointer_button(4), PointerButton::Primary);
    }

    #[test]
    fn test_frame_dt_clamped() {
        assert_eq!(frame_dt(0.0, 16.0), 0.0);
        assert_eq!(frame_dt(100.0, 50.0), 0.0);
        assert!((frame_dt(1000.0, 1016.0) - 0.016).abs() < 1e-6);
        assert_eq!(frame_dt(1000.0, 9000.0), MAX_FRAME_DT);
    }

    #[test]
    fn test_wheel_modes() {
        assert_eq!(wheel_pixels(3.0, 0), 3.0);
        assert_eq!(wheel_pixels(3.0, 1), 48.0);
        assert_eq!(wheel_pixels(-1.0, 2), -400.0);
    }
}
