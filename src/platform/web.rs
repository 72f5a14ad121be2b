//! Browser bindings
//!
//! The page owns the canvas and the event listeners; it forwards DOM events
//! here and rasterizes the vertex floats returned by `frame`.

use glam::Vec2;
use wasm_bindgen::prelude::*;

use super::{frame_dt, modifiers, pointer_button, wheel_pixels};
use crate::audio::{Instrument, Note, WebSynth};
use crate::camera::Camera;
use crate::editor::Editor;
use crate::renderer::DrawList;
use crate::settings::{QualityPreset, Settings};
use crate::sim::{BarShape, Scene};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    // A second init (hot reload) keeps the first logger
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("Marble Run starting...");
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// One sandbox bound to one canvas
#[wasm_bindgen]
pub struct WebSandbox {
    editor: Editor,
    synth: WebSynth,
    settings: Settings,
    last_time: f64,
    draw: DrawList,
}

#[wasm_bindgen]
impl WebSandbox {
    #[wasm_bindgen(constructor)]
    pub fn new(width: f32, height: f32, seed: u32) -> WebSandbox {
        let settings = Settings::load();
        let mut editor = Editor::new(
            Scene::new(seed as u64),
            Camera::new(Vec2::new(width, height)),
        );
        editor.apply_settings(&settings);
        WebSandbox {
            editor,
            synth: WebSynth::new(),
            settings,
            last_time: 0.0,
            draw: DrawList::default(),
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.editor.camera.resize(Vec2::new(width, height));
    }

    /// Advance to `time_ms` (an animation-frame timestamp), play notes and
    /// return interleaved `[x, y, r, g, b, a]` triangle vertices
    pub fn frame(&mut self, time_ms: f64) -> Vec<f32> {
        let dt = frame_dt(self.last_time, time_ms);
        self.last_time = time_ms;
        let events = self.editor.frame(dt);
        self.editor.play(&mut self.synth, &events);
        self.draw = DrawList::build(&self.editor);
        self.draw.as_floats().to_vec()
    }

    // === Input ===

    pub fn pointer_down(&mut self, x: f32, y: f32, button: i16, shift: bool) {
        self.synth.resume();
        self.editor
            .pointer_down(Vec2::new(x, y), pointer_button(button), modifiers(shift));
    }

    pub fn pointer_move(&mut self, x: f32, y: f32, shift: bool) {
        self.editor.pointer_move(Vec2::new(x, y), modifiers(shift));
    }

    pub fn pointer_up(&mut self, x: f32, y: f32, shift: bool) {
        self.editor.pointer_up(Vec2::new(x, y), modifiers(shift));
    }

    pub fn wheel(&mut self, x: f32, y: f32, delta_y: f64, delta_mode: u32) {
        self.editor
            .wheel(Vec2::new(x, y), wheel_pixels(delta_y, delta_mode));
    }

    // === Playback ===

    pub fn spawn(&mut self) -> usize {
        self.synth.resume();
        self.editor.spawn_balls()
    }

    pub fn run_sequence(&mut self) -> usize {
        self.synth.resume();
        self.editor.run_sequence()
    }

    pub fn reset(&mut self) {
        self.editor.reset_playback();
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.editor.paused = paused;
    }

    // === Editing ===

    /// Add a bar of the named shape at the view center
    pub fn add_bar(&mut self, shape: &str) -> bool {
        let shape = BarShape::from_name(shape).unwrap_or_default();
        let at = self.view_center();
        self.editor.add_bar(at, shape).is_some()
    }

    pub fn add_spawner(&mut self) -> bool {
        let at = self.view_center();
        self.editor.add_spawner(at).is_some()
    }

    pub fn add_placeholder(&mut self) -> bool {
        let at = self.view_center();
        self.editor.add_placeholder(at).is_some()
    }

    pub fn delete_selected(&mut self) -> usize {
        self.editor.delete_selected()
    }

    pub fn copy(&mut self) -> usize {
        self.editor.copy()
    }

    pub fn paste(&mut self) -> usize {
        self.editor.paste()
    }

    pub fn undo(&mut self) -> bool {
        self.editor.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.editor.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.editor.history().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.editor.history().can_redo()
    }

    pub fn set_gravity(&mut self, gravity: f32) -> bool {
        self.editor.set_gravity(gravity)
    }

    pub fn set_bounce(&mut self, bounce: f32) -> bool {
        self.editor.set_bounce(bounce)
    }

    pub fn set_instrument(&mut self, name: &str) -> bool {
        match Instrument::from_name(name) {
            Some(instrument) => self.editor.set_instrument(instrument),
            None => false,
        }
    }

    /// Set the note of every selected bar; unknown names are ignored
    pub fn set_note(&mut self, name: &str) -> usize {
        match Note::parse(name) {
            Some(note) => self.editor.set_note(note),
            None => 0,
        }
    }

    /// Per-bar instrument override; an empty name clears it
    pub fn set_bar_instrument(&mut self, name: &str) -> usize {
        self.editor.set_bar_instrument(Instrument::from_name(name))
    }

    /// Hits before the selected bars break; 0 makes them permanent
    pub fn set_max_hits(&mut self, hits: u32) -> usize {
        self.editor.set_max_hits((hits > 0).then_some(hits))
    }

    pub fn set_shape(&mut self, shape: &str) -> usize {
        match BarShape::from_name(shape) {
            Some(shape) => self.editor.set_shape(shape),
            None => 0,
        }
    }

    pub fn set_curvature(&mut self, top: f32, bottom: f32) -> usize {
        self.editor.set_curvature(top, bottom)
    }

    pub fn set_angle(&mut self, radians: f32) -> usize {
        self.editor.set_angle(radians)
    }

    pub fn set_spawner_delay(&mut self, delay_ms: u32) -> usize {
        self.editor.set_spawner_delay(delay_ms)
    }

    pub fn readonly(&self) -> bool {
        self.editor.is_readonly()
    }

    // === Files ===

    pub fn import_json(&mut self, text: &str) -> Result<(), JsValue> {
        self.editor.import_json(text).map_err(js_error)
    }

    /// Returns `[file_name, json]`
    pub fn export_json(&mut self, title: &str) -> Result<Vec<String>, JsValue> {
        let export = self.editor.export_json(title).map_err(js_error)?;
        Ok(vec![export.file_name, export.json])
    }

    // === Settings ===

    pub fn set_quality(&mut self, name: &str) {
        if let Some(quality) = QualityPreset::from_name(name) {
            self.settings.quality = quality;
            self.apply_settings();
        }
    }

    pub fn set_volume(&mut self, master: f32, sfx: f32) {
        self.settings.master_volume = master.clamp(0.0, 1.0);
        self.settings.sfx_volume = sfx.clamp(0.0, 1.0);
        self.apply_settings();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.settings.muted = muted;
        self.apply_settings();
    }

    pub fn set_trails(&mut self, on: bool) {
        self.settings.trails = on;
        self.apply_settings();
    }

    pub fn set_particles(&mut self, on: bool) {
        self.settings.particles = on;
        self.apply_settings();
    }
}

impl WebSandbox {
    fn view_center(&self) -> Vec2 {
        let view = self.editor.camera.visible_bounds();
        (view.min + view.max) * 0.5
    }

    fn apply_settings(&mut self) {
        self.editor.apply_settings(&self.settings);
        self.settings.save();
    }
}
