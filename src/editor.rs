//! The interactive editor
//!
//! Owns the scene, its history, the camera and the selection, and turns
//! pointer events and commands into scene mutations. Every completed edit
//! records a snapshot; undo/redo restore them. Editing is refused while the
//! scene is readonly, but playback and the camera keep working.

use glam::Vec2;

use crate::audio::{Instrument, Mixer, Note, NotePlayer, play_events};
use crate::camera::Camera;
use crate::consts::*;
use crate::history::History;
use crate::input::{self, Gesture, Handle, Modifiers, PointerButton};
use crate::persistence::{ExportError, ImportError, SceneFile, export_file_name};
use crate::settings::Settings;
use crate::sim::{
    BarGeometry, BarShape, EntityId, Item, ItemRecord, Scene, SceneEvent, TickInput, tick,
};
use crate::to_local;

/// Offset applied to each paste so copies don't land on the originals
pub const PASTE_OFFSET: Vec2 = Vec2::new(24.0, 24.0);

/// A ready-to-save export
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub file_name: String,
    pub json: String,
}

pub struct Editor {
    scene: Scene,
    history: History,
    pub camera: Camera,
    selection: Vec<Item>,
    clipboard: Vec<ItemRecord>,
    gesture: Gesture,
    mixer: Mixer,
    /// Fixed timestep accumulator
    accumulator: f32,
    pub paused: bool,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(Scene::default(), Camera::default())
    }
}

impl Editor {
    pub fn new(scene: Scene, camera: Camera) -> Self {
        let history = History::new(scene.snapshot());
        Self {
            scene,
            history,
            camera,
            selection: Vec::new(),
            clipboard: Vec::new(),
            gesture: Gesture::Idle,
            mixer: Mixer::default(),
            accumulator: 0.0,
            paused: false,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection(&self) -> &[Item] {
        &self.selection
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn is_readonly(&self) -> bool {
        self.scene.readonly
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.mixer.set_master_volume(settings.master_volume);
        self.mixer.set_sfx_volume(settings.sfx_volume);
        self.mixer.set_muted(settings.muted);
        self.scene.set_particle_cap(settings.max_particles());
        self.scene.set_trail_length(settings.trail_length());
    }

    // === Frame ===

    /// Advance by wall-clock `dt`, in fixed steps; returns the events produced
    pub fn frame(&mut self, dt: f32) -> Vec<SceneEvent> {
        if self.paused {
            return Vec::new();
        }
        self.accumulator += dt.max(0.0);
        let input = TickInput {
            view: Some(self.camera.visible_bounds()),
        };
        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            tick(&mut self.scene, &input, SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        // Drop the backlog rather than spiral
        if substeps == MAX_SUBSTEPS {
            self.accumulator = self.accumulator.min(SIM_DT);
        }

        let events = self.scene.drain_events();
        for event in &events {
            match event {
                SceneEvent::PlaceholderActivated { placeholder, .. } => {
                    self.forget(Item::Placeholder(*placeholder))
                }
                SceneEvent::BarBroken { bar } => self.forget(Item::Bar(*bar)),
                _ => {}
            }
        }
        events
    }

    /// Sound the notes among `events`
    pub fn play(&self, player: &mut dyn NotePlayer, events: &[SceneEvent]) -> usize {
        play_events(player, &self.mixer, events)
    }

    /// Drop an item that disappeared on its own from selection and gestures
    fn forget(&mut self, item: Item) {
        self.selection.retain(|i| *i != item);
        let stale = match &self.gesture {
            Gesture::Move { items, .. } => items.iter().any(|(i, _)| *i == item),
            Gesture::Resize { bar, .. } | Gesture::Rotate { bar, .. } => item == Item::Bar(*bar),
            _ => false,
        };
        if stale {
            self.gesture = Gesture::Idle;
        }
        self.sync_focus();
    }

    // === Playback ===

    /// Spawn one ball from every spawner
    pub fn spawn_balls(&mut self) -> usize {
        self.scene.spawn_all()
    }

    /// Spawn from every spawner after its configured delay
    pub fn run_sequence(&mut self) -> usize {
        self.scene.schedule_sequence()
    }

    /// Clear balls and particles and return bars to dormant
    pub fn reset_playback(&mut self) {
        self.scene.clear_balls();
        self.scene.clear_particles();
        self.scene.reset_bars();
        self.scene.drain_events();
        self.accumulator = 0.0;
    }

    // === Editing ===

    fn editable(&self) -> bool {
        if self.scene.readonly {
            log::debug!("Scene is readonly, edit refused");
        }
        !self.scene.readonly
    }

    /// Record the current scene as an undo step
    fn commit(&mut self) {
        if self.history.save(self.scene.snapshot()) {
            log::debug!("History: {} entries", self.history.len());
        }
    }

    fn select_only(&mut self, item: Item) {
        self.selection = vec![item];
        self.sync_focus();
    }

    fn sync_focus(&mut self) {
        let focused = match self.selection.as_slice() {
            [Item::Placeholder(id)] => Some(*id),
            _ => None,
        };
        self.scene.focus_placeholder(focused);
    }

    pub fn add_bar(&mut self, pos: Vec2, shape: BarShape) -> Option<EntityId> {
        if !self.editable() {
            return None;
        }
        let geometry = match shape {
            BarShape::Circle => BarGeometry::new(shape, BAR_WIDTH * 0.25, BAR_WIDTH * 0.25),
            BarShape::Triangle => BarGeometry::new(shape, BAR_WIDTH * 0.5, BAR_WIDTH * 0.4),
            BarShape::Curve => {
                BarGeometry::new(shape, BAR_WIDTH, BAR_HEIGHT).with_curvature(0.3, 0.3)
            }
            _ => BarGeometry::new(shape, BAR_WIDTH, BAR_HEIGHT),
        };
        let id = self.scene.add_bar(pos, 0.0, geometry, Note::default());
        self.select_only(Item::Bar(id));
        self.commit();
        Some(id)
    }

    pub fn add_spawner(&mut self, pos: Vec2) -> Option<EntityId> {
        if !self.editable() {
            return None;
        }
        let id = self.scene.add_spawner(pos, BALL_RADIUS, 0)?;
        self.select_only(Item::Spawner(id));
        self.commit();
        Some(id)
    }

    pub fn add_placeholder(&mut self, pos: Vec2) -> Option<EntityId> {
        if !self.editable() {
            return None;
        }
        let id = self.scene.add_placeholder(pos, BALL_RADIUS);
        self.select_only(Item::Placeholder(id));
        self.commit();
        Some(id)
    }

    pub fn delete_selected(&mut self) -> usize {
        if !self.editable() {
            return 0;
        }
        let removed = std::mem::take(&mut self.selection)
            .into_iter()
            .filter(|item| self.scene.remove_item(*item))
            .count();
        self.sync_focus();
        if removed > 0 {
            self.commit();
        }
        removed
    }

    pub fn select(&mut self, item: Item, modifiers: Modifiers) {
        if !self.scene.contains(item) {
            return;
        }
        if modifiers.shift {
            if let Some(i) = self.selection.iter().position(|s| *s == item) {
                self.selection.remove(i);
            } else {
                self.selection.push(item);
            }
            self.sync_focus();
        } else {
            self.select_only(item);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.sync_focus();
    }

    pub fn copy(&mut self) -> usize {
        self.clipboard = self
            .selection
            .iter()
            .filter_map(|item| self.scene.record_of(*item))
            .collect();
        self.clipboard.len()
    }

    /// Paste the clipboard shifted by `PASTE_OFFSET`, keeping relative layout
    pub fn paste(&mut self) -> usize {
        if !self.editable() || self.clipboard.is_empty() {
            return 0;
        }
        self.clipboard = self
            .clipboard
            .iter()
            .map(|r| r.translated(PASTE_OFFSET))
            .collect();
        let pasted: Vec<Item> = self
            .clipboard
            .clone()
            .iter()
            .filter_map(|record| self.scene.insert_record(record))
            .collect();
        if pasted.is_empty() {
            return 0;
        }
        let count = pasted.len();
        self.selection = pasted;
        self.sync_focus();
        self.commit();
        count
    }

    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.undo().cloned() else {
            return false;
        };
        self.scene.restore(&snapshot);
        self.after_restore();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.redo().cloned() else {
            return false;
        };
        self.scene.restore(&snapshot);
        self.after_restore();
        true
    }

    /// Restored entities have new ids
    fn after_restore(&mut self) {
        self.selection.clear();
        self.gesture = Gesture::Idle;
        self.sync_focus();
    }

    pub fn set_gravity(&mut self, gravity: f32) -> bool {
        if !self.editable() || !gravity.is_finite() {
            return false;
        }
        self.scene.set_gravity(gravity);
        self.commit();
        true
    }

    pub fn set_bounce(&mut self, bounce: f32) -> bool {
        if !self.editable() || !bounce.is_finite() {
            return false;
        }
        self.scene.set_bounce(bounce);
        self.commit();
        true
    }

    pub fn set_instrument(&mut self, instrument: Instrument) -> bool {
        if !self.editable() {
            return false;
        }
        self.scene.set_instrument(instrument);
        self.commit();
        true
    }

    fn selected_bars(&self) -> Vec<EntityId> {
        self.selection
            .iter()
            .filter_map(|item| match item {
                Item::Bar(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Apply `edit` to every selected bar and record one undo step
    fn edit_bars(&mut self, mut edit: impl FnMut(&mut Scene, EntityId) -> bool) -> usize {
        if !self.editable() {
            return 0;
        }
        let changed = self
            .selected_bars()
            .into_iter()
            .filter(|id| edit(&mut self.scene, *id))
            .count();
        if changed > 0 {
            self.commit();
        }
        changed
    }

    pub fn set_note(&mut self, note: Note) -> usize {
        self.edit_bars(|scene, id| scene.set_bar_note(id, note))
    }

    pub fn set_bar_instrument(&mut self, instrument: Option<Instrument>) -> usize {
        self.edit_bars(|scene, id| scene.set_bar_instrument(id, instrument))
    }

    pub fn set_max_hits(&mut self, max_hits: Option<u32>) -> usize {
        self.edit_bars(|scene, id| scene.set_bar_max_hits(id, max_hits))
    }

    pub fn set_shape(&mut self, shape: BarShape) -> usize {
        self.edit_bars(|scene, id| {
            let Some(geometry) = scene.bar(id).map(|b| b.geometry) else {
                return false;
            };
            scene.set_bar_geometry(id, BarGeometry { shape, ..geometry }.clamped())
        })
    }

    pub fn set_curvature(&mut self, top: f32, bottom: f32) -> usize {
        self.edit_bars(|scene, id| {
            let Some(geometry) = scene.bar(id).map(|b| b.geometry) else {
                return false;
            };
            scene.set_bar_geometry(id, geometry.with_curvature(top, bottom))
        })
    }

    pub fn set_angle(&mut self, angle: f32) -> usize {
        self.edit_bars(|scene, id| {
            let Some(pos) = scene.bar(id).map(|b| b.pos) else {
                return false;
            };
            scene.set_bar_pose(id, pos, angle)
        })
    }

    pub fn set_spawner_delay(&mut self, delay_ms: u32) -> usize {
        if !self.editable() {
            return 0;
        }
        let ids: Vec<EntityId> = self
            .selection
            .iter()
            .filter_map(|item| match item {
                Item::Spawner(id) => Some(*id),
                _ => None,
            })
            .collect();
        let changed = ids
            .into_iter()
            .filter(|id| self.scene.set_spawner_delay(*id, delay_ms))
            .count();
        if changed > 0 {
            self.commit();
        }
        changed
    }

    // === Import / export ===

    /// Replace the scene with an imported one; the scene is untouched on error
    pub fn import_json(&mut self, text: &str) -> Result<(), ImportError> {
        let file = SceneFile::from_json(text)?;
        self.scene.load_file(&file);
        self.after_restore();
        self.commit();
        if let Some(bounds) = self.scene.content_bounds() {
            self.camera.fit(bounds, BAR_WIDTH * 0.5);
        }
        Ok(())
    }

    /// Serialize the scene under a user-entered title
    pub fn export_json(&mut self, title: &str) -> Result<Export, ExportError> {
        let file_name = export_file_name(title)?;
        self.scene.name = title.trim().to_string();
        let json = self.scene.to_file().to_json_pretty()?;
        log::info!("Exported {file_name} ({} bytes)", json.len());
        Ok(Export { file_name, json })
    }

    // === Pointer ===

    pub fn pointer_down(&mut self, screen: Vec2, button: PointerButton, modifiers: Modifiers) {
        let world = self.camera.screen_to_world(screen);
        if button != PointerButton::Primary || self.scene.readonly {
            self.gesture = Gesture::Pan { last: screen };
            return;
        }

        if let [Item::Bar(id)] = self.selection.as_slice() {
            let id = *id;
            if let Some(bar) = self.scene.bar(id) {
                match input::handle_at(bar, world, self.camera.zoom) {
                    Some(Handle::Resize) => {
                        self.gesture = Gesture::Resize {
                            bar: id,
                            pos: bar.pos,
                            angle: bar.angle,
                            geometry: bar.geometry,
                        };
                        return;
                    }
                    Some(Handle::Rotate) => {
                        self.gesture = Gesture::Rotate { bar: id, pos: bar.pos };
                        return;
                    }
                    None => {}
                }
            }
        }

        match self.scene.pick(world) {
            Some(item) => {
                if modifiers.shift {
                    self.select(item, modifiers);
                } else if !self.selection.contains(&item) {
                    self.select_only(item);
                }
                let items = self
                    .selection
                    .iter()
                    .filter_map(|i| self.scene.item_position(*i).map(|p| (*i, p)))
                    .collect();
                self.gesture = Gesture::Move {
                    grab: world,
                    items,
                    moved: false,
                };
            }
            None if modifiers.shift => {
                self.gesture = Gesture::Marquee {
                    start: world,
                    current: world,
                };
            }
            None => {
                self.clear_selection();
                self.gesture = Gesture::Pan { last: screen };
            }
        }
    }

    pub fn pointer_move(&mut self, screen: Vec2, modifiers: Modifiers) {
        let world = self.camera.screen_to_world(screen);
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Pan { last } => {
                let delta = screen - *last;
                *last = screen;
                self.camera.pan_by(delta);
            }
            Gesture::Move { grab, items, moved } => {
                let delta = world - *grab;
                for (item, start) in items.iter() {
                    self.scene.move_item(*item, *start + delta);
                }
                *moved |= delta != Vec2::ZERO;
            }
            Gesture::Resize {
                bar,
                pos,
                angle,
                geometry,
            } => {
                let local = to_local(world, *pos, *angle);
                self.scene
                    .set_bar_geometry(*bar, input::resized(geometry, local));
            }
            Gesture::Rotate { bar, pos } => {
                let angle = input::drag_angle(*pos, world, modifiers.shift);
                self.scene.set_bar_pose(*bar, *pos, angle);
            }
            Gesture::Marquee { current, .. } => *current = world,
        }
    }

    pub fn pointer_up(&mut self, screen: Vec2, modifiers: Modifiers) {
        self.pointer_move(screen, modifiers);
        let gesture = std::mem::take(&mut self.gesture);
        if let Some(area) = gesture.marquee_bounds() {
            for item in self.scene.items_in(area) {
                if !self.selection.contains(&item) {
                    self.selection.push(item);
                }
            }
            self.sync_focus();
        }
        if gesture.edits_scene() {
            self.commit();
        }
    }

    /// Wheel zoom around the pointer; positive `delta` zooms out
    pub fn wheel(&mut self, screen: Vec2, delta: f32) {
        self.camera.zoom_at(screen, (-delta * 0.001).exp());
    }
}
