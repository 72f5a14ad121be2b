//! The scene aggregate
//!
//! Owns every entity, the physics world and the body → entity owner table.
//! All mutation goes through methods here so bodies are never leaked and
//! the owner table never points at a dead entity.

use std::collections::HashMap;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use rapier2d::prelude::{ColliderHandle, RigidBodyHandle};

use super::physics::{BarBody, PhysicsWorld};
use super::schedule::DeferredQueue;
use super::state::*;
use crate::audio::{Instrument, Note};
use crate::consts::*;
use crate::history::SceneSnapshot;
use crate::persistence::{BarRecord, PlaceholderRecord, SceneFile, SpawnerRecord};
use crate::to_local;

/// Something that happened during a tick, for audio and UI consumers
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// A ball struck a bar
    NotePlayed {
        bar: EntityId,
        note: Note,
        instrument: Instrument,
        /// 0-1, from the ball's speed
        intensity: f32,
    },
    /// First hit since placement or reset
    BarActivated { bar: EntityId, color: Color },
    /// Bar reached its hit limit and was removed
    BarBroken { bar: EntityId },
    /// Placeholder converted into a live ball
    PlaceholderActivated {
        placeholder: EntityId,
        ball: EntityId,
    },
    BallSpawned {
        ball: EntityId,
        spawner: Option<EntityId>,
    },
    BallDespawned { ball: EntityId },
}

/// An editable scene item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Item {
    Bar(EntityId),
    Spawner(EntityId),
    Placeholder(EntityId),
}

/// Detached copy of an item, used by the clipboard
#[derive(Debug, Clone, PartialEq)]
pub enum ItemRecord {
    Bar(BarRecord),
    Spawner(SpawnerRecord),
    Placeholder(PlaceholderRecord),
}

impl ItemRecord {
    pub fn position(&self) -> Vec2 {
        match self {
            ItemRecord::Bar(r) => Vec2::new(r.x, r.y),
            ItemRecord::Spawner(r) => Vec2::new(r.x, r.y),
            ItemRecord::Placeholder(r) => Vec2::new(r.x, r.y),
        }
    }

    /// Same record moved by `offset`
    pub fn translated(&self, offset: Vec2) -> Self {
        let mut out = self.clone();
        let (x, y) = match &mut out {
            ItemRecord::Bar(r) => (&mut r.x, &mut r.y),
            ItemRecord::Spawner(r) => (&mut r.x, &mut r.y),
            ItemRecord::Placeholder(r) => (&mut r.x, &mut r.y),
        };
        *x += offset.x;
        *y += offset.y;
        out
    }
}

/// Complete scene state
pub struct Scene {
    pub name: String,
    /// Editing commands are refused while set
    pub readonly: bool,
    gravity: f32,
    bounce: f32,
    instrument: Instrument,

    balls: Vec<Ball>,
    bars: Vec<Bar>,
    placeholders: Vec<Placeholder>,
    spawners: Vec<Spawner>,
    particles: Vec<Particle>,

    pub(crate) physics: PhysicsWorld,
    owners: HashMap<RigidBodyHandle, EntityRef>,
    rng: Pcg32,
    queue: DeferredQueue,
    events: Vec<SceneEvent>,

    /// Simulated seconds since creation
    pub(crate) time: f64,
    next_id: EntityId,
    particle_cap: usize,
    trail_length: usize,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(0x5EED)
    }
}

impl Scene {
    /// Empty scene with default parameters; `seed` drives accents and particles
    pub fn new(seed: u64) -> Self {
        Self {
            name: "Untitled".to_string(),
            readonly: false,
            gravity: DEFAULT_GRAVITY,
            bounce: DEFAULT_BOUNCE,
            instrument: Instrument::default(),
            balls: Vec::new(),
            bars: Vec::new(),
            placeholders: Vec::new(),
            spawners: Vec::new(),
            particles: Vec::new(),
            physics: PhysicsWorld::new(DEFAULT_GRAVITY),
            owners: HashMap::new(),
            rng: Pcg32::seed_from_u64(seed),
            queue: DeferredQueue::new(),
            events: Vec::new(),
            time: 0.0,
            next_id: 1,
            particle_cap: MAX_PARTICLES,
            trail_length: TRAIL_LENGTH,
        }
    }

    fn alloc_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- Parameters ---

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    pub fn set_gravity(&mut self, scale: f32) {
        self.gravity = scale;
        self.physics.set_gravity_scale(scale);
    }

    pub fn bounce(&self) -> f32 {
        self.bounce
    }

    /// Set restitution for new and live balls
    pub fn set_bounce(&mut self, bounce: f32) {
        self.bounce = bounce.clamp(0.0, 1.5);
        for ball in &self.balls {
            self.physics.set_restitution(ball.body, self.bounce);
        }
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    pub fn set_instrument(&mut self, instrument: Instrument) {
        self.instrument = instrument;
    }

    pub fn set_particle_cap(&mut self, cap: usize) {
        self.particle_cap = cap.min(MAX_PARTICLES);
        if self.particles.len() > self.particle_cap {
            let excess = self.particles.len() - self.particle_cap;
            self.particles.drain(..excess);
        }
    }

    pub fn set_trail_length(&mut self, len: usize) {
        self.trail_length = len;
        for ball in &mut self.balls {
            ball.trail.truncate(len);
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    // --- Read access ---

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    pub fn spawners(&self) -> &[Spawner] {
        &self.spawners
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn ball(&self, id: EntityId) -> Option<&Ball> {
        self.balls.iter().find(|b| b.id == id)
    }

    pub fn bar(&self, id: EntityId) -> Option<&Bar> {
        self.bars.iter().find(|b| b.id == id)
    }

    pub fn spawner(&self, id: EntityId) -> Option<&Spawner> {
        self.spawners.iter().find(|s| s.id == id)
    }

    pub fn placeholder(&self, id: EntityId) -> Option<&Placeholder> {
        self.placeholders.iter().find(|p| p.id == id)
    }

    pub fn ball_position(&self, id: EntityId) -> Option<Vec2> {
        self.physics.body_position(self.ball(id)?.body)
    }

    pub fn ball_velocity(&self, id: EntityId) -> Option<Vec2> {
        self.physics.body_velocity(self.ball(id)?.body)
    }

    /// Current pose of a bar (seesaw planks report their live angle)
    pub fn bar_pose(&self, id: EntityId) -> Option<(Vec2, f32)> {
        let bar = self.bar(id)?;
        if bar.is_seesaw() {
            let plank = bar.body.primary();
            let pos = self.physics.body_position(plank).unwrap_or(bar.pos);
            let angle = self.physics.body_angle(plank).unwrap_or(bar.angle);
            Some((pos, angle))
        } else {
            Some((bar.pos, bar.angle))
        }
    }

    /// Live balls emitted by a spawner
    pub fn live_balls_for(&self, spawner: EntityId) -> usize {
        self.balls
            .iter()
            .filter(|b| b.spawner == Some(spawner))
            .count()
    }

    pub fn body_count(&self) -> usize {
        self.physics.body_count()
    }

    pub fn collider_count(&self) -> usize {
        self.physics.collider_count()
    }

    pub fn joint_count(&self) -> usize {
        self.physics.joint_count()
    }

    /// Take the events produced since the last call
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Balls ---

    /// Emit a ball from a spawner; refused once it has its quota of live balls
    pub fn spawn_ball(&mut self, spawner: EntityId) -> Option<EntityId> {
        let (pos, radius) = {
            let s = self.spawner(spawner)?;
            (s.pos, s.radius)
        };
        if self.live_balls_for(spawner) >= MAX_BALLS_PER_SPAWNER {
            log::debug!("Spawner {spawner} at its ball limit, spawn refused");
            return None;
        }
        Some(self.insert_ball(pos, radius, palette::BALL, Some(spawner)))
    }

    /// Emit one ball from every spawner; returns how many were created
    pub fn spawn_all(&mut self) -> usize {
        let ids: Vec<EntityId> = self.spawners.iter().map(|s| s.id).collect();
        ids.into_iter()
            .filter_map(|id| self.spawn_ball(id))
            .count()
    }

    pub(crate) fn insert_ball(
        &mut self,
        pos: Vec2,
        radius: f32,
        color: Color,
        spawner: Option<EntityId>,
    ) -> EntityId {
        let id = self.alloc_id();
        let body = self.physics.create_ball(pos, radius, self.bounce);
        self.owners.insert(body, EntityRef::Ball(id));
        self.balls.push(Ball::new(id, body, radius, color, spawner));
        self.events.push(SceneEvent::BallSpawned { ball: id, spawner });
        id
    }

    pub fn remove_ball(&mut self, id: EntityId) -> bool {
        let Some(index) = self.balls.iter().position(|b| b.id == id) else {
            return false;
        };
        let ball = self.balls.remove(index);
        self.release_ball(ball);
        true
    }

    fn release_ball(&mut self, ball: Ball) {
        self.owners.remove(&ball.body);
        self.physics.remove_body(ball.body);
        self.events.push(SceneEvent::BallDespawned { ball: ball.id });
    }

    pub fn clear_balls(&mut self) {
        for ball in std::mem::take(&mut self.balls) {
            self.release_ball(ball);
        }
    }

    /// Drop balls whose centers fail `keep`
    pub(crate) fn cull_balls(&mut self, keep: impl Fn(Vec2) -> bool) -> usize {
        let doomed: Vec<EntityId> = self
            .balls
            .iter()
            .filter(|b| {
                self.physics
                    .body_position(b.body)
                    .is_none_or(|pos| !keep(pos))
            })
            .map(|b| b.id)
            .collect();
        for id in &doomed {
            self.remove_ball(*id);
        }
        doomed.len()
    }

    pub(crate) fn recolor_ball(&mut self, id: EntityId, color: Color) {
        if let Some(ball) = self.balls.iter_mut().find(|b| b.id == id) {
            ball.color = color;
        }
    }

    /// Append the current position of every ball to its trail
    pub(crate) fn record_trails(&mut self) {
        let len = self.trail_length;
        for ball in &mut self.balls {
            if len == 0 {
                ball.clear_trail();
                continue;
            }
            let Some(pos) = self.physics.body_position(ball.body) else {
                continue;
            };
            let speed = self
                .physics
                .body_velocity(ball.body)
                .map_or(0.0, |v| v.length());
            ball.record_trail(pos, speed, len);
        }
    }

    // --- Bars ---

    pub fn add_bar(&mut self, pos: Vec2, angle: f32, geometry: BarGeometry, note: Note) -> EntityId {
        let id = self.alloc_id();
        let geometry = geometry.clamped();
        let body = BarBody::build(&mut self.physics, pos, angle, &geometry);
        self.owners.insert(body.primary(), EntityRef::Bar(id));
        self.bars.push(Bar {
            id,
            pos,
            angle,
            geometry,
            note,
            instrument: None,
            max_hits: None,
            hits: 0,
            state: BarState::Dormant,
            glow: 0.0,
            body,
        });
        id
    }

    pub fn add_bar_record(&mut self, record: &BarRecord) -> EntityId {
        let geometry = BarGeometry::new(record.shape, record.w, record.h)
            .with_curvature(record.curvature_top, record.curvature_bottom);
        let id = self.add_bar(
            Vec2::new(record.x, record.y),
            record.angle,
            geometry,
            record.note,
        );
        if let Some(bar) = self.bar_mut(id) {
            bar.instrument = record.instrument;
            bar.max_hits = record.max_hits.filter(|n| *n > 0);
        }
        id
    }

    fn bar_mut(&mut self, id: EntityId) -> Option<&mut Bar> {
        self.bars.iter_mut().find(|b| b.id == id)
    }

    pub fn remove_bar(&mut self, id: EntityId) -> bool {
        let Some(index) = self.bars.iter().position(|b| b.id == id) else {
            return false;
        };
        let bar = self.bars.remove(index);
        self.release_bar(bar);
        true
    }

    fn release_bar(&mut self, bar: Bar) {
        self.owners.remove(&bar.body.primary());
        bar.body.release(&mut self.physics);
    }

    /// Replace a bar's bodies after a geometry or pivot change
    fn rebuild_bar(&mut self, index: usize) {
        let (pos, angle, geometry) = {
            let bar = &self.bars[index];
            (bar.pos, bar.angle, bar.geometry)
        };
        let fresh = BarBody::build(&mut self.physics, pos, angle, &geometry);
        self.owners.insert(fresh.primary(), EntityRef::Bar(self.bars[index].id));
        let old = std::mem::replace(&mut self.bars[index].body, fresh);
        self.owners.remove(&old.primary());
        old.release(&mut self.physics);
    }

    pub fn set_bar_geometry(&mut self, id: EntityId, geometry: BarGeometry) -> bool {
        let Some(index) = self.bars.iter().position(|b| b.id == id) else {
            return false;
        };
        let geometry = geometry.clamped();
        if self.bars[index].geometry == geometry {
            return true;
        }
        self.bars[index].geometry = geometry;
        self.rebuild_bar(index);
        true
    }

    pub fn set_bar_pose(&mut self, id: EntityId, pos: Vec2, angle: f32) -> bool {
        let Some(index) = self.bars.iter().position(|b| b.id == id) else {
            return false;
        };
        let bar = &mut self.bars[index];
        bar.pos = pos;
        bar.angle = angle;
        let solid = match &bar.body {
            BarBody::Solid(handle) => Some(*handle),
            BarBody::Seesaw(_) => None,
        };
        match solid {
            Some(handle) => self.physics.set_body_pose(handle, pos, angle),
            // The anchor is fixed, so the whole rig moves
            None => self.rebuild_bar(index),
        }
        true
    }

    pub fn set_bar_note(&mut self, id: EntityId, note: Note) -> bool {
        self.bar_mut(id).map(|b| b.note = note).is_some()
    }

    pub fn set_bar_instrument(&mut self, id: EntityId, instrument: Option<Instrument>) -> bool {
        self.bar_mut(id).map(|b| b.instrument = instrument).is_some()
    }

    pub fn set_bar_max_hits(&mut self, id: EntityId, max_hits: Option<u32>) -> bool {
        self.bar_mut(id)
            .map(|b| b.max_hits = max_hits.filter(|n| *n > 0))
            .is_some()
    }

    /// Every bar back to dormant; seesaw planks return to rest
    pub fn reset_bars(&mut self) {
        for bar in &mut self.bars {
            bar.reset();
            if let BarBody::Seesaw(rig) = &bar.body {
                self.physics.set_body_pose(rig.plank(), bar.pos, bar.angle);
                self.physics.stop_body(rig.plank());
            }
        }
    }

    /// Register a ball striking a bar at `point`
    pub(crate) fn hit_bar(&mut self, bar_id: EntityId, ball_id: EntityId, point: Vec2) {
        let speed = self.ball_velocity(ball_id).map_or(0.0, |v| v.length());
        let scene_instrument = self.instrument;
        let Some(index) = self.bars.iter().position(|b| b.id == bar_id) else {
            return;
        };
        let bar = &mut self.bars[index];
        let was_dormant = !bar.is_activated();
        let color = bar.hit(&mut self.rng);
        let note = bar.note;
        let instrument = bar.instrument.unwrap_or(scene_instrument);
        let spent = bar.is_spent();

        if was_dormant {
            self.events.push(SceneEvent::BarActivated { bar: bar_id, color });
        }
        self.events.push(SceneEvent::NotePlayed {
            bar: bar_id,
            note,
            instrument,
            intensity: hit_intensity(speed),
        });
        log::debug!("Ball {ball_id} hit bar {bar_id}: {note} on {}", instrument.as_str());

        self.recolor_ball(ball_id, color);
        self.emit_burst(point, color, HIT_BURST);

        if spent {
            let bar = self.bars.remove(index);
            self.release_bar(bar);
            self.events.push(SceneEvent::BarBroken { bar: bar_id });
        }
    }

    pub(crate) fn decay_glows(&mut self, dt: f32) {
        for bar in &mut self.bars {
            bar.decay_glow(dt);
        }
    }

    /// Push each seesaw plank back toward its rest angle
    pub(crate) fn apply_seesaw_torque(&mut self, dt: f32) {
        for bar in &self.bars {
            let BarBody::Seesaw(rig) = &bar.body else {
                continue;
            };
            let Some(angle) = self.physics.body_angle(rig.plank()) else {
                continue;
            };
            let deviation = crate::normalize_angle(angle - bar.angle);
            self.physics
                .apply_torque_impulse(rig.plank(), -deviation * SEESAW_STIFFNESS * dt);
        }
    }

    // --- Spawners ---

    /// Add a spawner; refused beyond the per-scene limit
    pub fn add_spawner(&mut self, pos: Vec2, radius: f32, delay_ms: u32) -> Option<EntityId> {
        if self.spawners.len() >= MAX_SPAWNERS {
            log::debug!("Scene already has {MAX_SPAWNERS} spawners, add refused");
            return None;
        }
        let id = self.alloc_id();
        self.spawners.push(Spawner {
            id,
            pos,
            radius: radius.max(1.0),
            delay_ms,
        });
        Some(id)
    }

    pub fn remove_spawner(&mut self, id: EntityId) -> bool {
        let before = self.spawners.len();
        self.spawners.retain(|s| s.id != id);
        self.spawners.len() != before
    }

    pub fn set_spawner_delay(&mut self, id: EntityId, delay_ms: u32) -> bool {
        self.spawners
            .iter_mut()
            .find(|s| s.id == id)
            .map(|s| s.delay_ms = delay_ms)
            .is_some()
    }

    /// Queue one spawn per spawner after its delay
    pub fn schedule_sequence(&mut self) -> usize {
        for spawner in &self.spawners {
            let due = self.time + f64::from(spawner.delay_ms) / 1000.0;
            self.queue.schedule(due, spawner.id);
        }
        log::info!("Scheduled spawn sequence for {} spawners", self.spawners.len());
        self.spawners.len()
    }

    /// Fire queued spawns that are due
    pub(crate) fn run_due_spawns(&mut self) {
        for spawner in self.queue.pop_due(self.time) {
            self.spawn_ball(spawner);
        }
    }

    pub fn pending_spawns(&self) -> usize {
        self.queue.len()
    }

    // --- Placeholders ---

    pub fn add_placeholder(&mut self, pos: Vec2, radius: f32) -> EntityId {
        let id = self.alloc_id();
        let radius = radius.max(1.0);
        let sensor = self.physics.create_sensor(pos, radius);
        self.owners.insert(sensor, EntityRef::Placeholder(id));
        self.placeholders.push(Placeholder {
            id,
            pos,
            radius,
            focused: false,
            sensor,
        });
        id
    }

    pub fn remove_placeholder(&mut self, id: EntityId) -> bool {
        let Some(index) = self.placeholders.iter().position(|p| p.id == id) else {
            return false;
        };
        let placeholder = self.placeholders.swap_remove(index);
        self.owners.remove(&placeholder.sensor);
        self.physics.remove_body(placeholder.sensor);
        true
    }

    /// Mark one placeholder as focused (or none)
    pub fn focus_placeholder(&mut self, id: Option<EntityId>) {
        for p in &mut self.placeholders {
            p.focused = Some(p.id) == id;
        }
    }

    /// First placeholder (list order) within reach of a ball at `point`;
    /// touching counts
    pub(crate) fn placeholder_near(&self, point: Vec2, ball_radius: f32) -> Option<usize> {
        self.placeholders.iter().position(|p| {
            p.pos.distance(point) <= p.radius + ball_radius + PLACEHOLDER_REACH_SLACK
        })
    }

    /// Turn a placeholder into a live ball of the given color
    pub(crate) fn activate_placeholder(&mut self, index: usize, color: Color) -> Option<EntityId> {
        if index >= self.placeholders.len() {
            return None;
        }
        let placeholder = self.placeholders.swap_remove(index);
        self.owners.remove(&placeholder.sensor);
        self.physics.remove_body(placeholder.sensor);

        let ball = self.insert_ball(placeholder.pos, placeholder.radius, color, None);
        self.events.push(SceneEvent::PlaceholderActivated {
            placeholder: placeholder.id,
            ball,
        });
        self.emit_burst(placeholder.pos, color, PLACEHOLDER_BURST);
        log::debug!("Placeholder {} woke up as ball {ball}", placeholder.id);
        Some(ball)
    }

    // --- Items ---

    pub fn contains(&self, item: Item) -> bool {
        match item {
            Item::Bar(id) => self.bar(id).is_some(),
            Item::Spawner(id) => self.spawner(id).is_some(),
            Item::Placeholder(id) => self.placeholder(id).is_some(),
        }
    }

    pub fn item_position(&self, item: Item) -> Option<Vec2> {
        match item {
            Item::Bar(id) => self.bar(id).map(|b| b.pos),
            Item::Spawner(id) => self.spawner(id).map(|s| s.pos),
            Item::Placeholder(id) => self.placeholder(id).map(|p| p.pos),
        }
    }

    pub fn move_item(&mut self, item: Item, pos: Vec2) -> bool {
        match item {
            Item::Bar(id) => {
                let Some(angle) = self.bar(id).map(|b| b.angle) else {
                    return false;
                };
                self.set_bar_pose(id, pos, angle)
            }
            Item::Spawner(id) => self
                .spawners
                .iter_mut()
                .find(|s| s.id == id)
                .map(|s| s.pos = pos)
                .is_some(),
            Item::Placeholder(id) => {
                let Some(p) = self.placeholders.iter_mut().find(|p| p.id == id) else {
                    return false;
                };
                p.pos = pos;
                let sensor = p.sensor;
                self.physics.set_body_pose(sensor, pos, 0.0);
                true
            }
        }
    }

    pub fn remove_item(&mut self, item: Item) -> bool {
        match item {
            Item::Bar(id) => self.remove_bar(id),
            Item::Spawner(id) => self.remove_spawner(id),
            Item::Placeholder(id) => self.remove_placeholder(id),
        }
    }

    /// Topmost item under a world point: spawners, then placeholders, then bars
    pub fn pick(&self, point: Vec2) -> Option<Item> {
        if let Some(s) = self
            .spawners
            .iter()
            .rev()
            .find(|s| s.pos.distance(point) <= s.radius.max(BALL_RADIUS) * 1.5)
        {
            return Some(Item::Spawner(s.id));
        }
        if let Some(p) = self
            .placeholders
            .iter()
            .rev()
            .find(|p| p.pos.distance(point) <= p.radius)
        {
            return Some(Item::Placeholder(p.id));
        }
        self.bars
            .iter()
            .rev()
            .find(|b| {
                let (pos, angle) = self.bar_pose(b.id).unwrap_or((b.pos, b.angle));
                b.geometry.contains_local(to_local(point, pos, angle))
            })
            .map(|b| Item::Bar(b.id))
    }

    /// Items whose anchor lies inside a world rectangle
    pub fn items_in(&self, area: Bounds) -> Vec<Item> {
        let bars = self
            .bars
            .iter()
            .filter(|b| area.contains(b.pos))
            .map(|b| Item::Bar(b.id));
        let spawners = self
            .spawners
            .iter()
            .filter(|s| area.contains(s.pos))
            .map(|s| Item::Spawner(s.id));
        let placeholders = self
            .placeholders
            .iter()
            .filter(|p| area.contains(p.pos))
            .map(|p| Item::Placeholder(p.id));
        bars.chain(spawners).chain(placeholders).collect()
    }

    pub fn record_of(&self, item: Item) -> Option<ItemRecord> {
        match item {
            Item::Bar(id) => self.bar(id).map(|b| ItemRecord::Bar(bar_record(b))),
            Item::Spawner(id) => self.spawner(id).map(|s| ItemRecord::Spawner(spawner_record(s))),
            Item::Placeholder(id) => self
                .placeholder(id)
                .map(|p| ItemRecord::Placeholder(placeholder_record(p))),
        }
    }

    /// Recreate an item from a record; spawners respect the scene limit
    pub fn insert_record(&mut self, record: &ItemRecord) -> Option<Item> {
        match record {
            ItemRecord::Bar(r) => Some(Item::Bar(self.add_bar_record(r))),
            ItemRecord::Spawner(r) => self
                .add_spawner(Vec2::new(r.x, r.y), r.r, r.delay)
                .map(Item::Spawner),
            ItemRecord::Placeholder(r) => {
                Some(Item::Placeholder(self.add_placeholder(Vec2::new(r.x, r.y), r.r)))
            }
        }
    }

    // --- Collision plumbing ---

    /// Collider → owning body → logical entity
    pub(crate) fn resolve_collider(&self, collider: ColliderHandle) -> Option<EntityRef> {
        let body = self.physics.collider_parent(collider)?;
        self.owners.get(&body).copied()
    }

    /// World position of an entity's body
    pub(crate) fn entity_position(&self, entity: EntityRef) -> Option<Vec2> {
        match entity {
            EntityRef::Ball(id) => self.ball_position(id),
            EntityRef::Bar(id) => self.bar_pose(id).map(|(pos, _)| pos),
            EntityRef::Placeholder(id) => self.placeholder(id).map(|p| p.pos),
        }
    }

    // --- Particles ---

    /// Scatter `count` particles from `pos`, evicting the oldest when full
    pub(crate) fn emit_burst(&mut self, pos: Vec2, color: Color, count: usize) {
        if self.particle_cap == 0 {
            return;
        }
        for _ in 0..count {
            if self.particles.len() >= self.particle_cap {
                self.particles.remove(0);
            }
            let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
            let speed = self.rng.random_range(60.0..220.0);
            let size = self.rng.random_range(2.0..4.5);
            self.particles.push(Particle {
                pos,
                vel: Vec2::from_angle(angle) * speed,
                color,
                life: 1.0,
                size,
            });
        }
    }

    pub fn clear_particles(&mut self) {
        self.particles.clear();
    }

    pub(crate) fn update_particles(&mut self, dt: f32) {
        for particle in self.particles.iter_mut() {
            particle.pos += particle.vel * dt;
            particle.vel.y += 300.0 * dt;
            particle.vel *= 0.98;
            particle.life -= dt * 1.5; // ~0.67 second lifetime
            particle.size *= 0.995;
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    // --- Whole-scene state ---

    /// Bounds of everything placed (bars, spawners, placeholders)
    pub fn content_bounds(&self) -> Option<Bounds> {
        let mut points = self
            .bars
            .iter()
            .flat_map(|b| {
                let r = b.geometry.half_extents().length();
                [b.pos - Vec2::splat(r), b.pos + Vec2::splat(r)]
            })
            .chain(self.spawners.iter().map(|s| s.pos))
            .chain(self.placeholders.iter().map(|p| p.pos));
        let first = points.next()?;
        Some(points.fold(Bounds::new(first, first), |b, p| b.include(p)))
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            name: self.name.clone(),
            readonly: self.readonly,
            gravity: self.gravity,
            bounce: self.bounce,
            instrument: self.instrument,
            spawners: self.spawners.iter().map(spawner_record).collect(),
            placeholders: self.placeholders.iter().map(placeholder_record).collect(),
            bars: self.bars.iter().map(bar_record).collect(),
        }
    }

    /// Replace bars, spawners, placeholders, name and readonly with a snapshot's
    ///
    /// Live balls keep flying; restored bars start dormant.
    pub fn restore(&mut self, snapshot: &SceneSnapshot) {
        for bar in std::mem::take(&mut self.bars) {
            self.release_bar(bar);
        }
        for placeholder in std::mem::take(&mut self.placeholders) {
            self.owners.remove(&placeholder.sensor);
            self.physics.remove_body(placeholder.sensor);
        }
        self.spawners.clear();

        self.name = snapshot.name.clone();
        self.readonly = snapshot.readonly;
        self.set_gravity(snapshot.gravity);
        self.set_bounce(snapshot.bounce);
        self.instrument = snapshot.instrument;
        for record in snapshot.spawners.iter().take(MAX_SPAWNERS) {
            self.add_spawner(Vec2::new(record.x, record.y), record.r, record.delay);
        }
        for record in &snapshot.placeholders {
            self.add_placeholder(Vec2::new(record.x, record.y), record.r);
        }
        for record in &snapshot.bars {
            self.add_bar_record(record);
        }
    }

    /// Replace the whole scene with an imported file
    pub fn load_file(&mut self, file: &SceneFile) {
        self.clear_balls();
        self.clear_particles();
        self.restore(&SceneSnapshot::from(file));
        log::info!(
            "Loaded scene {:?} ({} bars, {} spawners)",
            self.name,
            self.bars.len(),
            self.spawners.len()
        );
    }

    pub fn to_file(&self) -> SceneFile {
        let snapshot = self.snapshot();
        SceneFile {
            name: snapshot.name,
            readonly: snapshot.readonly,
            gravity: snapshot.gravity,
            bounce: snapshot.bounce,
            instrument: snapshot.instrument,
            spawners: snapshot.spawners,
            placeholders: snapshot.placeholders,
            bars: snapshot.bars,
        }
    }
}

/// Louder notes for faster balls
fn hit_intensity(speed: f32) -> f32 {
    (speed / 500.0).clamp(0.25, 1.0)
}

fn bar_record(bar: &Bar) -> BarRecord {
    BarRecord {
        x: bar.pos.x,
        y: bar.pos.y,
        w: bar.geometry.width,
        h: bar.geometry.height,
        angle: bar.angle,
        note: bar.note,
        shape: bar.geometry.shape,
        instrument: bar.instrument,
        curvature_top: bar.geometry.curvature_top,
        curvature_bottom: bar.geometry.curvature_bottom,
        max_hits: bar.max_hits,
    }
}

fn spawner_record(spawner: &Spawner) -> SpawnerRecord {
    SpawnerRecord {
        x: spawner.pos.x,
        y: spawner.pos.y,
        r: spawner.radius,
        delay: spawner.delay_ms,
    }
}

fn placeholder_record(placeholder: &Placeholder) -> PlaceholderRecord {
    PlaceholderRecord {
        x: placeholder.pos.x,
        y: placeholder.pos.y,
        r: placeholder.radius,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_spawner() -> (Scene, EntityId) {
        let mut scene = Scene::default();
        let spawner = scene.add_spawner(Vec2::ZERO, BALL_RADIUS, 0).unwrap();
        (scene, spawner)
    }

    #[test]
    fn test_spawner_ball_limit() {
        let (mut scene, spawner) = scene_with_spawner();
        for _ in 0..MAX_BALLS_PER_SPAWNER {
            assert!(scene.spawn_ball(spawner).is_some());
        }
        assert!(scene.spawn_ball(spawner).is_none());
        assert_eq!(scene.balls().len(), MAX_BALLS_PER_SPAWNER);
    }

    #[test]
    fn test_spawner_limit() {
        let mut scene = Scene::default();
        for i in 0..MAX_SPAWNERS {
            assert!(scene.add_spawner(Vec2::new(i as f32, 0.0), 10.0, 0).is_some());
        }
        assert!(scene.add_spawner(Vec2::ZERO, 10.0, 0).is_none());
        assert_eq!(scene.spawners().len(), MAX_SPAWNERS);
    }

    #[test]
    fn test_removals_release_bodies() {
        let mut scene = Scene::default();
        let baseline = (scene.body_count(), scene.collider_count(), scene.joint_count());

        let solid = scene.add_bar(Vec2::ZERO, 0.0, BarGeometry::default(), Note::default());
        let seesaw = scene.add_bar(
            Vec2::new(0.0, 200.0),
            0.2,
            BarGeometry::new(BarShape::Seesaw, 200.0, 12.0),
            Note::default(),
        );
        let curve = scene.add_bar(
            Vec2::new(300.0, 0.0),
            0.0,
            BarGeometry::new(BarShape::Curve, 200.0, 16.0).with_curvature(0.5, 0.5),
            Note::default(),
        );
        let placeholder = scene.add_placeholder(Vec2::new(0.0, -100.0), 10.0);
        let spawner = scene.add_spawner(Vec2::ZERO, 10.0, 0).unwrap();
        let ball = scene.spawn_ball(spawner).unwrap();
        assert_eq!(scene.joint_count(), 1);

        assert!(scene.remove_bar(solid));
        assert!(scene.remove_bar(seesaw));
        assert!(scene.remove_bar(curve));
        assert!(scene.remove_placeholder(placeholder));
        assert!(scene.remove_ball(ball));
        assert_eq!(
            (scene.body_count(), scene.collider_count(), scene.joint_count()),
            baseline
        );
        assert!(scene.owners.is_empty());
    }

    #[test]
    fn test_geometry_change_replaces_body() {
        let mut scene = Scene::default();
        let id = scene.add_bar(Vec2::ZERO, 0.0, BarGeometry::default(), Note::default());
        let before = scene.body_count();
        let old = scene.bar(id).unwrap().body.primary();

        scene.set_bar_geometry(id, BarGeometry::new(BarShape::Seesaw, 120.0, 12.0));
        assert_eq!(scene.body_count(), before + 1); // plank + anchor
        let new = scene.bar(id).unwrap().body.primary();
        assert_ne!(old, new);
        assert_eq!(scene.owners.get(&new), Some(&EntityRef::Bar(id)));
        assert!(!scene.owners.contains_key(&old));

        scene.set_bar_geometry(id, BarGeometry::new(BarShape::Circle, 40.0, 40.0));
        assert_eq!(scene.body_count(), before);
        assert_eq!(scene.joint_count(), 0);
    }

    #[test]
    fn test_bar_hit_activates_once() {
        let (mut scene, spawner) = scene_with_spawner();
        let bar = scene.add_bar(Vec2::new(0.0, 100.0), 0.0, BarGeometry::default(), Note::default());
        let ball = scene.spawn_ball(spawner).unwrap();
        scene.drain_events();

        scene.hit_bar(bar, ball, Vec2::new(0.0, 90.0));
        let first = scene.bar(bar).unwrap().color();
        scene.hit_bar(bar, ball, Vec2::new(0.0, 90.0));
        assert_eq!(scene.bar(bar).unwrap().color(), first);
        assert_eq!(scene.ball(ball).unwrap().color, first);
        assert_eq!(scene.bar(bar).unwrap().hits, 2);

        let events = scene.drain_events();
        let activations = events
            .iter()
            .filter(|e| matches!(e, SceneEvent::BarActivated { .. }))
            .count();
        let notes = events
            .iter()
            .filter(|e| matches!(e, SceneEvent::NotePlayed { .. }))
            .count();
        assert_eq!(activations, 1);
        assert_eq!(notes, 2);
    }

    #[test]
    fn test_bar_instrument_override() {
        let (mut scene, spawner) = scene_with_spawner();
        scene.set_instrument(Instrument::Piano);
        let bar = scene.add_bar(Vec2::ZERO, 0.0, BarGeometry::default(), Note::default());
        let ball = scene.spawn_ball(spawner).unwrap();

        scene.hit_bar(bar, ball, Vec2::ZERO);
        scene.set_bar_instrument(bar, Some(Instrument::Bell));
        scene.hit_bar(bar, ball, Vec2::ZERO);

        let instruments: Vec<Instrument> = scene
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                SceneEvent::NotePlayed { instrument, .. } => Some(instrument),
                _ => None,
            })
            .collect();
        assert_eq!(instruments, vec![Instrument::Piano, Instrument::Bell]);
    }

    #[test]
    fn test_max_hits_breaks_bar() {
        let (mut scene, spawner) = scene_with_spawner();
        let bar = scene.add_bar(Vec2::ZERO, 0.0, BarGeometry::default(), Note::default());
        scene.set_bar_max_hits(bar, Some(2));
        let ball = scene.spawn_ball(spawner).unwrap();
        let bodies = scene.body_count();

        scene.hit_bar(bar, ball, Vec2::ZERO);
        assert!(scene.bar(bar).is_some());
        scene.hit_bar(bar, ball, Vec2::ZERO);
        assert!(scene.bar(bar).is_none());
        assert_eq!(scene.body_count(), bodies - 1);
        assert!(scene
            .drain_events()
            .contains(&SceneEvent::BarBroken { bar }));
    }

    #[test]
    fn test_reset_bars() {
        let (mut scene, spawner) = scene_with_spawner();
        let bar = scene.add_bar(Vec2::ZERO, 0.0, BarGeometry::default(), Note::default());
        let ball = scene.spawn_ball(spawner).unwrap();
        scene.hit_bar(bar, ball, Vec2::ZERO);
        let bodies = scene.body_count();

        scene.reset_bars();
        let b = scene.bar(bar).unwrap();
        assert_eq!(b.state, BarState::Dormant);
        assert_eq!(b.glow, 0.0);
        assert_eq!(b.hits, 0);
        assert_eq!(scene.body_count(), bodies);
    }

    #[test]
    fn test_placeholder_activation_is_one_shot() {
        let mut scene = Scene::default();
        let p = scene.add_placeholder(Vec2::new(50.0, 50.0), 12.0);
        let index = scene.placeholder_near(Vec2::new(55.0, 50.0), 10.0).unwrap();

        let color = palette::ACCENTS[2];
        let ball = scene.activate_placeholder(index, color).unwrap();
        assert!(scene.placeholder(p).is_none());
        let b = scene.ball(ball).unwrap();
        assert_eq!(b.color, color);
        assert_eq!(b.radius, 12.0);
        assert_eq!(b.spawner, None);
        assert_eq!(scene.ball_position(ball), Some(Vec2::new(50.0, 50.0)));

        assert!(scene.placeholder_near(Vec2::new(55.0, 50.0), 10.0).is_none());
        assert!(scene.activate_placeholder(index, color).is_none());
        assert_eq!(scene.balls().len(), 1);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut scene = Scene::default();
        scene.set_gravity(1.5);
        scene.add_spawner(Vec2::new(10.0, 0.0), 8.0, 250);
        scene.add_placeholder(Vec2::new(0.0, 40.0), 10.0);
        let bar = scene.add_bar(
            Vec2::new(0.0, 120.0),
            0.3,
            BarGeometry::new(BarShape::Triangle, 80.0, 40.0),
            Note::parse("E5").unwrap(),
        );
        scene.set_bar_max_hits(bar, Some(4));
        let snapshot = scene.snapshot();

        let mut other = Scene::new(7);
        other.restore(&snapshot);
        assert_eq!(other.snapshot(), snapshot);
        assert_eq!(other.gravity(), 1.5);

        // Restoring twice leaves no stray bodies
        let bodies = other.body_count();
        other.restore(&snapshot);
        assert_eq!(other.body_count(), bodies);
    }

    #[test]
    fn test_pick_prefers_spawner_over_bar() {
        let mut scene = Scene::default();
        let bar = scene.add_bar(Vec2::ZERO, 0.0, BarGeometry::default(), Note::default());
        let spawner = scene.add_spawner(Vec2::new(60.0, 0.0), 10.0, 0).unwrap();
        assert_eq!(scene.pick(Vec2::new(60.0, 2.0)), Some(Item::Spawner(spawner)));
        assert_eq!(scene.pick(Vec2::new(-60.0, 2.0)), Some(Item::Bar(bar)));
        assert_eq!(scene.pick(Vec2::new(0.0, 300.0)), None);
    }

    #[test]
    fn test_particle_cap() {
        let mut scene = Scene::default();
        scene.set_particle_cap(10);
        scene.emit_burst(Vec2::ZERO, palette::BALL, 25);
        assert_eq!(scene.particles().len(), 10);
        scene.set_particle_cap(0);
        assert!(scene.particles().is_empty());
    }

    #[test]
    fn test_content_bounds() {
        let mut scene = Scene::default();
        assert!(scene.content_bounds().is_none());
        scene.add_spawner(Vec2::new(-100.0, -50.0), 10.0, 0);
        scene.add_placeholder(Vec2::new(300.0, 20.0), 10.0);
        let b = scene.content_bounds().unwrap();
        assert_eq!(b.min, Vec2::new(-100.0, -50.0));
        assert_eq!(b.max, Vec2::new(300.0, 20.0));
    }
}
