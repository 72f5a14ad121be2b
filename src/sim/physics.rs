//! Thin wrapper around the rapier2d pipeline
//!
//! World units are pixels (y down); rapier works in meters. Everything that
//! crosses this module boundary is converted with `PIXELS_PER_METER`.

use std::sync::Mutex;

use glam::Vec2;
use rapier2d::prelude::*;

use super::state::{BarGeometry, BarShape};
use crate::consts::{EARTH_GRAVITY, PIXELS_PER_METER};

const BALL_GROUP: Group = Group::GROUP_1;
const BAR_GROUP: Group = Group::GROUP_2;
const SENSOR_GROUP: Group = Group::GROUP_3;

/// Angular damping on seesaw planks so they settle instead of ringing
const SEESAW_ANGULAR_DAMPING: f32 = 2.0;

#[inline]
fn to_meters(v: Vec2) -> Vector<Real> {
    vector![v.x / PIXELS_PER_METER, v.y / PIXELS_PER_METER]
}

#[inline]
fn to_meter_point(v: Vec2) -> Point<Real> {
    point![v.x / PIXELS_PER_METER, v.y / PIXELS_PER_METER]
}

#[inline]
fn to_pixels(x: Real, y: Real) -> Vec2 {
    Vec2::new(x, y) * PIXELS_PER_METER
}

/// A collision that started during the last step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawContact {
    pub collider1: ColliderHandle,
    pub collider2: ColliderHandle,
    /// World contact point; None for sensor overlaps
    pub point: Option<Vec2>,
}

/// Collects started collisions; rapier requires `Send + Sync`
#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<RawContact>>,
}

impl ContactCollector {
    fn take(&self) -> Vec<RawContact> {
        let mut started = self.started.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *started)
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        contact_pair: Option<&ContactPair>,
    ) {
        let CollisionEvent::Started(collider1, collider2, _) = event else {
            return;
        };
        let point = contact_pair.and_then(|pair| contact_point(colliders, pair));
        let mut started = self.started.lock().unwrap_or_else(|e| e.into_inner());
        started.push(RawContact {
            collider1,
            collider2,
            point,
        });
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// First world-space contact point of a pair
fn contact_point(colliders: &ColliderSet, pair: &ContactPair) -> Option<Vec2> {
    for manifold in &pair.manifolds {
        if let Some(contact) = manifold.data.solver_contacts.first() {
            return Some(to_pixels(contact.point.x, contact.point.y));
        }
        if let Some(tracked) = manifold.points.first() {
            let collider = colliders.get(pair.collider1)?;
            let world = collider.position() * tracked.local_p1;
            return Some(to_pixels(world.x, world.y));
        }
    }
    None
}

/// The simulation world and its event plumbing
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    query: QueryPipeline,
    collector: ContactCollector,
}

impl PhysicsWorld {
    pub fn new(gravity_scale: f32) -> Self {
        Self {
            gravity: vector![0.0, EARTH_GRAVITY * gravity_scale],
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query: QueryPipeline::new(),
            collector: ContactCollector::default(),
        }
    }

    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity = vector![0.0, EARTH_GRAVITY * scale];
    }

    /// Advance one step and return the collisions that started during it
    pub fn step(&mut self, dt: f32) -> Vec<RawContact> {
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query),
            &(),
            &self.collector,
        );
        self.collector.take()
    }

    /// Dynamic ball; balls never collide with each other
    pub fn create_ball(&mut self, pos: Vec2, radius: f32, restitution: f32) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(to_meters(pos))
            .ccd_enabled(true)
            .build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::ball(radius / PIXELS_PER_METER)
            .restitution(restitution)
            .restitution_combine_rule(CoefficientCombineRule::Max)
            .friction(0.1)
            .collision_groups(InteractionGroups::new(BALL_GROUP, Group::ALL ^ BALL_GROUP))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Fixed sensor: reports overlaps, exerts no contact forces
    pub fn create_sensor(&mut self, pos: Vec2, radius: f32) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed().translation(to_meters(pos)).build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::ball(radius / PIXELS_PER_METER)
            .sensor(true)
            .collision_groups(InteractionGroups::new(SENSOR_GROUP, BALL_GROUP))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Fixed body carrying one collider per convex part of the geometry
    pub fn create_bar(&mut self, pos: Vec2, angle: f32, geometry: &BarGeometry) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(to_meters(pos))
            .rotation(angle)
            .build();
        let handle = self.bodies.insert(body);
        self.attach_bar_colliders(handle, geometry);
        handle
    }

    fn attach_bar_colliders(&mut self, handle: RigidBodyHandle, geometry: &BarGeometry) {
        for shape in bar_shapes(geometry) {
            let collider = ColliderBuilder::new(shape)
                .friction(0.3)
                .collision_groups(InteractionGroups::new(BAR_GROUP, Group::ALL))
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build();
            self.colliders
                .insert_with_parent(collider, handle, &mut self.bodies);
        }
    }

    /// Remove a body with its colliders and joints
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        self.bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    /// Owning body of a collider (compound parts resolve to the same body)
    pub fn collider_parent(&self, collider: ColliderHandle) -> Option<RigidBodyHandle> {
        self.colliders.get(collider)?.parent()
    }

    pub fn body_position(&self, handle: RigidBodyHandle) -> Option<Vec2> {
        let t = self.bodies.get(handle)?.translation();
        Some(to_pixels(t.x, t.y))
    }

    pub fn body_angle(&self, handle: RigidBodyHandle) -> Option<f32> {
        Some(self.bodies.get(handle)?.rotation().angle())
    }

    pub fn body_velocity(&self, handle: RigidBodyHandle) -> Option<Vec2> {
        let v = self.bodies.get(handle)?.linvel();
        Some(to_pixels(v.x, v.y))
    }

    /// Teleport a body
    pub fn set_body_pose(&mut self, handle: RigidBodyHandle, pos: Vec2, angle: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_position(Isometry::new(to_meters(pos), angle), true);
        }
    }

    pub fn set_body_velocity(&mut self, handle: RigidBodyHandle, vel: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(to_meters(vel), true);
        }
    }

    /// Zero linear and angular velocity
    pub fn stop_body(&mut self, handle: RigidBodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(vector![0.0, 0.0], true);
            body.set_angvel(0.0, true);
        }
    }

    pub fn apply_torque_impulse(&mut self, handle: RigidBodyHandle, impulse: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.apply_torque_impulse(impulse, true);
        }
    }

    /// Update restitution on every collider of a body
    pub fn set_restitution(&mut self, handle: RigidBodyHandle, restitution: f32) {
        let Some(body) = self.bodies.get(handle) else {
            return;
        };
        for collider in body.colliders().to_vec() {
            if let Some(c) = self.colliders.get_mut(collider) {
                c.set_restitution(restitution);
            }
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joints.len()
    }

    /// Colliders attached to a body (test and debug helper)
    pub fn colliders_of(&self, handle: RigidBodyHandle) -> Vec<ColliderHandle> {
        self.bodies
            .get(handle)
            .map(|b| b.colliders().to_vec())
            .unwrap_or_default()
    }
}

/// Collision shapes for a bar, in meters, local to the body
fn bar_shapes(geometry: &BarGeometry) -> Vec<SharedShape> {
    let half = geometry.half_extents() / PIXELS_PER_METER;
    match geometry.shape {
        BarShape::Circle => vec![SharedShape::ball(half.x)],
        BarShape::Rect | BarShape::Seesaw if !geometry.is_curved() => {
            vec![SharedShape::cuboid(half.x, half.y)]
        }
        _ => geometry
            .convex_parts()
            .iter()
            .filter_map(|part| {
                let points: Vec<Point<Real>> = part.iter().map(|p| to_meter_point(*p)).collect();
                SharedShape::convex_hull(&points)
            })
            .collect(),
    }
}

/// Seesaw plank pinned to a fixed anchor by a revolute joint
///
/// The three parts are created by `build` and released by `release` only;
/// there is no way to drop one without the others.
#[derive(Debug)]
pub struct SeesawRig {
    plank: RigidBodyHandle,
    anchor: RigidBodyHandle,
    joint: ImpulseJointHandle,
}

impl SeesawRig {
    pub fn build(world: &mut PhysicsWorld, pos: Vec2, angle: f32, geometry: &BarGeometry) -> Self {
        let plank = world.bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(to_meters(pos))
                .rotation(angle)
                .angular_damping(SEESAW_ANGULAR_DAMPING)
                .build(),
        );
        world.attach_bar_colliders(plank, geometry);
        let anchor = world
            .bodies
            .insert(RigidBodyBuilder::fixed().translation(to_meters(pos)).build());
        let joint = RevoluteJointBuilder::new()
            .local_anchor1(point![0.0, 0.0])
            .local_anchor2(point![0.0, 0.0]);
        let joint = world.impulse_joints.insert(anchor, plank, joint, true);
        Self {
            plank,
            anchor,
            joint,
        }
    }

    pub fn plank(&self) -> RigidBodyHandle {
        self.plank
    }

    pub fn release(self, world: &mut PhysicsWorld) {
        world.impulse_joints.remove(self.joint, true);
        world.remove_body(self.plank);
        world.remove_body(self.anchor);
    }
}

/// Physics resources owned by one bar
#[derive(Debug)]
pub enum BarBody {
    Solid(RigidBodyHandle),
    Seesaw(SeesawRig),
}

impl BarBody {
    pub fn build(world: &mut PhysicsWorld, pos: Vec2, angle: f32, geometry: &BarGeometry) -> Self {
        if geometry.shape == BarShape::Seesaw {
            BarBody::Seesaw(SeesawRig::build(world, pos, angle, geometry))
        } else {
            BarBody::Solid(world.create_bar(pos, angle, geometry))
        }
    }

    /// The body that carries the bar's colliders
    pub fn primary(&self) -> RigidBodyHandle {
        match self {
            BarBody::Solid(handle) => *handle,
            BarBody::Seesaw(rig) => rig.plank(),
        }
    }

    pub fn release(self, world: &mut PhysicsWorld) {
        match self {
            BarBody::Solid(handle) => {
                world.remove_body(handle);
            }
            BarBody::Seesaw(rig) => rig.release(world),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ball_falls_under_gravity() {
        let mut world = PhysicsWorld::new(1.0);
        let ball = world.create_ball(Vec2::new(0.0, 0.0), 10.0, 0.5);
        for _ in 0..30 {
            world.step(1.0 / 60.0);
        }
        let pos = world.body_position(ball).unwrap();
        assert!(pos.y > 10.0, "ball should move down (y grows), got {pos}");
    }

    #[test]
    fn test_curved_bar_is_compound() {
        let mut world = PhysicsWorld::new(1.0);
        let geometry = BarGeometry::new(BarShape::Curve, 200.0, 20.0).with_curvature(0.4, 0.4);
        let bar = world.create_bar(Vec2::ZERO, 0.0, &geometry);
        let colliders = world.colliders_of(bar);
        assert!(colliders.len() > 1);
        for c in colliders {
            assert_eq!(world.collider_parent(c), Some(bar));
        }
    }

    #[test]
    fn test_seesaw_rig_released_as_unit() {
        let mut world = PhysicsWorld::new(1.0);
        let geometry = BarGeometry::new(BarShape::Seesaw, 160.0, 12.0);
        let rig = SeesawRig::build(&mut world, Vec2::new(100.0, 100.0), 0.0, &geometry);
        assert_eq!(world.body_count(), 2);
        assert_eq!(world.joint_count(), 1);
        rig.release(&mut world);
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.joint_count(), 0);
        assert_eq!(world.collider_count(), 0);
    }

    #[test]
    fn test_ball_hitting_bar_reports_contact() {
        let mut world = PhysicsWorld::new(1.0);
        let geometry = BarGeometry::new(BarShape::Rect, 300.0, 20.0);
        let bar = world.create_bar(Vec2::new(0.0, 100.0), 0.0, &geometry);
        let ball = world.create_ball(Vec2::new(0.0, 0.0), 10.0, 0.5);

        let mut contacts = Vec::new();
        for _ in 0..120 {
            contacts.extend(world.step(1.0 / 60.0));
        }
        let hit = contacts.iter().any(|c| {
            let a = world.collider_parent(c.collider1);
            let b = world.collider_parent(c.collider2);
            (a == Some(bar) && b == Some(ball)) || (a == Some(ball) && b == Some(bar))
        });
        assert!(hit, "expected a started contact between ball and bar");
    }
}
