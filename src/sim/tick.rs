//! Fixed timestep simulation tick
//!
//! Advances the scene by one step: deferred spawns, seesaw balancing,
//! physics, contact dispatch, then cosmetic updates and culling.

use super::collision;
use super::scene::Scene;
use super::state::Bounds;
use crate::consts::*;

/// Per-tick inputs from the host
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Visible world rectangle; balls far outside it are culled
    pub view: Option<Bounds>,
}

/// Advance the scene by `dt` seconds
pub fn tick(scene: &mut Scene, input: &TickInput, dt: f32) {
    scene.time += f64::from(dt);
    scene.run_due_spawns();

    scene.apply_seesaw_torque(dt);
    let contacts = scene.physics.step(dt);
    collision::dispatch(scene, &contacts);

    scene.decay_glows(dt);
    scene.record_trails();
    scene.update_particles(dt);

    if let Some(limits) = cull_limits(scene, input) {
        let culled = scene.cull_balls(|pos| {
            pos.y <= limits.max.y && pos.x >= limits.min.x && pos.x <= limits.max.x
        });
        if culled > 0 {
            log::debug!("Culled {culled} balls");
        }
    }
}

/// Balls may fly up freely; only falling below or drifting sideways culls
fn cull_limits(scene: &Scene, input: &TickInput) -> Option<Bounds> {
    input
        .view
        .or_else(|| scene.content_bounds())
        .map(|b| b.expand(CULL_MARGIN))
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::audio::Note;
    use crate::sim::scene::SceneEvent;
    use crate::sim::state::{BarGeometry, BarShape};

    fn run(scene: &mut Scene, input: &TickInput, steps: usize) -> Vec<SceneEvent> {
        let mut events = Vec::new();
        for _ in 0..steps {
            tick(scene, input, SIM_DT);
            events.extend(scene.drain_events());
        }
        events
    }

    #[test]
    fn test_dropped_ball_plays_note() {
        let mut scene = Scene::default();
        let spawner = scene.add_spawner(Vec2::ZERO, BALL_RADIUS, 0).unwrap();
        scene.add_bar(
            Vec2::new(0.0, 150.0),
            0.0,
            BarGeometry::new(BarShape::Rect, 300.0, 16.0),
            Note::parse("A4").unwrap(),
        );
        scene.spawn_ball(spawner);

        let events = run(&mut scene, &TickInput::default(), 120);
        assert!(events.iter().any(|e| matches!(
            e,
            SceneEvent::NotePlayed { note, .. } if note.name() == "A4"
        )));
        assert!(scene.bars()[0].is_activated());
    }

    #[test]
    fn test_glow_decays() {
        let mut scene = Scene::default();
        let spawner = scene.add_spawner(Vec2::new(1000.0, 0.0), BALL_RADIUS, 0).unwrap();
        let bar = scene.add_bar(Vec2::ZERO, 0.0, BarGeometry::default(), Note::default());
        let ball = scene.spawn_ball(spawner).unwrap();
        scene.hit_bar(bar, ball, Vec2::ZERO);

        run(&mut scene, &TickInput::default(), 30);
        let glow = scene.bar(bar).unwrap().glow;
        assert!(glow > 0.0 && glow < 1.0, "glow {glow}");
        run(&mut scene, &TickInput::default(), 120);
        assert_eq!(scene.bar(bar).unwrap().glow, 0.0);
    }

    #[test]
    fn test_balls_culled_below_view() {
        let mut scene = Scene::default();
        let spawner = scene.add_spawner(Vec2::ZERO, BALL_RADIUS, 0).unwrap();
        scene.spawn_ball(spawner);
        let bodies = scene.body_count();
        let input = TickInput {
            view: Some(Bounds::new(Vec2::new(-100.0, -100.0), Vec2::new(100.0, 0.0))),
        };

        // Free fall past y = 400 takes about 1.3 s at 9.81 m/s² * 50 px/m
        let events = run(&mut scene, &input, 240);
        assert!(scene.balls().is_empty());
        assert_eq!(scene.body_count(), bodies - 1);
        assert!(events.iter().any(|e| matches!(e, SceneEvent::BallDespawned { .. })));
    }

    #[test]
    fn test_sequence_fires_in_delay_order() {
        let mut scene = Scene::default();
        let late = scene.add_spawner(Vec2::new(-50.0, 0.0), BALL_RADIUS, 300).unwrap();
        let early = scene.add_spawner(Vec2::new(50.0, 0.0), BALL_RADIUS, 100).unwrap();
        assert_eq!(scene.schedule_sequence(), 2);

        let spawned: Vec<Option<u32>> = run(&mut scene, &TickInput::default(), 30)
            .into_iter()
            .filter_map(|e| match e {
                SceneEvent::BallSpawned { spawner, .. } => Some(spawner),
                _ => None,
            })
            .collect();
        assert_eq!(spawned, vec![Some(early), Some(late)]);
        assert_eq!(scene.pending_spawns(), 0);
    }

    #[test]
    fn test_removed_spawner_entry_is_noop() {
        let mut scene = Scene::default();
        let spawner = scene.add_spawner(Vec2::ZERO, BALL_RADIUS, 50).unwrap();
        scene.schedule_sequence();
        scene.remove_spawner(spawner);
        run(&mut scene, &TickInput::default(), 10);
        assert!(scene.balls().is_empty());
    }

    #[test]
    fn test_seesaw_returns_toward_rest() {
        let mut scene = Scene::default();
        let bar = scene.add_bar(
            Vec2::new(0.0, 0.0),
            0.0,
            BarGeometry::new(BarShape::Seesaw, 200.0, 12.0),
            Note::default(),
        );
        let plank = scene.bar(bar).unwrap().body.primary();
        scene.physics.set_body_pose(plank, Vec2::ZERO, 0.5);

        run(&mut scene, &TickInput::default(), 600);
        let (_, angle) = scene.bar_pose(bar).unwrap();
        assert!(angle.abs() < 0.5, "plank should swing back, angle {angle}");
    }
}
