//! Contact classification and dispatch
//!
//! Every started contact is resolved to its logical owners and sorted into
//! one of a few cases. Checked in order:
//! 1. ball ↔ ball: ignored
//! 2. a ball whose center is within reach (touching included) of a
//!    placeholder: wake it, stop
//! 3. bar ↔ bar: ignored
//! 4. bar ↔ ball: wake any placeholder at the contact point, then hit the bar

use std::collections::HashSet;

use glam::Vec2;

use super::physics::RawContact;
use super::scene::Scene;
use super::state::{EntityId, EntityRef};

/// What a resolved contact means for the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactClass {
    BallBall,
    /// Ball reached the placeholder at this index
    WakePlaceholder { ball: EntityId, placeholder: usize },
    BarBar,
    BarHit {
        bar: EntityId,
        ball: EntityId,
        point: Vec2,
    },
    Ignored,
}

/// Decide which case a pair of owners falls into
///
/// `point` is the engine's contact point; without one the ball's center
/// stands in.
pub fn classify(scene: &Scene, a: EntityRef, b: EntityRef, point: Option<Vec2>) -> ContactClass {
    use EntityRef::*;

    if let (Ball(_), Ball(_)) = (a, b) {
        return ContactClass::BallBall;
    }

    let ball = match (a, b) {
        (Ball(id), _) | (_, Ball(id)) => scene.ball(id),
        _ => None,
    };
    let center = ball.and_then(|ball| scene.ball_position(ball.id));

    if let (Some(ball), Some(center)) = (ball, center) {
        if let Some(placeholder) = scene.placeholder_near(center, ball.radius) {
            return ContactClass::WakePlaceholder {
                ball: ball.id,
                placeholder,
            };
        }
    }

    match (a, b) {
        (Bar(_), Bar(_)) => ContactClass::BarBar,
        (Bar(bar), Ball(ball)) | (Ball(ball), Bar(bar)) => match point.or(center) {
            Some(point) => ContactClass::BarHit { bar, ball, point },
            None => ContactClass::Ignored,
        },
        _ => ContactClass::Ignored,
    }
}

/// Apply a classified contact; returns whether the scene changed
pub fn apply(scene: &mut Scene, class: ContactClass) -> bool {
    match class {
        ContactClass::BallBall | ContactClass::BarBar | ContactClass::Ignored => false,
        ContactClass::WakePlaceholder { ball, placeholder } => {
            let Some(color) = scene.ball(ball).map(|b| b.color) else {
                return false;
            };
            scene.activate_placeholder(placeholder, color).is_some()
        }
        ContactClass::BarHit { bar, ball, point } => {
            let Some((color, radius)) = scene.ball(ball).map(|b| (b.color, b.radius)) else {
                return false;
            };
            if let Some(index) = scene.placeholder_near(point, radius) {
                scene.activate_placeholder(index, color);
            }
            scene.hit_bar(bar, ball, point);
            true
        }
    }
}

/// Unordered pair key
fn pair_key(a: EntityRef, b: EntityRef) -> (EntityRef, EntityRef) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Classify and apply one tick's contacts; each owner pair acts at most once
pub fn dispatch(scene: &mut Scene, contacts: &[RawContact]) -> usize {
    let mut seen = HashSet::new();
    let mut applied = 0;
    for contact in contacts {
        let (Some(a), Some(b)) = (
            scene.resolve_collider(contact.collider1),
            scene.resolve_collider(contact.collider2),
        ) else {
            continue;
        };
        if !seen.insert(pair_key(a, b)) {
            continue;
        }
        let point = contact.point.or_else(|| {
            if matches!(a, EntityRef::Ball(_)) || matches!(b, EntityRef::Ball(_)) {
                None
            } else {
                let pa = scene.entity_position(a)?;
                let pb = scene.entity_position(b)?;
                Some((pa + pb) * 0.5)
            }
        });
        let class = classify(scene, a, b, point);
        if apply(scene, class) {
            applied += 1;
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Note;
    use crate::sim::scene::SceneEvent;
    use crate::sim::state::{BarGeometry, palette};

    fn collider_of(scene: &Scene, entity: EntityRef) -> rapier2d::prelude::ColliderHandle {
        let body = match entity {
            EntityRef::Ball(id) => scene.ball(id).unwrap().body,
            EntityRef::Bar(id) => scene.bar(id).unwrap().body.primary(),
            EntityRef::Placeholder(id) => scene.placeholder(id).unwrap().sensor,
        };
        scene.physics.colliders_of(body)[0]
    }

    fn contact(scene: &Scene, a: EntityRef, b: EntityRef, point: Option<Vec2>) -> RawContact {
        RawContact {
            collider1: collider_of(scene, a),
            collider2: collider_of(scene, b),
            point,
        }
    }

    fn free_ball(scene: &mut Scene, pos: Vec2) -> EntityId {
        scene.insert_ball(pos, 10.0, palette::BALL, None)
    }

    #[test]
    fn test_ball_ball_is_noop() {
        let mut scene = Scene::default();
        let a = free_ball(&mut scene, Vec2::ZERO);
        let b = free_ball(&mut scene, Vec2::new(15.0, 0.0));
        scene.drain_events();
        let before = scene.snapshot();

        let c = contact(&scene, EntityRef::Ball(a), EntityRef::Ball(b), Some(Vec2::ZERO));
        assert_eq!(dispatch(&mut scene, &[c]), 0);
        assert_eq!(scene.snapshot(), before);
        assert!(scene.drain_events().is_empty());
        assert_eq!(scene.ball(a).unwrap().color, palette::BALL);
    }

    #[test]
    fn test_bar_bar_is_noop() {
        let mut scene = Scene::default();
        let a = scene.add_bar(Vec2::ZERO, 0.0, BarGeometry::default(), Note::default());
        let b = scene.add_bar(Vec2::new(50.0, 0.0), 0.0, BarGeometry::default(), Note::default());
        let class = classify(&scene, EntityRef::Bar(a), EntityRef::Bar(b), None);
        assert_eq!(class, ContactClass::BarBar);

        let c = contact(&scene, EntityRef::Bar(a), EntityRef::Bar(b), None);
        assert_eq!(dispatch(&mut scene, &[c]), 0);
        assert!(!scene.bar(a).unwrap().is_activated());
        assert!(scene.drain_events().is_empty());
    }

    #[test]
    fn test_placeholder_woken_once() {
        let mut scene = Scene::default();
        let p = scene.add_placeholder(Vec2::new(100.0, 100.0), 10.0);
        let ball = free_ball(&mut scene, Vec2::new(100.0, 85.0));
        scene.recolor_ball(ball, palette::ACCENTS[4]);
        let c = contact(&scene, EntityRef::Ball(ball), EntityRef::Placeholder(p), None);

        assert_eq!(dispatch(&mut scene, &[c]), 1);
        assert!(scene.placeholders().is_empty());
        assert_eq!(scene.balls().len(), 2);
        let woken = scene.balls().iter().find(|b| b.id != ball).unwrap();
        assert_eq!(woken.color, palette::ACCENTS[4]);
        assert_eq!(scene.ball_position(woken.id), Some(Vec2::new(100.0, 100.0)));

        // The placeholder's collider is gone, so the same contact resolves to nothing
        assert_eq!(dispatch(&mut scene, &[c]), 0);
        assert_eq!(scene.balls().len(), 2);
    }

    #[test]
    fn test_far_placeholder_not_woken() {
        let mut scene = Scene::default();
        let p = scene.add_placeholder(Vec2::new(100.0, 100.0), 10.0);
        let ball = free_ball(&mut scene, Vec2::new(100.0, 60.0));
        let class = classify(&scene, EntityRef::Ball(ball), EntityRef::Placeholder(p), None);
        assert_eq!(class, ContactClass::Ignored);
    }

    #[test]
    fn test_touching_placeholder_is_woken() {
        let mut scene = Scene::default();
        let p = scene.add_placeholder(Vec2::new(100.0, 100.0), 10.0);
        let ball = free_ball(&mut scene, Vec2::new(100.0, 80.0));
        let class = classify(&scene, EntityRef::Ball(ball), EntityRef::Placeholder(p), None);
        assert_eq!(
            class,
            ContactClass::WakePlaceholder {
                ball,
                placeholder: 0
            }
        );

        let apart = free_ball(&mut scene, Vec2::new(100.0, 78.0));
        let class = classify(&scene, EntityRef::Ball(apart), EntityRef::Placeholder(p), None);
        assert_eq!(class, ContactClass::Ignored);
    }

    #[test]
    fn test_sensor_overlap_always_wakes_placeholder() {
        use crate::sim::tick::{TickInput, tick};

        // Falling balls reach the sensor dead center and off to the side
        for offset in [0.0, 5.0, 10.0, 15.0, 19.0] {
            let mut scene = Scene::default();
            let p = scene.add_placeholder(Vec2::new(offset, 120.0), 10.0);
            free_ball(&mut scene, Vec2::ZERO);
            scene.drain_events();

            let mut woken = false;
            for _ in 0..120 {
                tick(&mut scene, &TickInput::default(), crate::consts::SIM_DT);
                woken |= scene.drain_events().iter().any(|e| match e {
                    SceneEvent::PlaceholderActivated { placeholder, .. } => *placeholder == p,
                    _ => false,
                });
                if woken {
                    break;
                }
            }
            assert!(woken, "ball {offset}px off center never woke the placeholder");
        }
    }

    #[test]
    fn test_bar_hit_plays_note_and_recolors() {
        let mut scene = Scene::default();
        let bar = scene.add_bar(
            Vec2::new(0.0, 50.0),
            0.0,
            BarGeometry::default(),
            Note::parse("G4").unwrap(),
        );
        let ball = free_ball(&mut scene, Vec2::new(0.0, 32.0));
        scene.drain_events();

        let c = contact(&scene, EntityRef::Bar(bar), EntityRef::Ball(ball), Some(Vec2::new(0.0, 42.0)));
        assert_eq!(dispatch(&mut scene, &[c]), 1);

        let b = scene.bar(bar).unwrap();
        assert!(b.is_activated());
        assert_eq!(b.glow, 1.0);
        assert_eq!(scene.ball(ball).unwrap().color, b.color());
        assert!(!scene.particles().is_empty());
        let notes: Vec<Note> = scene
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                SceneEvent::NotePlayed { note, .. } => Some(note),
                _ => None,
            })
            .collect();
        assert_eq!(notes, vec![Note::parse("G4").unwrap()]);
    }

    #[test]
    fn test_duplicate_pair_in_one_tick_fires_once() {
        let mut scene = Scene::default();
        let bar = scene.add_bar(Vec2::new(0.0, 50.0), 0.0, BarGeometry::default(), Note::default());
        let ball = free_ball(&mut scene, Vec2::new(0.0, 32.0));
        let c1 = contact(&scene, EntityRef::Bar(bar), EntityRef::Ball(ball), Some(Vec2::new(0.0, 42.0)));
        let c2 = contact(&scene, EntityRef::Ball(ball), EntityRef::Bar(bar), Some(Vec2::new(1.0, 42.0)));

        assert_eq!(dispatch(&mut scene, &[c1, c2]), 1);
        assert_eq!(scene.bar(bar).unwrap().hits, 1);
    }

    #[test]
    fn test_bar_hit_wakes_placeholder_at_contact_point() {
        let mut scene = Scene::default();
        let bar = scene.add_bar(Vec2::new(0.0, 50.0), 0.0, BarGeometry::default(), Note::default());
        // Far from the ball's center but touching the contact point
        let p = scene.add_placeholder(Vec2::new(60.0, 35.0), 8.0);
        let ball = free_ball(&mut scene, Vec2::new(0.0, 32.0));
        let c = contact(&scene, EntityRef::Bar(bar), EntityRef::Ball(ball), Some(Vec2::new(55.0, 42.0)));

        assert_eq!(dispatch(&mut scene, &[c]), 1);
        assert!(scene.placeholder(p).is_none());
        assert_eq!(scene.balls().len(), 2);
        assert_eq!(scene.bar(bar).unwrap().hits, 1);
    }

    #[test]
    fn test_ball_center_near_placeholder_wins_over_bar() {
        let mut scene = Scene::default();
        let bar = scene.add_bar(Vec2::new(0.0, 50.0), 0.0, BarGeometry::default(), Note::default());
        scene.add_placeholder(Vec2::new(0.0, 20.0), 10.0);
        let ball = free_ball(&mut scene, Vec2::new(0.0, 32.0));
        let c = contact(&scene, EntityRef::Bar(bar), EntityRef::Ball(ball), Some(Vec2::new(0.0, 42.0)));

        let class = classify(&scene, EntityRef::Bar(bar), EntityRef::Ball(ball), c.point);
        assert!(matches!(class, ContactClass::WakePlaceholder { .. }));
        dispatch(&mut scene, &[c]);
        assert!(!scene.bar(bar).unwrap().is_activated());
        assert!(scene.placeholders().is_empty());
    }

    #[test]
    fn test_first_placeholder_in_list_order_wins() {
        let mut scene = Scene::default();
        let first = scene.add_placeholder(Vec2::new(0.0, 10.0), 10.0);
        let second = scene.add_placeholder(Vec2::new(0.0, -10.0), 10.0);
        let ball = free_ball(&mut scene, Vec2::ZERO);
        let c = contact(&scene, EntityRef::Ball(ball), EntityRef::Placeholder(second), None);

        dispatch(&mut scene, &[c]);
        assert!(scene.placeholder(first).is_none());
        assert!(scene.placeholder(second).is_some());
    }
}
