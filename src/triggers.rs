use std::collections::{HashMap, HashSet};

use bevy::prelude::*;

use crate::collision_events::CollisionEvents;
use crate::script_call::{ScriptCall, ScriptCallBatch};
use crate::tilemap::CollisionLayer;

#[derive(Clone, Debug, PartialEq)]
pub struct CallTimer {
    pub remaining_ms: f32,
    /// Name of the layer that started the timer.
    pub layer: String,
}

/// Per-entity cooldowns keyed by call name.
#[derive(Component, Clone, Debug, Default)]
pub struct CallTimers {
    timers: HashMap<String, CallTimer>,
}

impl CallTimers {
    /// Counts every timer down; timers that run out are dropped.
    pub fn tick(&mut self, elapsed_ms: f32) {
        self.timers.retain(|_, timer| {
            timer.remaining_ms -= elapsed_ms;
            timer.remaining_ms > 0.0
        });
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.timers.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Returns true when `name` may fire now, starting its cooldown.
    pub fn try_fire(&mut self, name: &str, layer: &str, interval_ms: f32) -> bool {
        if self.is_running(name) {
            return false;
        }
        if interval_ms > 0.0 {
            self.timers.insert(
                name.to_string(),
                CallTimer {
                    remaining_ms: interval_ms,
                    layer: layer.to_string(),
                },
            );
        }
        true
    }

    pub fn retain_layers(&mut self, active: &HashSet<&str>) {
        self.timers
            .retain(|_, timer| active.contains(timer.layer.as_str()));
    }
}

pub struct TriggerContext<'a> {
    pub layers: &'a [CollisionLayer],
    pub actor: u64,
    /// Tile the entity stands on after moving.
    pub tile: (i32, i32),
    pub elapsed_ms: f32,
}

/// Turns one entity's collision events into debounced script calls.
///
/// Directional calls fire for boundary cells hit while resolving, picked by
/// the facing recorded in `events`. Collision calls fire for layers occupied
/// at the entity's own tile. Timers of layers the entity is no longer touching
/// are cleared so re-entry fires at once.
pub fn dispatch_calls(
    ctx: &TriggerContext,
    events: &CollisionEvents,
    timers: &mut CallTimers,
    batch: &mut ScriptCallBatch,
) {
    timers.tick(ctx.elapsed_ms);

    let mut active: HashSet<&str> = HashSet::new();

    for hit in events.boundary_hits() {
        let Some(layer) = ctx.layers.get(hit.layer) else {
            continue;
        };
        active.insert(layer.name.as_str());
        if let Some(name) = layer.direction_call(events.facing) {
            fire(ctx, layer, name, timers, batch);
        }
    }

    let (tx, ty) = ctx.tile;
    for layer in ctx.layers {
        let probe = layer.probe(tx, ty);
        if !probe.occupied() || probe.map_boundary {
            continue;
        }
        active.insert(layer.name.as_str());
        if let Some(name) = layer.collision_call.as_deref().filter(|n| !n.is_empty()) {
            fire(ctx, layer, name, timers, batch);
        }
    }

    timers.retain_layers(&active);
}

fn fire(
    ctx: &TriggerContext,
    layer: &CollisionLayer,
    name: &str,
    timers: &mut CallTimers,
    batch: &mut ScriptCallBatch,
) {
    if timers.try_fire(name, &layer.name, layer.collision_call_interval) {
        debug!(
            "[Tilewalk triggers] '{}' for actor {} from layer '{}'",
            name, ctx.actor, layer.name
        );
        batch.add(ScriptCall::new(name, ctx.actor, layer.name.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Direction;

    fn pond() -> CollisionLayer {
        let mut layer = CollisionLayer::new("@collision-pond", 4, 4).with_tiles(&[(1, 1)]);
        layer.passthrough = true;
        layer.collision_call = Some("splash".to_string());
        layer.collision_call_interval = 500.0;
        layer
    }

    fn step(
        layers: &[CollisionLayer],
        tile: (i32, i32),
        events: &CollisionEvents,
        timers: &mut CallTimers,
        elapsed_ms: f32,
    ) -> ScriptCallBatch {
        let ctx = TriggerContext {
            layers,
            actor: 9,
            tile,
            elapsed_ms,
        };
        let mut batch = ScriptCallBatch::default();
        dispatch_calls(&ctx, events, timers, &mut batch);
        batch
    }

    #[test]
    fn collision_call_fires_once_per_interval() {
        let layers = [pond()];
        let events = CollisionEvents::default();
        let mut timers = CallTimers::default();
        let mut fired_at = Vec::new();
        for tick in 0..=10 {
            let batch = step(&layers, (1, 1), &events, &mut timers, 100.0);
            if batch.contains("splash", 9) {
                fired_at.push(tick * 100);
            }
        }
        assert_eq!(fired_at, vec![0, 500, 1000]);
    }

    #[test]
    fn leaving_the_layer_resets_the_cooldown() {
        let layers = [pond()];
        let events = CollisionEvents::default();
        let mut timers = CallTimers::default();
        assert_eq!(step(&layers, (1, 1), &events, &mut timers, 100.0).len(), 1);
        assert!(timers.is_running("splash"));
        assert!(step(&layers, (2, 1), &events, &mut timers, 100.0).is_empty());
        assert!(timers.is_empty());
        assert_eq!(step(&layers, (1, 1), &events, &mut timers, 100.0).len(), 1);
    }

    #[test]
    fn directional_call_follows_facing_at_the_edge() {
        let mut edge = CollisionLayer::new("@collision-edge", 4, 4);
        edge.right_call = Some("leave_east".to_string());
        edge.collision_call_interval = 1000.0;
        let layers = [edge];

        let mut facing_right = CollisionEvents::new(Direction::Right);
        facing_right.record_overlap(0, 4, 2, true);
        let mut timers = CallTimers::default();
        let batch = step(&layers, (3, 2), &facing_right, &mut timers, 16.0);
        let calls: Vec<_> = batch.iter().cloned().collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "leave_east");
        assert_eq!(calls[0].source_layer, "@collision-edge");

        // Still pressing against the edge: the timer survives and blocks.
        assert!(step(&layers, (3, 2), &facing_right, &mut timers, 16.0).is_empty());
        assert!(timers.is_running("leave_east"));

        let mut facing_up = CollisionEvents::new(Direction::Up);
        facing_up.record_overlap(0, 3, -1, true);
        let mut fresh = CallTimers::default();
        assert!(step(&layers, (3, 0), &facing_up, &mut fresh, 16.0).is_empty());
    }

    #[test]
    fn collision_call_ignores_cells_outside_the_map() {
        let mut layer = pond();
        layer.tiles.iter_mut().for_each(|t| *t = 0);
        let layers = [layer];
        let mut timers = CallTimers::default();
        let batch = step(&layers, (-1, 0), &CollisionEvents::default(), &mut timers, 16.0);
        assert!(batch.is_empty());
    }

    #[test]
    fn zero_interval_fires_every_tick() {
        let mut layer = pond();
        layer.collision_call_interval = 0.0;
        let layers = [layer];
        let mut timers = CallTimers::default();
        for _ in 0..3 {
            let batch = step(&layers, (1, 1), &CollisionEvents::default(), &mut timers, 16.0);
            assert_eq!(batch.len(), 1);
        }
    }
}
