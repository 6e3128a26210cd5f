use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

use crate::script_call::ScriptCall;
use crate::TickSet;

const MAX_EVENTS: usize = 500;
const OVERFLOW_LOG_FRAMES: u64 = 60;

#[derive(Serialize, Clone, Debug)]
pub struct GameEvent {
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
    pub source_entity: Option<u64>,
}

/// Recent gameplay events, oldest first. Old entries fall off once the
/// buffer is full.
#[derive(Resource, Default)]
pub struct GameEventBus {
    pub recent: VecDeque<GameEvent>,
    pub frame: u64,
    pub dropped_events: u64,
    last_overflow_log_frame: u64,
}

impl GameEventBus {
    pub fn emit(
        &mut self,
        name: impl Into<String>,
        data: serde_json::Value,
        source_entity: Option<u64>,
    ) {
        self.recent.push_back(GameEvent {
            name: name.into(),
            data,
            frame: self.frame,
            source_entity,
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.frame.saturating_sub(self.last_overflow_log_frame) >= OVERFLOW_LOG_FRAMES {
                self.last_overflow_log_frame = self.frame;
                warn!(
                    "[Tilewalk events] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    pub fn emit_script_call(&mut self, call: &ScriptCall, ok: bool) {
        self.emit(
            "script_call",
            serde_json::json!({
                "call": call.name,
                "secondary": call.secondary,
                "layer": call.source_layer,
                "ok": ok,
            }),
            Some(call.primary),
        );
    }

    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a GameEvent> + 'a {
        self.recent.iter().filter(move |event| event.name == name)
    }
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameEventBus::default())
            .add_systems(FixedUpdate, tick_event_frame.in_set(TickSet::Clock));
    }
}

fn tick_event_frame(mut bus: ResMut<GameEventBus>) {
    bus.frame = bus.frame.saturating_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bus_tracks_dropped_events() {
        let mut bus = GameEventBus::default();
        for i in 0..(MAX_EVENTS + 25) {
            bus.emit("test", serde_json::json!({ "i": i }), None);
        }
        assert_eq!(bus.recent.len(), MAX_EVENTS);
        assert_eq!(bus.dropped_events, 25);
        assert_eq!(bus.recent.front().map(|e| e.data["i"].clone()), Some(25.into()));
    }

    #[test]
    fn script_calls_are_logged_against_the_primary_entity() {
        let mut bus = GameEventBus::default();
        bus.frame = 12;
        let call = ScriptCall::new("splash", 4, "@collision-pond").with_secondary(9);
        bus.emit_script_call(&call, true);
        let logged: Vec<_> = bus.named("script_call").collect();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].source_entity, Some(4));
        assert_eq!(logged[0].frame, 12);
        assert_eq!(logged[0].data["call"], "splash");
        assert_eq!(logged[0].data["secondary"], 9);
    }
}
