pub mod ai;
pub mod collision_events;
pub mod components;
pub mod error;
pub mod events;
pub mod neighborhood;
pub mod physics;
pub mod physics_core;
pub mod script_call;
pub mod scripting;
pub mod simulation;
pub mod tilemap;
pub mod triggers;

use bevy::prelude::*;

use components::WalkConfig;
use tilemap::CollisionMap;

/// Order of work inside one fixed tick.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickSet {
    /// Elapsed time and frame counters.
    Clock,
    /// Wander planning and player input set intended velocities.
    Intent,
    /// Movement resolution and trigger dispatch.
    Walk,
    /// The frame's script calls are executed.
    Dispatch,
}

pub struct TilewalkPlugin;

impl Plugin for TilewalkPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WalkConfig>()
            .init_resource::<CollisionMap>()
            .configure_sets(
                FixedUpdate,
                (TickSet::Clock, TickSet::Intent, TickSet::Walk, TickSet::Dispatch).chain(),
            )
            .add_plugins(events::GameEventsPlugin)
            .add_plugins(physics::PhysicsPlugin)
            .add_plugins(ai::AiPlugin)
            .add_plugins(scripting::ScriptingPlugin);
    }
}
