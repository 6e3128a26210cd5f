use bevy::prelude::*;

use crate::components::*;
use crate::physics_core::{resolve_walk, WalkParams};
use crate::script_call::FrameScriptCalls;
use crate::tilemap::CollisionMap;
use crate::triggers::{dispatch_calls, CallTimers, TriggerContext};
use crate::TickSet;

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TickClock>()
            .init_resource::<PlayerInput>()
            .init_resource::<FrameScriptCalls>()
            .add_systems(FixedUpdate, sync_tick_clock.in_set(TickSet::Clock))
            .add_systems(FixedUpdate, apply_player_input.in_set(TickSet::Intent))
            .add_systems(FixedUpdate, walk_entities.in_set(TickSet::Walk));
    }
}

pub(crate) fn sync_tick_clock(time: Res<Time<Fixed>>, mut clock: ResMut<TickClock>) {
    clock.elapsed_ms = time.delta_secs() * 1000.0;
    clock.frame = clock.frame.saturating_add(1);
}

pub(crate) fn apply_player_input(
    input: Res<PlayerInput>,
    mut query: Query<(&MovementPlan, &Walker, &mut IntendedVelocity, &mut Facing), With<Player>>,
) {
    let dx = input.dx.clamp(-1.0, 1.0);
    let dy = input.dy.clamp(-1.0, 1.0);
    for (plan, walker, mut velocity, mut facing) in query.iter_mut() {
        if plan.kind != MovementType::PlayerControlled {
            continue;
        }
        velocity.dx = dx;
        velocity.dy = dy;
        facing.0 = Direction::from_velocity(dx, dy, facing.0, walker.freedom);
    }
}

type WalkQueryItem<'a> = (
    Entity,
    Option<&'a ActorId>,
    &'a Walker,
    &'a IntendedVelocity,
    &'a Facing,
    &'a mut GamePosition,
    &'a mut CallTimers,
);

/// Moves every walker by its intended velocity, resolves it against the
/// collision layers and queues the script calls its new position triggers.
pub(crate) fn walk_entities(
    map: Res<CollisionMap>,
    config: Res<WalkConfig>,
    clock: Res<TickClock>,
    mut calls: ResMut<FrameScriptCalls>,
    mut query: Query<WalkQueryItem<'_>>,
) {
    let ts = config.tile_size;
    let layers = map.layers();

    for (entity, actor, walker, velocity, facing, mut pos, mut timers) in query.iter_mut() {
        let outcome = resolve_walk(
            layers,
            WalkParams {
                tile_size: ts,
                radius: config.neighborhood_radius,
                elapsed_ms: clock.elapsed_ms,
                x: pos.x,
                y: pos.y,
                dx: velocity.dx,
                dy: velocity.dy,
                speed: walker.speed,
                width: walker.width,
                height: walker.height,
                pushable: walker.pushable,
                facing: facing.0,
            },
        );
        pos.x = outcome.x;
        pos.y = outcome.y;

        let ctx = TriggerContext {
            layers,
            actor: actor.map_or_else(|| entity.to_bits(), |id| id.0),
            tile: pos.tile(ts),
            elapsed_ms: clock.elapsed_ms,
        };
        dispatch_calls(&ctx, &outcome.events, &mut timers, &mut calls.0);
    }
}
