use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::components::{
    axis_sign, Direction, DirectionsOfFreedom, Facing, GamePosition, IntendedVelocity,
    MovementPlan, MovementTarget, MovementType, TickClock, WalkConfig, WanderConfig, WanderPhase,
    Walker,
};
use crate::neighborhood::TileNeighborhood;
use crate::tilemap::{CollisionLayer, CollisionMap};
use crate::TickSet;

pub struct AiPlugin;

impl Plugin for AiPlugin {
    fn build(&self, app: &mut App) {
        let seed = app
            .world()
            .get_resource::<WalkConfig>()
            .map(|config| config.wander.seed)
            .unwrap_or_default();
        app.insert_resource(WanderRng::seeded(seed))
            .add_systems(FixedUpdate, plan_wander_movement.in_set(TickSet::Intent));
    }
}

/// Shared randomness for wander decisions. Seeded so runs are repeatable.
#[derive(Resource)]
pub struct WanderRng(pub SmallRng);

impl WanderRng {
    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

impl Default for WanderRng {
    fn default() -> Self {
        Self::seeded(0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WanderStep {
    Move(Direction),
    Wait,
}

/// Picks the next wander step from the directions open around the center of
/// `neighborhood`. A walled-in entity always waits.
pub fn choose_wander_step<R: Rng>(
    neighborhood: &TileNeighborhood,
    rng: &mut R,
    wait_chance: f64,
) -> WanderStep {
    let open = neighborhood.open_directions();
    if open.is_empty() {
        return WanderStep::Wait;
    }
    if rng.gen_bool(wait_chance.clamp(0.0, 1.0)) {
        return WanderStep::Wait;
    }
    WanderStep::Move(open[rng.gen_range(0..open.len())])
}

/// Target for `step` taken from tile `from`. The destination sits on the
/// tile's horizontal center, 2 units above its bottom edge so the entity does
/// not graze the tile below.
pub fn create_wander_target(
    step: WanderStep,
    from: (i32, i32),
    position: &GamePosition,
    tile_size: f32,
    wait_ms: f32,
) -> MovementTarget {
    let direction = match step {
        WanderStep::Move(direction) => direction,
        WanderStep::Wait => Direction::None,
    };
    let (ox, oy) = direction.offset();
    let tx = from.0 + ox;
    let ty = from.1 + oy;
    let x = tx as f32 * tile_size + tile_size / 2.0;
    let y = ty as f32 * tile_size + tile_size - 2.0;
    match step {
        WanderStep::Move(_) => MovementTarget::new(position.x, position.y, x, y),
        WanderStep::Wait => MovementTarget::waiting(position.x, position.y, x, y, wait_ms),
    }
}

pub struct WanderContext<'a> {
    pub layers: &'a [CollisionLayer],
    pub tile_size: f32,
    pub radius: i32,
    pub elapsed_ms: f32,
    /// Full walking speed, used to shorten the final step onto a target.
    pub speed: f32,
    pub freedom: DirectionsOfFreedom,
    pub config: &'a WanderConfig,
}

/// Velocity fraction for one axis: the configured fraction, cut down when a
/// full step would carry the entity past the target.
fn approach(fraction: f32, remaining: f32, step_units: f32) -> f32 {
    if step_units <= 0.0 {
        return fraction;
    }
    fraction.min(remaining.abs() / step_units)
}

/// Steers toward the current target. Returns true when the target was
/// completed and popped this tick.
pub fn head_towards_target(
    ctx: &WanderContext,
    plan: &mut MovementPlan,
    position: &mut GamePosition,
    velocity: &mut IntendedVelocity,
    facing: &mut Facing,
) -> bool {
    let Some(target) = plan.current_target_mut() else {
        plan.phase = WanderPhase::Idle;
        return false;
    };

    let dx_start = axis_sign(target.x() - target.xstart());
    let dy_start = axis_sign(target.y() - target.ystart());
    let dx_progress = axis_sign(target.x() - position.x);
    let dy_progress = axis_sign(target.y() - position.y);

    let dx = if dx_start != dx_progress { 0 } else { dx_progress };
    let dy = if dy_start != dy_progress { 0 } else { dy_progress };

    if dx == 0 {
        position.x = target.x();
    }
    if dy == 0 {
        position.y = target.y();
    }

    let fraction = ctx.config.speed_fraction;
    let step_units = ctx.speed * ctx.elapsed_ms / 1000.0;
    velocity.dx = dx as f32 * approach(fraction, target.x() - position.x, step_units);
    velocity.dy = dy as f32 * approach(fraction, target.y() - position.y, step_units);
    facing.0 = Direction::from_velocity(velocity.dx, velocity.dy, facing.0, ctx.freedom);

    if dx != 0 || dy != 0 {
        plan.phase = WanderPhase::Traveling;
        return false;
    }

    if target.wait {
        target.ttl -= ctx.elapsed_ms;
        if target.ttl <= 0.0 {
            target.wait = false;
        }
        plan.phase = WanderPhase::ArrivedWaiting;
        false
    } else {
        plan.complete_current_target();
        plan.phase = WanderPhase::Idle;
        true
    }
}

/// One planner tick for a wandering entity. Plans of any other kind are left
/// alone. Returns true when a target was completed.
pub fn advance_wander<R: Rng>(
    ctx: &WanderContext,
    rng: &mut R,
    plan: &mut MovementPlan,
    position: &mut GamePosition,
    velocity: &mut IntendedVelocity,
    facing: &mut Facing,
) -> bool {
    if plan.kind != MovementType::Wander {
        return false;
    }
    if plan.current_target().is_none() {
        let tile = position.tile(ctx.tile_size);
        let neighborhood =
            TileNeighborhood::inspect_with_radius(tile.0, tile.1, ctx.radius, ctx.layers);
        let step = choose_wander_step(&neighborhood, rng, ctx.config.wait_chance);
        plan.push_target(create_wander_target(
            step,
            tile,
            position,
            ctx.tile_size,
            ctx.config.wait_ms,
        ));
        plan.phase = WanderPhase::Traveling;
    }
    head_towards_target(ctx, plan, position, velocity, facing)
}

pub(crate) fn plan_wander_movement(
    map: Res<CollisionMap>,
    config: Res<WalkConfig>,
    clock: Res<TickClock>,
    mut rng: ResMut<WanderRng>,
    mut query: Query<(
        &Walker,
        &mut MovementPlan,
        &mut GamePosition,
        &mut IntendedVelocity,
        &mut Facing,
    )>,
) {
    for (walker, mut plan, mut position, mut velocity, mut facing) in query.iter_mut() {
        if plan.kind != MovementType::Wander {
            continue;
        }
        let ctx = WanderContext {
            layers: map.layers(),
            tile_size: config.tile_size,
            radius: config.neighborhood_radius,
            elapsed_ms: clock.elapsed_ms,
            speed: walker.speed,
            freedom: walker.freedom,
            config: &config.wander,
        };
        advance_wander(
            &ctx,
            &mut rng.0,
            &mut plan,
            &mut position,
            &mut velocity,
            &mut facing,
        );
    }
}
