use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::ai::{advance_wander, WanderContext};
use crate::components::{
    Direction, Facing, GamePosition, IntendedVelocity, MovementPlan, MovementType, PlayerInput,
    WalkConfig, Walker,
};
use crate::error::TilewalkError;
use crate::physics_core::{resolve_walk, WalkParams};
use crate::script_call::ScriptCallBatch;
use crate::tilemap::{CollisionLayer, CollisionMap};
use crate::triggers::{dispatch_calls, CallTimers, TriggerContext};

#[derive(Deserialize, Clone)]
pub struct SimulationRequest {
    /// Replaces the loaded map's layers when present.
    pub layers: Option<Vec<CollisionLayer>>,
    pub actors: Vec<SimActorSpec>,
    #[serde(default)]
    pub inputs: Vec<SimInput>,
    pub max_frames: u32,
    #[serde(default = "default_record_interval")]
    pub record_interval: u32,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: f32,
    pub seed: Option<u64>,
}

fn default_record_interval() -> u32 {
    1
}

fn default_tick_ms() -> f32 {
    1000.0 / 60.0
}

#[derive(Deserialize, Clone)]
pub struct SimActorSpec {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_movement")]
    pub movement: String,
    #[serde(default)]
    pub walker: Walker,
}

fn default_movement() -> String {
    "stationary".to_string()
}

/// Held input: `left`, `right`, `up` or `down` from `frame` for `duration`
/// frames. Drives every player-controlled actor.
#[derive(Deserialize, Clone)]
pub struct SimInput {
    pub frame: u32,
    pub action: String,
    #[serde(default)]
    pub duration: u32,
}

impl SimInput {
    /// A zero duration still holds the action for its starting frame.
    pub fn is_held(&self, frame: u32) -> bool {
        frame >= self.frame && frame < self.frame.saturating_add(self.duration.max(1))
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct SimulationResult {
    pub frames_elapsed: u32,
    pub trace: Vec<TraceFrame>,
    pub calls: Vec<SimCall>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TraceFrame {
    pub frame: u32,
    pub actor: u64,
    pub x: f32,
    pub y: f32,
    pub facing: Direction,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SimCall {
    pub frame: u32,
    pub name: String,
    pub primary: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<u64>,
    pub layer: String,
}

/// Everything one entity carries between ticks, outside the ECS.
#[derive(Clone, Debug)]
pub struct SimActor {
    pub id: u64,
    pub position: GamePosition,
    pub velocity: IntendedVelocity,
    pub facing: Facing,
    pub walker: Walker,
    pub plan: MovementPlan,
    pub timers: CallTimers,
}

impl SimActor {
    pub fn new(id: u64, x: f32, y: f32, walker: Walker, kind: MovementType) -> Self {
        Self {
            id,
            position: GamePosition { x, y },
            velocity: IntendedVelocity::default(),
            facing: Facing::default(),
            walker,
            plan: MovementPlan::new(kind),
            timers: CallTimers::default(),
        }
    }

    pub fn from_spec(spec: &SimActorSpec) -> Result<Self, TilewalkError> {
        let kind = spec.movement.parse::<MovementType>().map_err(|source| {
            TilewalkError::UnknownActorMovement {
                actor: spec.id,
                source: Box::new(source),
            }
        })?;
        Ok(Self::new(spec.id, spec.x, spec.y, spec.walker, kind))
    }
}

/// One tick for one actor: plan, walk, then queue triggered calls.
pub fn advance_actor<R: Rng>(
    actor: &mut SimActor,
    layers: &[CollisionLayer],
    config: &WalkConfig,
    elapsed_ms: f32,
    input: PlayerInput,
    rng: &mut R,
    batch: &mut ScriptCallBatch,
) {
    let ts = config.tile_size;
    match actor.plan.kind {
        MovementType::Wander => {
            let ctx = WanderContext {
                layers,
                tile_size: ts,
                radius: config.neighborhood_radius,
                elapsed_ms,
                speed: actor.walker.speed,
                freedom: actor.walker.freedom,
                config: &config.wander,
            };
            advance_wander(
                &ctx,
                rng,
                &mut actor.plan,
                &mut actor.position,
                &mut actor.velocity,
                &mut actor.facing,
            );
        }
        MovementType::PlayerControlled => {
            actor.velocity.dx = input.dx.clamp(-1.0, 1.0);
            actor.velocity.dy = input.dy.clamp(-1.0, 1.0);
            actor.facing.0 = Direction::from_velocity(
                actor.velocity.dx,
                actor.velocity.dy,
                actor.facing.0,
                actor.walker.freedom,
            );
        }
        MovementType::Stationary => {}
    }

    let outcome = resolve_walk(
        layers,
        WalkParams {
            tile_size: ts,
            radius: config.neighborhood_radius,
            elapsed_ms,
            x: actor.position.x,
            y: actor.position.y,
            dx: actor.velocity.dx,
            dy: actor.velocity.dy,
            speed: actor.walker.speed,
            width: actor.walker.width,
            height: actor.walker.height,
            pushable: actor.walker.pushable,
            facing: actor.facing.0,
        },
    );
    actor.position.x = outcome.x;
    actor.position.y = outcome.y;

    let ctx = TriggerContext {
        layers,
        actor: actor.id,
        tile: actor.position.tile(ts),
        elapsed_ms,
    };
    dispatch_calls(&ctx, &outcome.events, &mut actor.timers, batch);
}

fn input_for(actions: &[&str]) -> PlayerInput {
    let mut input = PlayerInput::default();
    for action in actions {
        match *action {
            "left" => input.dx -= 1.0,
            "right" => input.dx += 1.0,
            "up" => input.dy -= 1.0,
            "down" => input.dy += 1.0,
            _ => {}
        }
    }
    input
}

pub fn run_simulation(
    map: &CollisionMap,
    config: &WalkConfig,
    request: &SimulationRequest,
) -> Result<SimulationResult, TilewalkError> {
    let layers = request.layers.as_deref().unwrap_or(map.layers());
    let mut actors = request
        .actors
        .iter()
        .map(SimActor::from_spec)
        .collect::<Result<Vec<_>, _>>()?;
    let mut rng = SmallRng::seed_from_u64(request.seed.unwrap_or(config.wander.seed));

    let mut trace = Vec::new();
    let mut calls = Vec::new();
    let mut batch = ScriptCallBatch::default();

    for frame in 0..request.max_frames {
        let held: Vec<&str> = request
            .inputs
            .iter()
            .filter(|input| input.is_held(frame))
            .map(|input| input.action.as_str())
            .collect();
        let input = input_for(&held);
        for actor in &mut actors {
            advance_actor(
                actor,
                layers,
                config,
                request.tick_ms,
                input,
                &mut rng,
                &mut batch,
            );
        }
        calls.extend(batch.take().into_iter().map(|call| SimCall {
            frame,
            name: call.name,
            primary: call.primary,
            secondary: call.secondary,
            layer: call.source_layer,
        }));

        if request.record_interval > 0 && frame % request.record_interval == 0 {
            trace.extend(actors.iter().map(|actor| TraceFrame {
                frame,
                actor: actor.id,
                x: actor.position.x,
                y: actor.position.y,
                facing: actor.facing.0,
            }));
        }
    }

    Ok(SimulationResult {
        frames_elapsed: request.max_frames,
        trace,
        calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(value: serde_json::Value) -> SimulationRequest {
        serde_json::from_value(value).expect("request json")
    }

    #[test]
    fn player_pressing_the_map_edge_fires_the_edge_call_once() {
        let tiles = vec![0; 16];
        let req = request(serde_json::json!({
            "layers": [{
                "name": "@collision-edge",
                "width": 4,
                "height": 4,
                "tiles": tiles,
                "right_call": "leave_east",
                "collision_call_interval": 1000.0
            }],
            "actors": [{
                "id": 1,
                "x": 100.0,
                "y": 60.0,
                "movement": "player",
                "walker": { "speed": 120.0, "width": 24.0, "height": 16.0, "pushable": true }
            }],
            "inputs": [{ "frame": 0, "action": "right", "duration": 30 }],
            "max_frames": 30,
            "tick_ms": 16.0
        }));
        let result =
            run_simulation(&CollisionMap::default(), &WalkConfig::default(), &req).expect("run");

        assert_eq!(result.calls.len(), 1);
        assert_eq!(result.calls[0].name, "leave_east");
        assert_eq!(result.calls[0].primary, 1);
        assert_eq!(result.calls[0].layer, "@collision-edge");

        let last = result.trace.last().expect("trace");
        assert!(last.x + 12.0 <= 128.0 + 1e-3);
        assert!(last.x > 110.0);
        assert_eq!(last.facing, Direction::Right);
    }

    #[test]
    fn unknown_movement_names_the_actor() {
        let req = request(serde_json::json!({
            "actors": [{ "id": 5, "x": 0.0, "y": 0.0, "movement": "flying" }],
            "max_frames": 1
        }));
        let err = run_simulation(&CollisionMap::test_level(), &WalkConfig::default(), &req)
            .expect_err("should reject");
        assert!(matches!(err, TilewalkError::UnknownActorMovement { actor: 5, .. }));
    }

    #[test]
    fn wanderers_are_deterministic_and_stay_on_open_tiles() {
        let map = CollisionMap::test_level();
        let config = WalkConfig::default();
        let req = request(serde_json::json!({
            "actors": [
                { "id": 1, "x": 112.0, "y": 126.0, "movement": "wander",
                  "walker": { "speed": 120.0, "width": 24.0, "height": 16.0, "pushable": true } },
                { "id": 2, "x": 304.0, "y": 254.0, "movement": "Wander",
                  "walker": { "speed": 120.0, "width": 24.0, "height": 16.0, "pushable": true } }
            ],
            "max_frames": 600,
            "record_interval": 10,
            "seed": 11
        }));
        let first = run_simulation(&map, &config, &req).expect("run");
        let second = run_simulation(&map, &config, &req).expect("run");
        assert_eq!(first.trace, second.trace);
        assert_eq!(first.trace.len(), 120);

        let walls = &map.layers()[0];
        for frame in &first.trace {
            let (tx, ty) = GamePosition {
                x: frame.x,
                y: frame.y,
            }
            .tile(config.tile_size);
            assert!(!walls.probe(tx, ty).blocks_motion(walls), "actor {} in a wall", frame.actor);
        }
    }

    #[test]
    fn inputs_are_held_for_their_duration() {
        let tap = SimInput {
            frame: 5,
            action: "left".to_string(),
            duration: 0,
        };
        assert!(!tap.is_held(4));
        assert!(tap.is_held(5));
        assert!(!tap.is_held(6));

        let hold = SimInput {
            frame: u32::MAX - 1,
            action: "up".to_string(),
            duration: 10,
        };
        assert!(hold.is_held(u32::MAX - 1));
        assert!(!hold.is_held(3));
    }

    #[test]
    fn held_inputs_combine_into_diagonals() {
        let input = input_for(&["up", "right"]);
        assert_eq!((input.dx, input.dy), (1.0, -1.0));
        assert_eq!(input_for(&[]).dx, 0.0);
    }
}
