use std::collections::VecDeque;
use std::str::FromStr;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::TilewalkError;

/// Marks the player entity
#[derive(Component)]
pub struct Player;

/// Stable identifier handed to scripts as the primary/secondary entity.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

/// Sub-tile precision position (world units).
///
/// `x` is the horizontal center of the entity, `y` its bottom edge.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct GamePosition {
    pub x: f32,
    pub y: f32,
}

impl GamePosition {
    pub fn tile(&self, tile_size: f32) -> (i32, i32) {
        tile_coordinate(self.x, self.y, tile_size)
    }
}

/// Per-axis movement intent in `[-1, 1]`, scaled by `Walker::speed` when walking.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct IntendedVelocity {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Facing(pub Direction);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionsOfFreedom {
    Four,
    #[default]
    Eight,
}

/// Movement properties of anything that walks over the collision layers.
#[derive(Component, Clone, Copy, Debug, Serialize, Deserialize)]
#[require(
    GamePosition,
    IntendedVelocity,
    Facing,
    MovementPlan,
    crate::triggers::CallTimers
)]
pub struct Walker {
    /// World units per second at full intent.
    pub speed: f32,
    pub width: f32,
    pub height: f32,
    /// Only pushable walkers are moved out of solid tiles.
    #[serde(default)]
    pub pushable: bool,
    #[serde(default)]
    pub freedom: DirectionsOfFreedom,
}

impl Default for Walker {
    fn default() -> Self {
        Self {
            speed: 120.0,
            width: 24.0,
            height: 16.0,
            pushable: false,
            freedom: DirectionsOfFreedom::Eight,
        }
    }
}

pub fn tile_coordinate(x: f32, y: f32, tile_size: f32) -> (i32, i32) {
    let ts = tile_size.max(0.0001);
    ((x / ts).floor() as i32, (y / ts).floor() as i32)
}

/// Sign of `value` as -1, 0 or 1. NaN counts as 0.
pub fn axis_sign(value: f32) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    None,
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

impl Direction {
    pub const COMPASS: [Direction; 8] = [
        Direction::UpLeft,
        Direction::Up,
        Direction::UpRight,
        Direction::Left,
        Direction::Right,
        Direction::DownLeft,
        Direction::Down,
        Direction::DownRight,
    ];

    pub fn is_cardinal(self) -> bool {
        matches!(
            self,
            Direction::Up | Direction::Down | Direction::Left | Direction::Right
        )
    }

    /// Tile offset `(dx, dy)`; y grows downward.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::None => (0, 0),
            Direction::Up => (0, -1),
            Direction::UpRight => (1, -1),
            Direction::Right => (1, 0),
            Direction::DownRight => (1, 1),
            Direction::Down => (0, 1),
            Direction::DownLeft => (-1, 1),
            Direction::Left => (-1, 0),
            Direction::UpLeft => (-1, -1),
        }
    }

    pub fn from_offset(dx: i32, dy: i32) -> Self {
        match (dx.signum(), dy.signum()) {
            (0, -1) => Direction::Up,
            (1, -1) => Direction::UpRight,
            (1, 0) => Direction::Right,
            (1, 1) => Direction::DownRight,
            (0, 1) => Direction::Down,
            (-1, 1) => Direction::DownLeft,
            (-1, 0) => Direction::Left,
            (-1, -1) => Direction::UpLeft,
            _ => Direction::None,
        }
    }

    /// Facing implied by a velocity. A zero velocity keeps `previous`; with
    /// four directions of freedom a diagonal collapses onto one of its
    /// components, preferring whichever one the entity already faces.
    pub fn from_velocity(
        dx: f32,
        dy: f32,
        previous: Direction,
        freedom: DirectionsOfFreedom,
    ) -> Self {
        let sx = axis_sign(dx);
        let sy = axis_sign(dy);
        if sx == 0 && sy == 0 {
            return previous;
        }
        let exact = Direction::from_offset(sx, sy);
        if freedom == DirectionsOfFreedom::Eight || exact.is_cardinal() {
            return exact;
        }
        let horizontal = Direction::from_offset(sx, 0);
        let vertical = Direction::from_offset(0, sy);
        if previous == vertical {
            vertical
        } else {
            horizontal
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    #[default]
    Stationary,
    PlayerControlled,
    Wander,
}

impl FromStr for MovementType {
    type Err = TilewalkError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "stationary" => Ok(Self::Stationary),
            "player" | "playercontrolled" | "player_controlled" => Ok(Self::PlayerControlled),
            "wander" => Ok(Self::Wander),
            _ => Err(TilewalkError::UnknownMovementType(value.to_string())),
        }
    }
}

/// One leg of a movement plan. The start and destination never change once
/// the target exists; only the wait state counts down.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementTarget {
    xstart: f32,
    ystart: f32,
    x: f32,
    y: f32,
    pub wait: bool,
    /// Remaining wait in milliseconds.
    pub ttl: f32,
}

impl MovementTarget {
    pub fn new(xstart: f32, ystart: f32, x: f32, y: f32) -> Self {
        Self {
            xstart,
            ystart,
            x,
            y,
            wait: false,
            ttl: 0.0,
        }
    }

    pub fn waiting(xstart: f32, ystart: f32, x: f32, y: f32, ttl: f32) -> Self {
        Self {
            wait: true,
            ttl,
            ..Self::new(xstart, ystart, x, y)
        }
    }

    pub fn xstart(&self) -> f32 {
        self.xstart
    }

    pub fn ystart(&self) -> f32 {
        self.ystart
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum WanderPhase {
    #[default]
    Idle,
    Traveling,
    ArrivedWaiting,
}

#[derive(Component, Clone, Debug, Default)]
pub struct MovementPlan {
    pub kind: MovementType,
    targets: VecDeque<MovementTarget>,
    pub phase: WanderPhase,
}

impl MovementPlan {
    pub fn new(kind: MovementType) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn current_target(&self) -> Option<&MovementTarget> {
        self.targets.front()
    }

    pub fn current_target_mut(&mut self) -> Option<&mut MovementTarget> {
        self.targets.front_mut()
    }

    pub fn push_target(&mut self, target: MovementTarget) {
        self.targets.push_back(target);
    }

    /// Pops the current target. Popping an empty plan does nothing.
    pub fn complete_current_target(&mut self) -> Option<MovementTarget> {
        self.targets.pop_front()
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WanderConfig {
    pub wait_ms: f32,
    /// Fraction of `Walker::speed` used while wandering.
    pub speed_fraction: f32,
    /// Probability that a new wander step is a wait instead of a move.
    pub wait_chance: f64,
    pub seed: u64,
}

impl Default for WanderConfig {
    fn default() -> Self {
        Self {
            wait_ms: 1000.0,
            speed_fraction: 0.25,
            wait_chance: 0.5,
            seed: 0,
        }
    }
}

/// Walk constants (as a resource so they can be tuned)
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    pub tile_size: f32,
    /// Radius of the inspected tile window; 1 gives the 3x3 neighborhood.
    pub neighborhood_radius: i32,
    pub wander: WanderConfig,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            tile_size: 32.0,
            neighborhood_radius: 1,
            wander: WanderConfig::default(),
        }
    }
}

/// Elapsed time of the tick being simulated, filled once per frame.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct TickClock {
    pub elapsed_ms: f32,
    pub frame: u64,
}

/// Direction the player wants to move this tick.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct PlayerInput {
    pub dx: f32,
    pub dy: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_type_parses_known_labels() {
        assert_eq!("Wander".parse::<MovementType>().ok(), Some(MovementType::Wander));
        assert_eq!(
            " player ".parse::<MovementType>().ok(),
            Some(MovementType::PlayerControlled)
        );
        assert_eq!(
            "Stationary".parse::<MovementType>().ok(),
            Some(MovementType::Stationary)
        );
    }

    #[test]
    fn movement_type_rejects_unknown_labels() {
        let err = "flying".parse::<MovementType>().expect_err("should reject");
        assert!(matches!(err, TilewalkError::UnknownMovementType(ref v) if v == "flying"));
    }

    #[test]
    fn facing_keeps_previous_when_still() {
        let facing =
            Direction::from_velocity(0.0, 0.0, Direction::Left, DirectionsOfFreedom::Eight);
        assert_eq!(facing, Direction::Left);
    }

    #[test]
    fn facing_collapses_diagonals_with_four_directions() {
        let eight =
            Direction::from_velocity(0.25, -0.25, Direction::Down, DirectionsOfFreedom::Eight);
        assert_eq!(eight, Direction::UpRight);
        let four =
            Direction::from_velocity(0.25, -0.25, Direction::Down, DirectionsOfFreedom::Four);
        assert_eq!(four, Direction::Right);
        let keep_vertical =
            Direction::from_velocity(0.25, -0.25, Direction::Up, DirectionsOfFreedom::Four);
        assert_eq!(keep_vertical, Direction::Up);
    }

    #[test]
    fn offsets_round_trip_through_compass() {
        for dir in Direction::COMPASS {
            let (dx, dy) = dir.offset();
            assert_eq!(Direction::from_offset(dx, dy), dir);
        }
    }

    #[test]
    fn empty_plan_pop_is_a_no_op() {
        let mut plan = MovementPlan::new(MovementType::Wander);
        assert!(plan.complete_current_target().is_none());
        assert!(plan.current_target().is_none());
    }

    #[test]
    fn tile_coordinate_floors_negative_positions() {
        assert_eq!(tile_coordinate(-1.0, 33.0, 32.0), (-1, 1));
    }
}
