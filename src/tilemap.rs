use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::Direction;

/// Value reported for cells outside the map. Any positive value would do.
pub const BOUNDARY_TILE_VALUE: i32 = 1337;

/// One collision plane of the loaded map. Tiles are row-major, `0` (or any
/// non-positive value) is empty.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CollisionLayer {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<i32>,
    /// Occupied tiles fire triggers but never block motion.
    #[serde(default)]
    pub passthrough: bool,
    #[serde(default)]
    pub collision_call: Option<String>,
    /// Debounce window in milliseconds.
    #[serde(default)]
    pub collision_call_interval: f32,
    #[serde(default)]
    pub up_call: Option<String>,
    #[serde(default)]
    pub down_call: Option<String>,
    #[serde(default)]
    pub left_call: Option<String>,
    #[serde(default)]
    pub right_call: Option<String>,
}

/// Result of reading one cell of a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileProbe {
    pub value: i32,
    pub map_boundary: bool,
    /// The cell is inside the declared size but the tile data is too short.
    pub malformed: bool,
}

impl TileProbe {
    pub fn occupied(&self) -> bool {
        self.value > 0
    }

    pub fn blocks_motion(&self, layer: &CollisionLayer) -> bool {
        self.malformed || (self.occupied() && !layer.passthrough)
    }
}

impl CollisionLayer {
    pub fn new(name: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            tiles: vec![0; width * height],
            ..Default::default()
        }
    }

    pub fn with_tiles(mut self, cells: &[(usize, usize)]) -> Self {
        for &(x, y) in cells {
            self.set_tile(x as i32, y as i32, 1);
        }
        self
    }

    pub fn set_tile(&mut self, x: i32, y: i32, value: i32) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            let index = y as usize * self.width + x as usize;
            if let Some(tile) = self.tiles.get_mut(index) {
                *tile = value;
            }
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.tiles.len() < self.width * self.height
    }

    pub fn probe(&self, x: i32, y: i32) -> TileProbe {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return TileProbe {
                value: BOUNDARY_TILE_VALUE,
                map_boundary: true,
                malformed: false,
            };
        }
        let index = y as usize * self.width + x as usize;
        match self.tiles.get(index) {
            Some(&value) => TileProbe {
                value,
                map_boundary: false,
                malformed: false,
            },
            None => TileProbe {
                value: BOUNDARY_TILE_VALUE,
                map_boundary: true,
                malformed: true,
            },
        }
    }

    /// Script fired when an entity facing `facing` runs into the map edge.
    pub fn direction_call(&self, facing: Direction) -> Option<&str> {
        let call = match facing {
            Direction::Up => self.up_call.as_deref(),
            Direction::Down => self.down_call.as_deref(),
            Direction::Left => self.left_call.as_deref(),
            Direction::Right => self.right_call.as_deref(),
            _ => None,
        };
        call.filter(|name| !name.is_empty())
    }
}

#[derive(Resource, Clone, Debug, Default, Serialize, Deserialize)]
pub struct CollisionMap {
    pub layers: Vec<CollisionLayer>,
}

impl CollisionMap {
    pub fn new(layers: Vec<CollisionLayer>) -> Self {
        for layer in layers.iter().filter(|l| l.is_malformed()) {
            warn!(
                "[Tilewalk map] Layer '{}' declares {}x{} but has {} tiles; missing cells act as solid boundary",
                layer.name,
                layer.width,
                layer.height,
                layer.tiles.len()
            );
        }
        Self { layers }
    }

    pub fn layers(&self) -> &[CollisionLayer] {
        &self.layers
    }

    /// A walled room with a pond and a doorway, for development
    pub fn test_level() -> Self {
        let width = 16;
        let height = 12;

        let mut walls = CollisionLayer::new("@collision-walls", width, height);
        for x in 0..width as i32 {
            walls.set_tile(x, 0, 1);
            walls.set_tile(x, height as i32 - 1, 1);
        }
        for y in 0..height as i32 {
            walls.set_tile(0, y, 1);
            walls.set_tile(width as i32 - 1, y, 1);
        }
        // Doorway on the right wall leads to the map edge.
        walls.set_tile(width as i32 - 1, 5, 0);
        walls.set_tile(width as i32 - 1, 6, 0);
        // A pillar to walk around.
        walls.set_tile(6, 4, 1);
        walls.set_tile(6, 5, 1);

        let mut pond = CollisionLayer::new("@collision-pond", width, height);
        pond.passthrough = true;
        pond.collision_call = Some("splash".to_string());
        pond.collision_call_interval = 500.0;
        for y in 7..9 {
            for x in 3..6 {
                pond.set_tile(x, y, 1);
            }
        }

        let mut edge = CollisionLayer::new("@collision-edge", width, height);
        edge.right_call = Some("leave_east".to_string());
        edge.collision_call_interval = 1000.0;

        Self::new(vec![walls, pond, edge])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_flags_cells_outside_the_map() {
        let layer = CollisionLayer::new("walls", 4, 4);
        let probe = layer.probe(-1, 2);
        assert!(probe.map_boundary);
        assert!(probe.occupied());
        assert!(!probe.malformed);
        assert!(!layer.probe(1, 1).occupied());
    }

    #[test]
    fn short_tile_data_probes_as_solid_boundary() {
        let mut layer = CollisionLayer::new("broken", 4, 4);
        layer.passthrough = true;
        layer.tiles.truncate(6);
        assert!(layer.is_malformed());
        let probe = layer.probe(3, 3);
        assert!(probe.malformed);
        assert!(probe.map_boundary);
        assert!(probe.blocks_motion(&layer));
        assert!(!layer.probe(1, 0).blocks_motion(&layer));
    }

    #[test]
    fn passthrough_boundary_is_occupied_but_not_blocking() {
        let mut layer = CollisionLayer::new("water", 2, 2);
        layer.passthrough = true;
        let probe = layer.probe(2, 0);
        assert!(probe.occupied());
        assert!(!probe.blocks_motion(&layer));
    }

    #[test]
    fn direction_call_follows_facing() {
        let mut layer = CollisionLayer::new("edge", 2, 2);
        layer.up_call = Some("north".to_string());
        layer.left_call = Some(String::new());
        assert_eq!(layer.direction_call(Direction::Up), Some("north"));
        assert_eq!(layer.direction_call(Direction::Left), None);
        assert_eq!(layer.direction_call(Direction::UpLeft), None);
    }

    #[test]
    fn layers_deserialize_with_defaults() {
        let layer: CollisionLayer = serde_json::from_value(serde_json::json!({
            "name": "@collision-lava",
            "width": 2,
            "height": 1,
            "tiles": [0, 5],
            "collision_call": "burn",
            "collision_call_interval": 250.0
        }))
        .expect("layer json");
        assert!(!layer.passthrough);
        assert_eq!(layer.collision_call.as_deref(), Some("burn"));
        assert_eq!(layer.probe(1, 0).value, 5);
    }
}
