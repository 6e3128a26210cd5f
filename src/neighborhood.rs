use crate::components::Direction;
use crate::tilemap::CollisionLayer;

pub const DEFAULT_RADIUS: i32 = 1;

/// One cell of an inspected neighborhood. Flags are rebuilt every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileTrack {
    /// Offset from the center tile.
    pub dx: i32,
    pub dy: i32,
    /// Absolute tile coordinate.
    pub x: i32,
    pub y: i32,
    pub solid: bool,
    pub map_boundary: bool,
    /// Any layer has a positive value here, passthrough or not.
    pub occupied: bool,
}

/// Square window of tiles around a center tile, classified across all
/// collision layers.
///
/// Rows and columns are zero based from the top-left corner, so the center of
/// a 3x3 window is `(1, 1)`, `Up` is `(0, 1)` and `UpLeft` is `(0, 0)`.
#[derive(Clone, Debug)]
pub struct TileNeighborhood {
    center_x: i32,
    center_y: i32,
    radius: i32,
    tracks: Vec<TileTrack>,
}

impl TileNeighborhood {
    /// An unclassified window: every cell open.
    pub fn new(center_x: i32, center_y: i32, radius: i32) -> Self {
        let radius = radius.max(1);
        let mut tracks = Vec::with_capacity(((radius * 2 + 1) * (radius * 2 + 1)) as usize);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                tracks.push(TileTrack {
                    dx,
                    dy,
                    x: center_x + dx,
                    y: center_y + dy,
                    ..Default::default()
                });
            }
        }
        Self {
            center_x,
            center_y,
            radius,
            tracks,
        }
    }

    pub fn inspect(center_x: i32, center_y: i32, layers: &[CollisionLayer]) -> Self {
        Self::inspect_with_radius(center_x, center_y, DEFAULT_RADIUS, layers)
    }

    pub fn inspect_with_radius(
        center_x: i32,
        center_y: i32,
        radius: i32,
        layers: &[CollisionLayer],
    ) -> Self {
        let mut neighborhood = Self::new(center_x, center_y, radius);
        for track in &mut neighborhood.tracks {
            for layer in layers {
                let probe = layer.probe(track.x, track.y);
                if probe.map_boundary {
                    track.map_boundary = true;
                }
                if probe.occupied() {
                    track.occupied = true;
                }
                if probe.blocks_motion(layer) {
                    track.solid = true;
                }
            }
        }
        neighborhood
    }

    pub fn center(&self) -> (i32, i32) {
        (self.center_x, self.center_y)
    }

    /// Cells per side.
    pub fn side(&self) -> usize {
        (self.radius * 2 + 1) as usize
    }

    pub fn tracks(&self) -> &[TileTrack] {
        &self.tracks
    }

    pub fn track(&self, row: usize, col: usize) -> Option<&TileTrack> {
        let side = self.side();
        if row >= side || col >= side {
            return None;
        }
        self.tracks.get(row * side + col)
    }

    /// Cells outside the window read as solid.
    pub fn is_solid(&self, row: usize, col: usize) -> bool {
        self.track(row, col).map_or(true, |t| t.solid)
    }

    pub fn is_map_boundary(&self, row: usize, col: usize) -> bool {
        self.track(row, col).map_or(true, |t| t.map_boundary)
    }

    pub fn track_at(&self, direction: Direction) -> &TileTrack {
        let (dx, dy) = direction.offset();
        let r = self.radius;
        let index = ((dy + r) * (r * 2 + 1) + (dx + r)) as usize;
        &self.tracks[index]
    }

    pub fn is_open(&self, direction: Direction) -> bool {
        !self.track_at(direction).solid
    }

    /// Directions an entity on the center tile can step toward. Straight
    /// directions need their own cell clear; diagonals also need both
    /// neighbouring straight cells clear so nothing cuts a corner.
    pub fn open_directions(&self) -> Vec<Direction> {
        Direction::COMPASS
            .into_iter()
            .filter(|&direction| {
                let (dx, dy) = direction.offset();
                if !self.is_open(direction) {
                    return false;
                }
                if dx != 0 && dy != 0 {
                    self.is_open(Direction::from_offset(dx, 0))
                        && self.is_open(Direction::from_offset(0, dy))
                } else {
                    true
                }
            })
            .collect()
    }
}
