use crate::collision_events::CollisionEvents;
use crate::components::{tile_coordinate, Direction};
use crate::neighborhood::TileNeighborhood;
use crate::tilemap::CollisionLayer;

/// Extra unit below the anchor so an entity resting exactly on a tile edge is
/// not read as embedded in the tile beneath it.
pub const FOOT_BIAS: f32 = 1.0;

// Lean thresholds within the current tile: x lean for vertical motion, y lean
// for horizontal motion.
const VERTICAL_SLIDE_LOW: f32 = 0.4;
const VERTICAL_SLIDE_HIGH: f32 = 0.6;
const HORIZONTAL_SLIDE_LOW: f32 = 0.15;
const HORIZONTAL_SLIDE_HIGH: f32 = 0.85;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    /// Box for an entity anchored at its horizontal center and bottom edge.
    pub fn from_anchor(x: f32, y: f32, width: f32, height: f32) -> Self {
        let hw = width / 2.0;
        Self {
            min_x: x - hw,
            min_y: y - height,
            max_x: x + hw,
            max_y: y + FOOT_BIAS,
        }
    }

    pub fn tile(tx: i32, ty: i32, tile_size: f32) -> Self {
        let x = tx as f32 * tile_size;
        let y = ty as f32 * tile_size;
        Self {
            min_x: x,
            min_y: y,
            max_x: x + tile_size,
            max_y: y + tile_size,
        }
    }

    fn half_extents(&self) -> (f32, f32) {
        ((self.max_x - self.min_x) / 2.0, (self.max_y - self.min_y) / 2.0)
    }

    fn center(&self) -> (f32, f32) {
        let (hw, hh) = self.half_extents();
        (self.min_x + hw, self.min_y + hh)
    }
}

/// Minimum translation that moves `mover` out of `obstacle`, along the axis
/// of least penetration. Touching boxes, and boxes that penetrate equally on
/// both axes (two flush tiles meeting at an edge), yield no push.
pub fn calculate_push(mover: &Aabb, obstacle: &Aabb) -> (f32, f32) {
    let (xhalf1, yhalf1) = mover.half_extents();
    let (xhalf2, yhalf2) = obstacle.half_extents();
    let (xcenter1, ycenter1) = mover.center();
    let (xcenter2, ycenter2) = obstacle.center();

    let xdelta = xcenter1 - xcenter2;
    let ydelta = ycenter1 - ycenter2;

    let xintersect = xdelta.abs() - (xhalf1 + xhalf2);
    let yintersect = ydelta.abs() - (yhalf1 + yhalf2);

    if xintersect >= 0.0 || yintersect >= 0.0 {
        return (0.0, 0.0);
    }
    if xintersect > yintersect {
        let xpush = if xdelta > 0.0 { -xintersect } else { xintersect };
        (xpush, 0.0)
    } else if xintersect < yintersect {
        let ypush = if ydelta > 0.0 { -yintersect } else { yintersect };
        (0.0, ypush)
    } else {
        (0.0, 0.0)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WalkParams {
    pub tile_size: f32,
    pub radius: i32,
    pub elapsed_ms: f32,
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub speed: f32,
    pub width: f32,
    pub height: f32,
    pub pushable: bool,
    pub facing: Direction,
}

#[derive(Clone, Debug)]
pub struct WalkOutcome {
    pub x: f32,
    pub y: f32,
    pub xpush: f32,
    pub ypush: f32,
    pub slid: bool,
    pub events: CollisionEvents,
}

/// Moves an entity by its intended velocity and pushes it back out of any
/// solid tile in the neighborhood of its current tile.
///
/// Displacement per call is assumed to stay under one tile; larger steps
/// can skip past a tile entirely.
pub fn resolve_walk(layers: &[CollisionLayer], params: WalkParams) -> WalkOutcome {
    let WalkParams {
        tile_size,
        radius,
        elapsed_ms,
        x,
        y,
        dx,
        dy,
        speed,
        width,
        height,
        pushable,
        facing,
    } = params;

    let step = speed * elapsed_ms / 1000.0;
    let xprojected = x + dx * step;
    let yprojected = y + dy * step;
    let projected = Aabb::from_anchor(xprojected, yprojected, width, height);

    let (center_x, center_y) = tile_coordinate(x, y, tile_size);
    let neighborhood = TileNeighborhood::inspect_with_radius(center_x, center_y, radius, layers);

    let mut events = CollisionEvents::new(facing);
    let mut xpush = 0.0f32;
    let mut ypush = 0.0f32;

    for track in neighborhood.tracks() {
        for (index, layer) in layers.iter().enumerate() {
            let probe = layer.probe(track.x, track.y);
            if !probe.occupied() {
                continue;
            }
            let tile = Aabb::tile(track.x, track.y, tile_size);
            let (xexpected, yexpected) = calculate_push(&projected, &tile);
            if xexpected == 0.0 && yexpected == 0.0 {
                continue;
            }
            if pushable && probe.blocks_motion(layer) {
                if xexpected.abs() > xpush.abs() {
                    xpush = xexpected;
                }
                if yexpected.abs() > ypush.abs() {
                    ypush = yexpected;
                }
            }
            events.record_overlap(index, track.x, track.y, probe.map_boundary);
        }
    }

    let mut slid = false;
    let single_axis_block = (xpush != 0.0) != (ypush != 0.0);
    if single_axis_block && facing.is_cardinal() {
        if let Some((xslide, yslide)) =
            assisted_slide(facing, x, y, tile_size, &neighborhood, xpush, ypush)
        {
            xpush = xslide;
            ypush = yslide;
            slid = true;
        }
    }

    WalkOutcome {
        x: xprojected + xpush,
        y: yprojected + ypush,
        xpush,
        ypush,
        slid,
        events,
    }
}

/// Nudges an entity that walks straight into a tile near its corner so it
/// rounds the corner instead of stopping.
///
/// The lean is the entity's position within its current tile along the axis
/// it is not moving on. When it leans toward a clear diagonal, or when the
/// cell straight ahead is clear and only a corner blocks it, a push equal to
/// the blocking push is added on the cross axis. Returns `None` when no
/// slide applies.
fn assisted_slide(
    facing: Direction,
    x: f32,
    y: f32,
    tile_size: f32,
    neighborhood: &TileNeighborhood,
    xpush: f32,
    ypush: f32,
) -> Option<(f32, f32)> {
    let (center_x, center_y) = neighborhood.center();
    let x_percent = (x - center_x as f32 * tile_size) / tile_size;
    let y_percent = (y - center_y as f32 * tile_size) / tile_size;
    let (ahead_dx, ahead_dy) = facing.offset();

    match facing {
        Direction::Up | Direction::Down if ypush != 0.0 => {
            let push = ypush.abs();
            let ahead_left = Direction::from_offset(-1, ahead_dy);
            let ahead_right = Direction::from_offset(1, ahead_dy);
            let xslide = if neighborhood.is_open(facing) {
                if x_percent < 0.5 {
                    push
                } else {
                    -push
                }
            } else if neighborhood.is_open(ahead_left) && x_percent < VERTICAL_SLIDE_LOW {
                -push
            } else if neighborhood.is_open(ahead_right) && x_percent > VERTICAL_SLIDE_HIGH {
                push
            } else {
                return None;
            };
            Some((xslide, ypush))
        }
        Direction::Left | Direction::Right if xpush != 0.0 => {
            let push = xpush.abs();
            let ahead_up = Direction::from_offset(ahead_dx, -1);
            let ahead_down = Direction::from_offset(ahead_dx, 1);
            let yslide = if neighborhood.is_open(facing) {
                if y_percent < 0.5 {
                    push
                } else {
                    -push
                }
            } else if neighborhood.is_open(ahead_up) && y_percent < HORIZONTAL_SLIDE_LOW {
                -push
            } else if neighborhood.is_open(ahead_down) && y_percent > HORIZONTAL_SLIDE_HIGH {
                push
            } else {
                return None;
            };
            Some((xpush, yslide))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: f32 = 40.0;

    fn walls(width: usize, height: usize, solids: &[(usize, usize)]) -> Vec<CollisionLayer> {
        vec![CollisionLayer::new("walls", width, height).with_tiles(solids)]
    }

    fn walk(x: f32, y: f32, dx: f32, dy: f32, facing: Direction) -> WalkParams {
        WalkParams {
            tile_size: TS,
            radius: 1,
            elapsed_ms: 100.0,
            x,
            y,
            dx,
            dy,
            speed: 100.0,
            width: 16.0,
            height: 16.0,
            pushable: true,
            facing,
        }
    }

    #[test]
    fn push_moves_box_out_along_shallow_axis() {
        let mover = Aabb {
            min_x: 30.0,
            min_y: 10.0,
            max_x: 46.0,
            max_y: 30.0,
        };
        let tile = Aabb::tile(1, 0, TS);
        let (xpush, ypush) = calculate_push(&mover, &tile);
        assert!((xpush + 6.0).abs() < 1e-4);
        assert_eq!(ypush, 0.0);
    }

    #[test]
    fn equal_penetration_is_not_pushed() {
        let mover = Aabb {
            min_x: 30.0,
            min_y: 30.0,
            max_x: 50.0,
            max_y: 50.0,
        };
        let tile = Aabb::tile(1, 1, TS);
        assert_eq!(calculate_push(&mover, &tile), (0.0, 0.0));
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        let mover = Aabb::from_anchor(32.0, 39.0, 16.0, 16.0);
        let tile = Aabb::tile(1, 0, TS);
        assert_eq!(calculate_push(&mover, &tile), (0.0, 0.0));
    }

    #[test]
    fn wall_is_never_tunneled_through() {
        let solids: Vec<(usize, usize)> = (0..5).map(|y| (5, y)).collect();
        let layers = walls(8, 5, &solids);
        let mut x = 100.0;
        let y = 100.0;
        for _ in 0..40 {
            let out = resolve_walk(&layers, walk(x, y, 1.0, 0.0, Direction::Right));
            x = out.x;
            assert!(x + 8.0 <= 200.0 + 1e-3, "entity entered the wall at x={x}");
        }
        assert!((x - 192.0).abs() < 1e-3);
    }

    #[test]
    fn corner_assist_slides_toward_open_up_right() {
        let layers = walls(4, 4, &[(0, 1), (1, 1)]);
        let out = resolve_walk(&layers, walk(68.0, 96.0, 0.0, -1.0, Direction::Up));
        assert!(out.slid);
        assert!(out.xpush > 0.0);
        assert_eq!(out.xpush, out.ypush.abs());
        assert!((out.x - 78.0).abs() < 1e-4);
        assert!((out.y - 96.0).abs() < 1e-4);
    }

    #[test]
    fn corner_assist_threshold_is_exclusive_on_the_right() {
        let layers = walls(4, 4, &[(0, 1), (1, 1)]);
        let out = resolve_walk(&layers, walk(64.0, 96.0, 0.0, -1.0, Direction::Up));
        assert!(!out.slid);
        assert_eq!(out.xpush, 0.0);
        assert!((out.ypush - 10.0).abs() < 1e-4);
    }

    #[test]
    fn corner_assist_slides_toward_open_up_left() {
        let layers = walls(4, 4, &[(1, 1), (2, 1)]);
        let leaning = resolve_walk(&layers, walk(52.0, 96.0, 0.0, -1.0, Direction::Up));
        assert!(leaning.slid);
        assert!(leaning.xpush < 0.0);
        assert_eq!(leaning.xpush.abs(), leaning.ypush.abs());

        let at_threshold = resolve_walk(&layers, walk(56.0, 96.0, 0.0, -1.0, Direction::Up));
        assert!(!at_threshold.slid);
        assert_eq!(at_threshold.xpush, 0.0);
    }

    #[test]
    fn horizontal_slide_uses_vertical_lean() {
        let layers = walls(4, 4, &[(2, 2), (2, 3)]);
        let mut params = walk(72.0, 84.0, 1.0, 0.0, Direction::Right);
        params.speed = 20.0;
        let out = resolve_walk(&layers, params);
        assert!(out.slid);
        assert!((out.xpush + 2.0).abs() < 1e-4);
        assert!((out.ypush + 2.0).abs() < 1e-4);
    }

    #[test]
    fn blocked_only_by_a_corner_slides_toward_tile_center() {
        let left_corner = walls(4, 4, &[(0, 1)]);
        let out = resolve_walk(&left_corner, walk(40.0, 101.0, 0.0, -1.0, Direction::Up));
        assert!(out.slid);
        assert!((out.xpush - 5.0).abs() < 1e-4);
        assert!((out.ypush - 5.0).abs() < 1e-4);
        assert!((out.x - 45.0).abs() < 1e-4);

        let right_corner = walls(4, 4, &[(2, 1)]);
        let out = resolve_walk(&right_corner, walk(78.0, 101.0, 0.0, -1.0, Direction::Up));
        assert!(out.slid);
        assert!((out.xpush + 5.0).abs() < 1e-4);
        assert!((out.ypush - 5.0).abs() < 1e-4);
    }

    #[test]
    fn horizontal_corner_block_slides_toward_tile_center() {
        let layers = walls(4, 4, &[(2, 1)]);
        let out = resolve_walk(&layers, walk(66.0, 90.0, 1.0, 0.0, Direction::Right));
        assert!(out.slid);
        assert!((out.xpush + 4.0).abs() < 1e-4);
        assert!((out.ypush - 4.0).abs() < 1e-4);
        assert!((out.y - 94.0).abs() < 1e-4);
    }

    #[test]
    fn walking_down_slides_toward_open_down_right() {
        let layers = walls(4, 4, &[(0, 2), (1, 2)]);
        let out = resolve_walk(&layers, walk(68.0, 75.0, 0.0, 1.0, Direction::Down));
        assert!(out.slid);
        assert!((out.xpush - 6.0).abs() < 1e-4);
        assert!((out.ypush + 6.0).abs() < 1e-4);
        assert!((out.x - 74.0).abs() < 1e-4);
        assert!((out.y - 79.0).abs() < 1e-4);
    }

    #[test]
    fn walking_left_slides_toward_open_down_left() {
        let layers = walls(4, 4, &[(1, 0), (1, 1)]);
        let out = resolve_walk(&layers, walk(94.0, 76.0, -1.0, 0.0, Direction::Left));
        assert!(out.slid);
        assert!((out.xpush - 4.0).abs() < 1e-4);
        assert!((out.ypush - 4.0).abs() < 1e-4);
        assert!((out.x - 88.0).abs() < 1e-4);

        let shallow = resolve_walk(&layers, walk(94.0, 74.0, -1.0, 0.0, Direction::Left));
        assert!(!shallow.slid);
        assert_eq!(shallow.ypush, 0.0);
    }

    #[test]
    fn diagonal_facing_never_slides() {
        let layers = walls(4, 4, &[(0, 1), (1, 1)]);
        let out = resolve_walk(&layers, walk(68.0, 96.0, 0.0, -1.0, Direction::UpRight));
        assert!(!out.slid);
        assert_eq!(out.xpush, 0.0);
    }

    #[test]
    fn non_pushable_walkers_overlap_without_push() {
        let layers = walls(4, 4, &[(1, 1)]);
        let mut params = walk(60.0, 96.0, 0.0, -1.0, Direction::Up);
        params.pushable = false;
        let out = resolve_walk(&layers, params);
        assert_eq!((out.xpush, out.ypush), (0.0, 0.0));
        assert!((out.y - 86.0).abs() < 1e-4);
        assert_eq!(out.events.overlapped_layers(), &[0]);
    }

    #[test]
    fn passthrough_layers_record_overlap_without_blocking() {
        let mut water = CollisionLayer::new("water", 4, 4).with_tiles(&[(1, 1)]);
        water.passthrough = true;
        let out = resolve_walk(&[water], walk(60.0, 96.0, 0.0, -1.0, Direction::Up));
        assert_eq!((out.xpush, out.ypush), (0.0, 0.0));
        assert_eq!(out.events.overlapped_layers(), &[0]);
        assert!(out.events.boundary_hits().is_empty());
    }

    #[test]
    fn map_edge_pushes_back_and_records_boundary() {
        let layers = walls(4, 4, &[]);
        let out = resolve_walk(&layers, walk(152.0, 60.0, 1.0, 0.0, Direction::Right));
        assert!(out.xpush < 0.0);
        assert!(out.x + 8.0 <= 160.0 + 1e-3);
        assert!(out.events.hit_boundary_on(0));
        assert!(out.events.boundary_hits().iter().all(|hit| hit.x == 4));
    }
}
