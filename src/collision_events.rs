use crate::components::Direction;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryHit {
    /// Index into the collision layer list.
    pub layer: usize,
    pub x: i32,
    pub y: i32,
}

/// What a single walk step touched, gathered while pushes are resolved and
/// read by the trigger dispatcher afterwards.
#[derive(Clone, Debug, Default)]
pub struct CollisionEvents {
    overlapped_layers: Vec<usize>,
    boundary_hits: Vec<BoundaryHit>,
    pub facing: Direction,
}

impl CollisionEvents {
    pub fn new(facing: Direction) -> Self {
        Self {
            facing,
            ..Default::default()
        }
    }

    pub fn record_overlap(&mut self, layer: usize, x: i32, y: i32, map_boundary: bool) {
        if !self.overlapped_layers.contains(&layer) {
            self.overlapped_layers.push(layer);
        }
        if map_boundary {
            let hit = BoundaryHit { layer, x, y };
            if !self.boundary_hits.contains(&hit) {
                self.boundary_hits.push(hit);
            }
        }
    }

    pub fn overlapped_layers(&self) -> &[usize] {
        &self.overlapped_layers
    }

    pub fn boundary_hits(&self) -> &[BoundaryHit] {
        &self.boundary_hits
    }

    pub fn hit_boundary_on(&self, layer: usize) -> bool {
        self.boundary_hits.iter().any(|hit| hit.layer == layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlaps_are_recorded_once_per_layer() {
        let mut events = CollisionEvents::new(Direction::Up);
        events.record_overlap(0, 1, 1, false);
        events.record_overlap(0, 2, 1, false);
        events.record_overlap(2, -1, 1, true);
        events.record_overlap(2, -1, 1, true);
        assert_eq!(events.overlapped_layers(), &[0, 2]);
        assert_eq!(events.boundary_hits().len(), 1);
        assert!(events.hit_boundary_on(2));
        assert!(!events.hit_boundary_on(0));
    }
}
