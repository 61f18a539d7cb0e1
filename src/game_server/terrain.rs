//! Terrain - Priority-ordered ground regions
//!
//! Regions are kept sorted by descending priority, so the first region that
//! contains a point decides the ground values there.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::topology::{PolygonEntity, RenderSurface};

/// Ground values felt by the car
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ground {
    /// General velocity damping along the heading
    pub friction: f32,
    /// Lateral force damping
    pub grip: f32,
    /// Scale of the forward drive force
    pub traction: f32,
}

impl Ground {
    pub const ROAD: Ground = Ground {
        friction: 5.0,
        grip: 8.0,
        traction: 1.0,
    };

    pub const OFF_ROAD: Ground = Ground {
        friction: 20.0,
        grip: 6.0,
        traction: 0.5,
    };
}

impl Default for Ground {
    fn default() -> Self {
        Ground::OFF_ROAD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(u32);

#[derive(Debug, Clone)]
pub struct TerrainRegion {
    pub id: RegionId,
    pub body: PolygonEntity,
    pub ground: Ground,
}

#[derive(Debug, Clone)]
pub struct TrackQuery {
    regions: Vec<TerrainRegion>,
    background: Ground,
    next_id: u32,
}

impl TrackQuery {
    pub fn new(background: Ground) -> Self {
        Self {
            regions: Vec::new(),
            background,
            next_id: 0,
        }
    }

    /// Inserts before the first region of strictly lower priority, so equal
    /// priorities keep insertion order.
    pub fn add_region(&mut self, body: PolygonEntity, ground: Ground) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id += 1;

        let priority = body.priority();
        let region = TerrainRegion { id, body, ground };
        match self.regions.iter().position(|r| r.body.priority() < priority) {
            Some(index) => self.regions.insert(index, region),
            None => self.regions.push(region),
        }
        id
    }

    pub fn friction_at(&self, point: Vec2) -> Ground {
        self.find(point).map_or(self.background, |r| r.ground)
    }

    pub fn region_at(&self, point: Vec2) -> Option<RegionId> {
        self.find(point).map(|r| r.id)
    }

    fn find(&self, point: Vec2) -> Option<&TerrainRegion> {
        self.regions.iter().find(|r| r.body.contains_point(point))
    }

    pub fn region(&self, id: RegionId) -> Option<&TerrainRegion> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Regions in query order
    pub fn regions(&self) -> &[TerrainRegion] {
        &self.regions
    }

    /// Ground used where no region matches
    pub fn background(&self) -> Ground {
        self.background
    }

    /// Hides every region body; lookups are unaffected
    pub fn hide(&mut self, render: &mut dyn RenderSurface) {
        for region in &mut self.regions {
            region.body.hide(render);
        }
    }
}

impl Default for TrackQuery {
    fn default() -> Self {
        Self::new(Ground::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{EntityStyle, Scene, Surface, TileTier, Topology};

    fn square(scene: &mut Scene, center: Vec2, side: f32, priority: i32) -> PolygonEntity {
        let surface = Surface::from_topology(Topology::Torus, 300.0, 300.0);
        let style = EntityStyle::default()
            .priority(priority)
            .tier(TileTier::Home);
        PolygonEntity::square(surface, scene, center, side, 0.0, &style).unwrap()
    }

    const ICE: Ground = Ground {
        friction: 1.0,
        grip: 0.5,
        traction: 0.2,
    };

    #[test]
    fn higher_priority_region_wins_overlap() {
        let mut scene = Scene::new();
        let mut track = TrackQuery::default();
        let low = track.add_region(square(&mut scene, Vec2::new(100.0, 100.0), 80.0, 1), Ground::ROAD);
        let high = track.add_region(square(&mut scene, Vec2::new(110.0, 100.0), 40.0, 10), ICE);

        let overlap = Vec2::new(110.0, 100.0);
        assert_eq!(track.friction_at(overlap), ICE);
        assert_eq!(track.region_at(overlap), Some(high));

        let low_only = Vec2::new(70.0, 100.0);
        assert_eq!(track.friction_at(low_only), Ground::ROAD);
        assert_eq!(track.region_at(low_only), Some(low));
    }

    #[test]
    fn equal_priority_keeps_insertion_order() {
        let mut scene = Scene::new();
        let mut track = TrackQuery::default();
        let first = track.add_region(square(&mut scene, Vec2::new(100.0, 100.0), 50.0, 3), ICE);
        let _second = track.add_region(square(&mut scene, Vec2::new(100.0, 100.0), 50.0, 3), Ground::ROAD);
        let top = track.add_region(square(&mut scene, Vec2::new(200.0, 200.0), 10.0, 7), ICE);

        let order: Vec<RegionId> = track.regions().iter().map(|r| r.id).collect();
        assert_eq!(order[0], top);
        assert_eq!(order[1], first);
        assert_eq!(track.region_at(Vec2::new(100.0, 100.0)), Some(first));
    }

    #[test]
    fn background_applies_outside_every_region() {
        let mut scene = Scene::new();
        let mut track = TrackQuery::new(ICE);
        track.add_region(square(&mut scene, Vec2::new(100.0, 100.0), 20.0, 0), Ground::ROAD);

        assert_eq!(track.friction_at(Vec2::new(250.0, 250.0)), ICE);
        assert_eq!(track.region_at(Vec2::new(250.0, 250.0)), None);
    }

    #[test]
    fn regions_are_found_through_the_tiling() {
        let mut scene = Scene::new();
        let mut track = TrackQuery::default();
        let id = track.add_region(square(&mut scene, Vec2::new(100.0, 100.0), 20.0, 0), Ground::ROAD);
        assert_eq!(track.region_at(Vec2::new(400.0, 700.0)), Some(id));
        assert!(track.region(id).is_some());
    }
}
