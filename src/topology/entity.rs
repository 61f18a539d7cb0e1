//! TopologicalEntity - One logical object drawn once per tile
//!
//! The entity's authoritative geometry lives in the chart of tile (0,0),
//! kept inside `[0, 2w] x [0, 2h]` by [`TopologicalEntity::check_bounds`].
//! Every other tile holds a copy transformed by the gluing signs of its row
//! and column parity, and every mutation is pushed to all copies at once.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::topology::render::{PrimitiveId, PrimitiveKind, RenderSurface};
use crate::topology::surface::{Surface, TileGrid, TILES};

/// Which tiles of the 6x6 window get a primitive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileTier {
    /// The 2x2 home block only
    Home,
    /// 3x3 block, rows/cols 1..=3
    Neighborhood,
    /// All 36 tiles
    #[default]
    Full,
}

impl TileTier {
    pub fn renders(self, row: usize, col: usize) -> bool {
        let span = match self {
            TileTier::Home => 2..=3,
            TileTier::Neighborhood => 1..=3,
            TileTier::Full => 0..=TILES - 1,
        };
        span.contains(&row) && span.contains(&col)
    }

    pub fn tile_count(self) -> usize {
        match self {
            TileTier::Home => 4,
            TileTier::Neighborhood => 9,
            TileTier::Full => TILES * TILES,
        }
    }
}

/// Creation parameters shared by every shape kind
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStyle {
    pub fill: String,
    /// z-index; higher is drawn and queried first
    pub priority: i32,
    pub tier: TileTier,
}

impl Default for EntityStyle {
    fn default() -> Self {
        Self {
            fill: "black".to_string(),
            priority: 0,
            tier: TileTier::Full,
        }
    }
}

impl EntityStyle {
    pub fn new(fill: &str) -> Self {
        Self {
            fill: fill.to_string(),
            ..Default::default()
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn tier(mut self, tier: TileTier) -> Self {
        self.tier = tier;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TopologicalEntity {
    surface: Surface,
    /// Current vertices in the tile-(0,0) chart
    vertices: Vec<Vec2>,
    position: Vec2,
    priority: i32,
    primitives: TileGrid<Option<PrimitiveId>>,
    visible: bool,
}

impl TopologicalEntity {
    /// Draws one primitive per rendered tile. Vertex count is validated by
    /// the shape constructors.
    pub(crate) fn create(
        surface: Surface,
        render: &mut dyn RenderSurface,
        kind: PrimitiveKind,
        vertices: Vec<Vec2>,
        position: Vec2,
        style: &EntityStyle,
    ) -> Self {
        let mut primitives: TileGrid<Option<PrimitiveId>> = [[None; TILES]; TILES];
        for (row, tiles) in primitives.iter_mut().enumerate() {
            for (col, slot) in tiles.iter_mut().enumerate() {
                if !style.tier.renders(row, col) {
                    continue;
                }
                let points = tile_vertices(&surface, &vertices, row, col);
                *slot = Some(match kind {
                    PrimitiveKind::Line => render.create_line(&points, &style.fill),
                    PrimitiveKind::Polygon => render.create_polygon(&points, &style.fill),
                });
            }
        }

        Self {
            surface,
            vertices,
            position,
            priority: style.priority,
            primitives,
            visible: true,
        }
    }

    /// Get the surface the entity lives on
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Chart position, kept inside `[0, 2W] x [0, 2H]` by re-homing
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Outline relative to the position
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Draw priority; higher draws on top
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether the primitives are shown
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Primitive drawn in tile `(row, col)`, if that tile is drawn
    pub fn primitive(&self, row: usize, col: usize) -> Option<PrimitiveId> {
        self.primitives.get(row)?.get(col).copied().flatten()
    }

    /// Present primitives as `(row, col, id)`
    pub fn primitives(&self) -> impl Iterator<Item = (usize, usize, PrimitiveId)> + '_ {
        self.primitives.iter().enumerate().flat_map(|(row, tiles)| {
            tiles
                .iter()
                .enumerate()
                .filter_map(move |(col, slot)| slot.map(|id| (row, col, id)))
        })
    }

    /// Rigid translation of the chart copy, mirrored into each tile's frame.
    pub fn move_by(&mut self, render: &mut dyn RenderSurface, delta: Vec2) {
        self.position += delta;
        for v in &mut self.vertices {
            *v += delta;
        }
        for (row, col, id) in self.primitives() {
            render.translate(id, self.surface.tile_delta(delta, row as i32, col as i32));
        }
    }

    /// Re-homes the entity by whole double periods until its position is back
    /// inside `[0, 2w] x [0, 2h]`. Non-finite positions are left alone.
    pub fn check_bounds(&mut self, render: &mut dyn RenderSurface) {
        let period = 2.0 * Vec2::new(self.surface.width(), self.surface.height());
        if !self.position.is_finite() {
            log::warn!("cannot re-home entity at {}", self.position);
            return;
        }

        // a second pass absorbs the rounding left by a very large jump
        for _ in 0..2 {
            let current = self.position;
            let homed = Vec2::new(
                rehome(current.x, period.x),
                rehome(current.y, period.y),
            );
            if homed == current {
                return;
            }
            self.move_by(render, homed - current);
        }
    }

    /// Gameplay movement: translate, then re-home.
    pub fn move_wrapped(&mut self, render: &mut dyn RenderSurface, delta: Vec2) {
        self.move_by(render, delta);
        self.check_bounds(render);
    }

    pub fn hide(&mut self, render: &mut dyn RenderSurface) {
        self.set_visible(render, false);
    }

    pub fn unhide(&mut self, render: &mut dyn RenderSurface) {
        self.set_visible(render, true);
    }

    fn set_visible(&mut self, render: &mut dyn RenderSurface, visible: bool) {
        self.visible = visible;
        for (_, _, id) in self.primitives() {
            render.set_visible(id, visible);
        }
    }

    pub fn raise(&self, render: &mut dyn RenderSurface) {
        for (_, _, id) in self.primitives() {
            render.raise(id);
        }
    }

    /// Smallest distance between any tile image of `point` and the entity's
    /// home-block anchor.
    pub fn distance_to(&self, point: Vec2) -> f32 {
        let local = self.surface.reflect_to_local(point);
        let anchor = self.position + self.surface.home_offset();
        self.surface
            .tile_coordinates(local)
            .iter()
            .flatten()
            .map(|image| image.distance(anchor))
            .fold(f32::INFINITY, f32::min)
    }

    /// Relative rotation about `position`, rewriting every copy.
    pub(crate) fn rotate_vertices(&mut self, render: &mut dyn RenderSurface, radians: f32) {
        let rotation = Vec2::from_angle(radians);
        let center = self.position;
        for v in &mut self.vertices {
            *v = center + rotation.rotate(*v - center);
        }
        self.redraw(render);
    }

    fn redraw(&self, render: &mut dyn RenderSurface) {
        for (row, col, id) in self.primitives() {
            let points = tile_vertices(&self.surface, &self.vertices, row, col);
            render.set_vertices(id, &points);
        }
    }

    /// Parity test of `point` against the current outline. Points are
    /// reflected into the fundamental domain first; outlines that stick out
    /// of the domain are also tested against the neighbouring images.
    pub(crate) fn encloses(&self, point: Vec2) -> bool {
        let local = self.surface.reflect_to_local(point);
        if point_in_polygon(&self.vertices, local) {
            return true;
        }
        if self.within_domain() {
            return false;
        }
        (-1..=2).any(|row| {
            (-1..=2).any(|col| {
                (row, col) != (0, 0)
                    && point_in_polygon(&self.vertices, self.surface.tile_point(local, row, col))
            })
        })
    }

    fn within_domain(&self) -> bool {
        self.vertices.iter().all(|v| {
            (0.0..=self.surface.width()).contains(&v.x)
                && (0.0..=self.surface.height()).contains(&v.y)
        })
    }
}

/// `value` when already in `[0, period]`, else its representative there
fn rehome(value: f32, period: f32) -> f32 {
    if (0.0..=period).contains(&value) {
        value
    } else {
        value.rem_euclid(period)
    }
}

fn tile_vertices(surface: &Surface, vertices: &[Vec2], row: usize, col: usize) -> Vec<Vec2> {
    vertices
        .iter()
        .map(|v| surface.tile_point(*v, row as i32, col as i32))
        .collect()
}

/// Even-odd test casting a ray from `p` towards increasing y. Edges are
/// half-open in x so a ray through a vertex is counted once.
pub fn point_in_polygon(vertices: &[Vec2], p: Vec2) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    for i in 0..n {
        let a = vertices[(i + n - 1) % n];
        let b = vertices[i];
        if (a.x > p.x) != (b.x > p.x) {
            let t = (p.x - a.x) / (b.x - a.x);
            let y = a.y + t * (b.y - a.y);
            if y > p.y {
                inside = !inside;
            }
        }
    }
    inside
}

/// Arithmetic mean of a vertex list
pub fn centroid(vertices: &[Vec2]) -> Vec2 {
    if vertices.is_empty() {
        return Vec2::ZERO;
    }
    vertices.iter().copied().sum::<Vec2>() / vertices.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::render::Scene;
    use crate::topology::surface::{Topology, HOME};

    const EPS: f32 = 1e-2;

    fn triangle(surface: Surface, scene: &mut Scene, tier: TileTier) -> TopologicalEntity {
        let vertices = vec![
            Vec2::new(10.0, 10.0),
            Vec2::new(40.0, 10.0),
            Vec2::new(10.0, 30.0),
        ];
        let position = centroid(&vertices);
        TopologicalEntity::create(
            surface,
            scene,
            PrimitiveKind::Polygon,
            vertices,
            position,
            &EntityStyle::default().tier(tier),
        )
    }

    /// Every rendered copy must equal the tile image of the chart vertices.
    fn assert_copies_congruent(entity: &TopologicalEntity, scene: &Scene) {
        for (row, col, id) in entity.primitives() {
            let drawn = &scene.get(id).unwrap().points;
            let expected = tile_vertices(entity.surface(), entity.vertices(), row, col);
            for (d, e) in drawn.iter().zip(&expected) {
                assert!((*d - *e).length() < EPS, "tile ({row},{col}): {d} vs {e}");
            }
        }
    }

    #[test]
    fn tiers_allocate_expected_primitive_counts() {
        let surface = Surface::from_topology(Topology::Torus, 300.0, 300.0);
        for tier in [TileTier::Home, TileTier::Neighborhood, TileTier::Full] {
            let mut scene = Scene::new();
            let entity = triangle(surface, &mut scene, tier);
            assert_eq!(entity.primitives().count(), tier.tile_count());
            assert_eq!(scene.len(), tier.tile_count());
        }
        let mut scene = Scene::new();
        let home = triangle(surface, &mut scene, TileTier::Home);
        assert!(home.primitive(HOME, HOME).is_some());
        assert!(home.primitive(0, 0).is_none());
    }

    #[test]
    fn move_and_back_restores_position_on_every_topology() {
        for topology in Topology::ALL {
            let surface = Surface::from_topology(topology, 300.0, 300.0);
            let mut scene = Scene::new();
            let mut entity = triangle(surface, &mut scene, TileTier::Full);
            let start = entity.position();
            let delta = Vec2::new(37.5, -12.25);

            entity.move_by(&mut scene, delta);
            entity.move_by(&mut scene, -delta);

            assert!((entity.position() - start).length() < EPS);
            assert_copies_congruent(&entity, &scene);
        }
    }

    #[test]
    fn copies_stay_congruent_under_move_and_rotation() {
        for topology in Topology::ALL {
            let surface = Surface::from_topology(topology, 300.0, 200.0);
            let mut scene = Scene::new();
            let mut entity = triangle(surface, &mut scene, TileTier::Full);

            entity.move_wrapped(&mut scene, Vec2::new(-25.0, 310.0));
            entity.rotate_vertices(&mut scene, 0.7);
            entity.move_wrapped(&mut scene, Vec2::new(580.0, 45.0));
            entity.rotate_vertices(&mut scene, -1.9);

            assert_copies_congruent(&entity, &scene);
        }
    }

    #[test]
    fn torus_wraps_position_periodically() {
        let surface = Surface::from_topology(Topology::Torus, 300.0, 300.0);
        let mut scene = Scene::new();
        let vertices = vec![
            Vec2::new(5.0, 5.0),
            Vec2::new(15.0, 5.0),
            Vec2::new(15.0, 15.0),
            Vec2::new(5.0, 15.0),
        ];
        let mut entity = TopologicalEntity::create(
            surface,
            &mut scene,
            PrimitiveKind::Polygon,
            vertices.clone(),
            centroid(&vertices),
            &EntityStyle::default(),
        );
        assert_eq!(entity.position(), Vec2::new(10.0, 10.0));

        for _ in 0..3 {
            entity.move_wrapped(&mut scene, Vec2::new(295.0, 0.0));
        }

        let expected = (10.0 + 295.0 * 3.0) % 300.0;
        assert!((entity.position().x - expected).abs() < EPS);
        assert!((entity.position().y - 10.0).abs() < EPS);
        assert_copies_congruent(&entity, &scene);
    }

    #[test]
    fn huge_and_non_finite_moves_terminate() {
        let surface = Surface::from_topology(Topology::Torus, 300.0, 300.0);
        let mut scene = Scene::new();
        let mut entity = triangle(surface, &mut scene, TileTier::Home);

        entity.move_wrapped(&mut scene, Vec2::new(1.0e12, -3.0e11));
        let p = entity.position();
        assert!((0.0..=600.0).contains(&p.x), "{p}");
        assert!((0.0..=600.0).contains(&p.y), "{p}");

        entity.move_wrapped(&mut scene, Vec2::new(f32::INFINITY, 0.0));
        assert!(!entity.position().is_finite());
    }

    #[test]
    fn rotation_is_relative_and_composes() {
        let surface = Surface::from_topology(Topology::KleinBottleH, 300.0, 300.0);
        let mut scene = Scene::new();
        let mut once = triangle(surface, &mut scene, TileTier::Home);
        let mut twice = triangle(surface, &mut scene, TileTier::Home);

        once.rotate_vertices(&mut scene, 1.0);
        twice.rotate_vertices(&mut scene, 0.5);
        twice.rotate_vertices(&mut scene, 0.5);

        for (a, b) in once.vertices().iter().zip(twice.vertices()) {
            assert!((*a - *b).length() < EPS);
        }
        assert!((once.position() - twice.position()).length() < EPS);
    }

    #[test]
    fn hide_and_unhide_toggle_every_copy() {
        let surface = Surface::from_topology(Topology::Torus, 300.0, 300.0);
        let mut scene = Scene::new();
        let mut entity = triangle(surface, &mut scene, TileTier::Neighborhood);

        entity.hide(&mut scene);
        assert!(!entity.is_visible());
        assert_eq!(scene.visible_count(), 0);

        entity.unhide(&mut scene);
        assert_eq!(scene.visible_count(), 9);
    }

    #[test]
    fn distance_sees_through_the_seam() {
        let surface = Surface::from_topology(Topology::Torus, 300.0, 300.0);
        let mut scene = Scene::new();
        let entity = triangle(surface, &mut scene, TileTier::Home);
        let anchor = entity.position();

        // anchor sits at x = 20, the point 30 units away on the other side of x = 0
        let near_across_seam = Vec2::new(anchor.x - 30.0, anchor.y);
        assert!((entity.distance_to(near_across_seam) - 30.0).abs() < EPS);
        assert!(entity.distance_to(Vec2::new(anchor.x + 150.0, anchor.y)) > 100.0);
    }

    #[test]
    fn polygon_parity_counts_vertex_hits_once() {
        let diamond = [
            Vec2::new(0.0, -1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
        ];
        assert!(point_in_polygon(&diamond, Vec2::new(0.0, 0.0)));
        assert!(!point_in_polygon(&diamond, Vec2::new(0.0, 2.0)));
        assert!(!point_in_polygon(&diamond, Vec2::new(0.0, -2.0)));
    }
}
