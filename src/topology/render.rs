//! Render surface seam
//!
//! Entities only ever push changes into a [`RenderSurface`]; they never read
//! geometry back. [`Scene`] is the headless implementation used by the
//! runner binary and the tests.

use glam::Vec2;

/// Opaque handle to one drawn primitive
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrimitiveId(u32);

impl PrimitiveId {
    pub fn new(index: u32) -> Self {
        PrimitiveId(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// What a drawing backend must provide to host topological entities
pub trait RenderSurface {
    /// Open polyline through `points`
    fn create_line(&mut self, points: &[Vec2], fill: &str) -> PrimitiveId;

    /// Closed filled polygon
    fn create_polygon(&mut self, points: &[Vec2], fill: &str) -> PrimitiveId;

    fn translate(&mut self, id: PrimitiveId, delta: Vec2);

    fn set_vertices(&mut self, id: PrimitiveId, points: &[Vec2]);

    fn set_visible(&mut self, id: PrimitiveId, visible: bool);

    fn raise(&mut self, id: PrimitiveId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Line,
    Polygon,
}

#[derive(Debug, Clone)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub points: Vec<Vec2>,
    pub fill: String,
    pub visible: bool,
    /// Stacking order, higher is in front
    pub z: u64,
}

/// In-memory render surface keeping the current state of every primitive.
#[derive(Debug, Default)]
pub struct Scene {
    primitives: Vec<Primitive>,
    next_z: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn visible_count(&self) -> usize {
        self.primitives.iter().filter(|p| p.visible).count()
    }

    fn push(&mut self, kind: PrimitiveKind, points: &[Vec2], fill: &str) -> PrimitiveId {
        let id = PrimitiveId(self.primitives.len() as u32);
        self.next_z += 1;
        self.primitives.push(Primitive {
            kind,
            points: points.to_vec(),
            fill: fill.to_string(),
            visible: true,
            z: self.next_z,
        });
        id
    }
}

impl RenderSurface for Scene {
    fn create_line(&mut self, points: &[Vec2], fill: &str) -> PrimitiveId {
        self.push(PrimitiveKind::Line, points, fill)
    }

    fn create_polygon(&mut self, points: &[Vec2], fill: &str) -> PrimitiveId {
        self.push(PrimitiveKind::Polygon, points, fill)
    }

    fn translate(&mut self, id: PrimitiveId, delta: Vec2) {
        if let Some(p) = self.primitives.get_mut(id.0 as usize) {
            for point in &mut p.points {
                *point += delta;
            }
        }
    }

    fn set_vertices(&mut self, id: PrimitiveId, points: &[Vec2]) {
        if let Some(p) = self.primitives.get_mut(id.0 as usize) {
            p.points.clear();
            p.points.extend_from_slice(points);
        }
    }

    fn set_visible(&mut self, id: PrimitiveId, visible: bool) {
        if let Some(p) = self.primitives.get_mut(id.0 as usize) {
            p.visible = visible;
        }
    }

    fn raise(&mut self, id: PrimitiveId) {
        self.next_z += 1;
        let z = self.next_z;
        if let Some(p) = self.primitives.get_mut(id.0 as usize) {
            p.z = z;
        }
    }
}
