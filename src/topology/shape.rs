//! Shape kinds built on [`TopologicalEntity`]
//!
//! Open paths (lines and connected curves) and closed polygons share the
//! entity core. Rotation and containment only exist on [`PolygonEntity`].

use std::ops::{Deref, DerefMut};

use glam::Vec2;

use crate::error::{Error, Result};
use crate::topology::entity::{centroid, EntityStyle, TopologicalEntity};
use crate::topology::render::{PrimitiveKind, RenderSurface};
use crate::topology::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Segment,
    Curve,
}

/// Open line or polyline
#[derive(Debug, Clone)]
pub struct PathEntity {
    entity: TopologicalEntity,
    kind: PathKind,
}

impl PathEntity {
    pub fn line(
        surface: Surface,
        render: &mut dyn RenderSurface,
        from: Vec2,
        to: Vec2,
        style: &EntityStyle,
    ) -> Self {
        let position = (from + to) / 2.0;
        let entity = TopologicalEntity::create(
            surface,
            render,
            PrimitiveKind::Line,
            vec![from, to],
            position,
            style,
        );
        Self {
            entity,
            kind: PathKind::Segment,
        }
    }

    pub fn curve(
        surface: Surface,
        render: &mut dyn RenderSurface,
        points: Vec<Vec2>,
        style: &EntityStyle,
    ) -> Result<Self> {
        if points.len() < 2 {
            return Err(Error::Construction {
                shape: "curve",
                required: 2,
                got: points.len(),
            });
        }
        let position = centroid(&points);
        let entity =
            TopologicalEntity::create(surface, render, PrimitiveKind::Line, points, position, style);
        Ok(Self {
            entity,
            kind: PathKind::Curve,
        })
    }

    pub fn kind(&self) -> PathKind {
        self.kind
    }
}

impl Deref for PathEntity {
    type Target = TopologicalEntity;

    fn deref(&self) -> &Self::Target {
        &self.entity
    }
}

impl DerefMut for PathEntity {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entity
    }
}

/// Thick curve: a center polyline widened by a per-sample amplitude
#[derive(Debug, Clone, PartialEq)]
pub struct Ribbon {
    pub center: Vec<Vec2>,
    pub amplitudes: Vec<f32>,
    /// Left-hand offset, one point per segment start
    pub offset_a: Vec<Vec2>,
    /// Right-hand offset
    pub offset_b: Vec<Vec2>,
}

impl Ribbon {
    /// A single amplitude is applied to every sample.
    pub fn build(center: Vec<Vec2>, amplitudes: &[f32]) -> Result<Self> {
        if center.len() < 3 {
            return Err(Error::Construction {
                shape: "ribbon",
                required: 3,
                got: center.len(),
            });
        }
        let amplitudes = match amplitudes.len() {
            1 => vec![amplitudes[0]; center.len()],
            n if n == center.len() => amplitudes.to_vec(),
            n => {
                return Err(Error::AmplitudeMismatch {
                    samples: center.len(),
                    amplitudes: n,
                })
            }
        };

        let mut offset_a = Vec::with_capacity(center.len());
        let mut offset_b = Vec::with_capacity(center.len());
        for (i, pair) in center.windows(2).enumerate() {
            let normal = (pair[1] - pair[0]).perp().normalize_or_zero();
            if normal == Vec2::ZERO {
                continue;
            }
            let half = 0.5 * amplitudes[i] * normal;
            offset_a.push(pair[0] + half);
            offset_b.push(pair[0] - half);
        }
        if offset_a.len() < 2 {
            return Err(Error::Construction {
                shape: "ribbon",
                required: 3,
                got: offset_a.len() + 1,
            });
        }

        Ok(Self {
            center,
            amplitudes,
            offset_a,
            offset_b,
        })
    }

    /// First point of each offset
    pub fn start(&self) -> [Vec2; 2] {
        [self.offset_a[0], self.offset_b[0]]
    }

    /// Outline: one offset out, the other back
    pub fn outline(&self) -> Vec<Vec2> {
        self.offset_a
            .iter()
            .chain(self.offset_b.iter().rev())
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outline {
    Free,
    Rectangle { length: f32, width: f32 },
    Ribbon(Ribbon),
}

/// Closed polygon; the only kind that rotates and answers containment.
#[derive(Debug, Clone)]
pub struct PolygonEntity {
    entity: TopologicalEntity,
    outline: Outline,
}

impl PolygonEntity {
    pub fn new(
        surface: Surface,
        render: &mut dyn RenderSurface,
        vertices: Vec<Vec2>,
        style: &EntityStyle,
    ) -> Result<Self> {
        Self::with_outline(surface, render, vertices, Outline::Free, style)
    }

    fn with_outline(
        surface: Surface,
        render: &mut dyn RenderSurface,
        vertices: Vec<Vec2>,
        outline: Outline,
        style: &EntityStyle,
    ) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(Error::Construction {
                shape: "polygon",
                required: 3,
                got: vertices.len(),
            });
        }
        let position = centroid(&vertices);
        let entity = TopologicalEntity::create(
            surface,
            render,
            PrimitiveKind::Polygon,
            vertices,
            position,
            style,
        );
        Ok(Self { entity, outline })
    }

    /// `length` runs along the facing direction `angle`.
    pub fn rectangle(
        surface: Surface,
        render: &mut dyn RenderSurface,
        center: Vec2,
        length: f32,
        width: f32,
        angle: f32,
        style: &EntityStyle,
    ) -> Result<Self> {
        let forward = Vec2::from_angle(angle);
        let side = Vec2::new(forward.y, -forward.x);
        let vertices = vec![
            center + (width * side - length * forward) / 2.0,
            center + (width * side + length * forward) / 2.0,
            center + (-width * side + length * forward) / 2.0,
            center + (-width * side - length * forward) / 2.0,
        ];
        Self::with_outline(
            surface,
            render,
            vertices,
            Outline::Rectangle { length, width },
            style,
        )
    }

    pub fn square(
        surface: Surface,
        render: &mut dyn RenderSurface,
        center: Vec2,
        side: f32,
        angle: f32,
        style: &EntityStyle,
    ) -> Result<Self> {
        Self::rectangle(surface, render, center, side, side, angle, style)
    }

    pub fn ribbon(
        surface: Surface,
        render: &mut dyn RenderSurface,
        center: Vec<Vec2>,
        amplitudes: &[f32],
        style: &EntityStyle,
    ) -> Result<Self> {
        let ribbon = Ribbon::build(center, amplitudes)?;
        Self::from_ribbon(surface, render, ribbon, style)
    }

    pub fn from_ribbon(
        surface: Surface,
        render: &mut dyn RenderSurface,
        ribbon: Ribbon,
        style: &EntityStyle,
    ) -> Result<Self> {
        let vertices = ribbon.outline();
        Self::with_outline(surface, render, vertices, Outline::Ribbon(ribbon), style)
    }

    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    pub fn as_ribbon(&self) -> Option<&Ribbon> {
        match &self.outline {
            Outline::Ribbon(ribbon) => Some(ribbon),
            _ => None,
        }
    }

    /// Relative rotation about the entity position; repeated calls compose.
    pub fn rotate(&mut self, render: &mut dyn RenderSurface, radians: f32) {
        self.entity.rotate_vertices(render, radians);
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        self.entity.encloses(point)
    }
}

impl Deref for PolygonEntity {
    type Target = TopologicalEntity;

    fn deref(&self) -> &Self::Target {
        &self.entity
    }
}

impl DerefMut for PolygonEntity {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entity
    }
}

/// Closed set of drawable shape kinds
#[derive(Debug, Clone)]
pub enum Shape {
    Path(PathEntity),
    Polygon(PolygonEntity),
}

impl Shape {
    pub fn entity(&self) -> &TopologicalEntity {
        match self {
            Shape::Path(path) => &**path,
            Shape::Polygon(polygon) => &**polygon,
        }
    }

    pub fn entity_mut(&mut self) -> &mut TopologicalEntity {
        match self {
            Shape::Path(path) => &mut **path,
            Shape::Polygon(polygon) => &mut **polygon,
        }
    }

    pub fn as_polygon(&self) -> Option<&PolygonEntity> {
        match self {
            Shape::Polygon(polygon) => Some(polygon),
            Shape::Path(_) => None,
        }
    }

    pub fn as_polygon_mut(&mut self) -> Option<&mut PolygonEntity> {
        match self {
            Shape::Polygon(polygon) => Some(polygon),
            Shape::Path(_) => None,
        }
    }

    /// `None` for shapes without an interior
    pub fn contains_point(&self, point: Vec2) -> Option<bool> {
        self.as_polygon().map(|polygon| polygon.contains_point(point))
    }
}

impl From<PathEntity> for Shape {
    fn from(path: PathEntity) -> Self {
        Shape::Path(path)
    }
}

impl From<PolygonEntity> for Shape {
    fn from(polygon: PolygonEntity) -> Self {
        Shape::Polygon(polygon)
    }
}
