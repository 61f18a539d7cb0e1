//! Topology Module
//!
//! Gluing math for the fundamental domain and the entities drawn across its
//! 6x6 tiling.

pub mod entity;
pub mod render;
pub mod shape;
pub mod surface;

pub use entity::{EntityStyle, TileTier, TopologicalEntity};
pub use render::{PrimitiveId, RenderSurface, Scene};
pub use shape::{PathEntity, PolygonEntity, Ribbon, Shape};
pub use surface::{Sign, Surface, TileGrid, Topology, HOME, TILES};
