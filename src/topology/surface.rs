//! Surface - Gluing rules and tiling coordinates
//!
//! A surface is a `width` x `height` rectangle whose opposite edges are
//! identified. Crossing a vertical seam applies the horizontal rule to `y`,
//! crossing a horizontal seam applies the vertical rule to `x`. The world is
//! drawn as a 6x6 grid of tiles so that anything crossing a seam stays
//! visually continuous.

use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Tiles per side of the rendered window
pub const TILES: usize = 6;
/// First row/column of the 2x2 home block
pub const HOME: usize = 2;

/// One value per tile, indexed `[row][col]`
pub type TileGrid<T> = [[T; TILES]; TILES];

/// Orientation relation of a pair of glued edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    /// Edges glued straight across (+1)
    Preserve,
    /// Edges glued with a reversal (-1)
    Flip,
}

impl Sign {
    pub fn factor(self) -> f32 {
        match self {
            Sign::Preserve => 1.0,
            Sign::Flip => -1.0,
        }
    }
}

/// The four closed surfaces a rectangle can be glued into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topology {
    #[serde(rename = "torus")]
    Torus,
    #[serde(rename = "klein")]
    KleinBottleH,
    #[serde(rename = "klein-v")]
    KleinBottleV,
    #[serde(rename = "projective")]
    ProjectivePlane,
}

impl Topology {
    pub const ALL: [Topology; 4] = [
        Topology::Torus,
        Topology::KleinBottleH,
        Topology::KleinBottleV,
        Topology::ProjectivePlane,
    ];

    /// `(h_sign, v_sign)` of this topology
    pub fn signs(self) -> (Sign, Sign) {
        match self {
            Topology::Torus => (Sign::Preserve, Sign::Preserve),
            Topology::KleinBottleH => (Sign::Preserve, Sign::Flip),
            Topology::KleinBottleV => (Sign::Flip, Sign::Preserve),
            Topology::ProjectivePlane => (Sign::Flip, Sign::Flip),
        }
    }

    pub fn from_signs(h_sign: Sign, v_sign: Sign) -> Self {
        match (h_sign, v_sign) {
            (Sign::Preserve, Sign::Preserve) => Topology::Torus,
            (Sign::Preserve, Sign::Flip) => Topology::KleinBottleH,
            (Sign::Flip, Sign::Preserve) => Topology::KleinBottleV,
            (Sign::Flip, Sign::Flip) => Topology::ProjectivePlane,
        }
    }

    /// Short name used in configs and record paths
    pub fn name(self) -> &'static str {
        match self {
            Topology::Torus => "torus",
            Topology::KleinBottleH => "klein",
            Topology::KleinBottleV => "klein-v",
            Topology::ProjectivePlane => "projective",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Topology {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topology::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownTopology(s.to_string()))
    }
}

/// Fundamental domain plus its gluing rules. Immutable and cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    width: f32,
    height: f32,
    h_sign: Sign,
    v_sign: Sign,
}

impl Surface {
    pub fn new(width: f32, height: f32, h_sign: Sign, v_sign: Sign) -> Self {
        Self {
            width,
            height,
            h_sign,
            v_sign,
        }
    }

    /// Surface with the gluing of a named topology
    pub fn from_topology(topology: Topology, width: f32, height: f32) -> Self {
        let (h_sign, v_sign) = topology.signs();
        Self::new(width, height, h_sign, v_sign)
    }

    /// Width of the fundamental domain
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Height of the fundamental domain
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Gluing sign across the vertical seam
    pub fn h_sign(&self) -> Sign {
        self.h_sign
    }

    /// Gluing sign across the horizontal seam
    pub fn v_sign(&self) -> Sign {
        self.v_sign
    }

    /// Named topology for the current signs
    pub fn topology(&self) -> Topology {
        Topology::from_signs(self.h_sign, self.v_sign)
    }

    /// Gluing rule applied to `y` when crossing a vertical seam
    pub fn identify_h(&self, y: f32) -> f32 {
        match self.h_sign {
            Sign::Preserve => y,
            Sign::Flip => self.height - y,
        }
    }

    /// Gluing rule applied to `x` when crossing a horizontal seam
    pub fn identify_v(&self, x: f32) -> f32 {
        match self.v_sign {
            Sign::Preserve => x,
            Sign::Flip => self.width - x,
        }
    }

    /// Image of `local` in tile `(row, col)`. Negative indices are allowed and
    /// name tiles left of / above the rendered window.
    pub fn tile_point(&self, local: Vec2, row: i32, col: i32) -> Vec2 {
        let x = if row.rem_euclid(2) == 1 {
            self.identify_v(local.x)
        } else {
            local.x
        };
        let y = if col.rem_euclid(2) == 1 {
            self.identify_h(local.y)
        } else {
            local.y
        };
        Vec2::new(x + col as f32 * self.width, y + row as f32 * self.height)
    }

    /// Images of `local` in every tile of the rendered window
    pub fn tile_coordinates(&self, local: Vec2) -> TileGrid<Vec2> {
        std::array::from_fn(|row| {
            std::array::from_fn(|col| self.tile_point(local, row as i32, col as i32))
        })
    }

    /// How a rigid translation of the tile-(0,0) copy by `delta` looks in tile
    /// `(row, col)`.
    pub fn tile_delta(&self, delta: Vec2, row: i32, col: i32) -> Vec2 {
        let dx = if row.rem_euclid(2) == 1 {
            delta.x * self.v_sign.factor()
        } else {
            delta.x
        };
        let dy = if col.rem_euclid(2) == 1 {
            delta.y * self.h_sign.factor()
        } else {
            delta.y
        };
        Vec2::new(dx, dy)
    }

    /// Maps any global point back to its representative in the fundamental
    /// domain. Inverse of [`Surface::tile_point`] for every tile.
    pub fn reflect_to_local(&self, global: Vec2) -> Vec2 {
        let col = (global.x / self.width).floor();
        let row = (global.y / self.height).floor();
        let mut x = global.x - col * self.width;
        let mut y = global.y - row * self.height;
        if (row as i64).rem_euclid(2) == 1 {
            x = self.identify_v(x);
        }
        if (col as i64).rem_euclid(2) == 1 {
            y = self.identify_h(y);
        }
        Vec2::new(x, y)
    }

    /// Offset of the home block's top-left corner from the tiling origin
    pub fn home_offset(&self) -> Vec2 {
        Vec2::new(HOME as f32 * self.width, HOME as f32 * self.height)
    }

    /// Whether `local` lies in the fundamental domain `[0,w) x [0,h)`
    pub fn contains_local(&self, local: Vec2) -> bool {
        (0.0..self.width).contains(&local.x) && (0.0..self.height).contains(&local.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const EPS: f32 = 1e-3;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < EPS
    }

    #[test]
    fn topologies_round_trip_through_signs() {
        for topology in Topology::ALL {
            let surface = Surface::from_topology(topology, 300.0, 200.0);
            assert_eq!(surface.topology(), topology);
            assert_eq!(topology.name().parse::<Topology>().unwrap(), topology);
        }
        assert!("mobius".parse::<Topology>().is_err());
    }

    #[test]
    fn identification_is_an_involution() {
        let mut rng = rand::thread_rng();
        for topology in Topology::ALL {
            let surface = Surface::from_topology(topology, 300.0, 250.0);
            for _ in 0..200 {
                let x = rng.gen_range(-600.0..900.0);
                let y = rng.gen_range(-600.0..900.0);
                assert!((surface.identify_v(surface.identify_v(x)) - x).abs() < EPS);
                assert!((surface.identify_h(surface.identify_h(y)) - y).abs() < EPS);
            }
        }
    }

    #[test]
    fn torus_identification_is_identity() {
        let surface = Surface::from_topology(Topology::Torus, 300.0, 300.0);
        assert_eq!(surface.identify_h(42.0), 42.0);
        assert_eq!(surface.identify_v(17.5), 17.5);
    }

    #[test]
    fn projective_plane_flips_both_axes() {
        let surface = Surface::from_topology(Topology::ProjectivePlane, 300.0, 200.0);
        assert_eq!(surface.identify_v(10.0), 290.0);
        assert_eq!(surface.identify_h(10.0), 190.0);
    }

    #[test]
    fn reflect_inverts_home_tile_image() {
        let mut rng = rand::thread_rng();
        for topology in Topology::ALL {
            let surface = Surface::from_topology(topology, 300.0, 240.0);
            for _ in 0..200 {
                let local = Vec2::new(rng.gen_range(1.0..299.0), rng.gen_range(1.0..239.0));
                let tiles = surface.tile_coordinates(local);
                assert!(close(surface.reflect_to_local(tiles[HOME][HOME]), local));
            }
        }
    }

    #[test]
    fn reflect_inverts_every_tile_image() {
        let surface = Surface::from_topology(Topology::ProjectivePlane, 300.0, 300.0);
        let local = Vec2::new(37.0, 211.0);
        let tiles = surface.tile_coordinates(local);
        for row in tiles.iter() {
            for image in row.iter() {
                assert!(close(surface.reflect_to_local(*image), local));
            }
        }
        let far = surface.tile_point(local, -3, -1);
        assert!(close(surface.reflect_to_local(far), local));
    }

    #[test]
    fn klein_bottle_flips_y_across_vertical_seam() {
        let surface = Surface::from_topology(Topology::KleinBottleV, 300.0, 300.0);
        let tiles = surface.tile_coordinates(Vec2::new(10.0, 20.0));
        assert!(close(tiles[0][0], Vec2::new(10.0, 20.0)));
        assert!(close(tiles[0][1], Vec2::new(310.0, 280.0)));
        assert!(close(tiles[1][0], Vec2::new(10.0, 320.0)));
    }

    #[test]
    fn tile_delta_matches_image_displacement() {
        let mut rng = rand::thread_rng();
        for topology in Topology::ALL {
            let surface = Surface::from_topology(topology, 300.0, 300.0);
            let local = Vec2::new(120.0, 80.0);
            let delta = Vec2::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0));
            for row in 0..TILES as i32 {
                for col in 0..TILES as i32 {
                    let moved = surface.tile_point(local + delta, row, col);
                    let expected = surface.tile_point(local, row, col)
                        + surface.tile_delta(delta, row, col);
                    assert!(close(moved, expected));
                }
            }
        }
    }
}
