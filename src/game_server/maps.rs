//! Maps - Built-in tracks
//!
//! A map is a single road ribbon registered as a terrain region, plus its
//! two borders drawn as curves. Borders have no physical effect.

use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::game_server::terrain::{Ground, TrackQuery};
use crate::topology::{
    EntityStyle, PathEntity, PolygonEntity, RenderSurface, Ribbon, Surface, TileTier,
};

/// Road width on every built-in map
pub const ROAD_WIDTH: f32 = 80.0;

const CIRCLE_SAMPLES: usize = 48;
const STRAIGHT_SAMPLES: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapId {
    /// Closed circular road around the domain centre
    PseudoCircle,
    /// Straight road at mid-height, closed through the vertical seam
    ZHomology,
}

impl MapId {
    pub const ALL: [MapId; 2] = [MapId::PseudoCircle, MapId::ZHomology];

    /// Short name used in configs and record paths
    pub fn name(self) -> &'static str {
        match self {
            MapId::PseudoCircle => "pseudo-circle",
            MapId::ZHomology => "z-homology",
        }
    }

    /// Center polyline of the road
    fn center_line(self, surface: &Surface) -> Vec<Vec2> {
        let (w, h) = (surface.width(), surface.height());
        let middle = Vec2::new(w / 2.0, h / 2.0);
        match self {
            MapId::PseudoCircle => {
                let radius = 0.3 * w.min(h);
                // two extra samples so the offsets close the loop
                (0..CIRCLE_SAMPLES + 2)
                    .map(|i| middle + radius * Vec2::from_angle(TAU * i as f32 / CIRCLE_SAMPLES as f32))
                    .collect()
            }
            MapId::ZHomology => {
                let step = w / STRAIGHT_SAMPLES as f32;
                (0..STRAIGHT_SAMPLES + 2)
                    .map(|i| Vec2::new(middle.x + i as f32 * step, middle.y))
                    .collect()
            }
        }
    }

    pub fn build(
        self,
        surface: Surface,
        render: &mut dyn RenderSurface,
        tier: TileTier,
    ) -> Result<Track> {
        let road = Ribbon::build(self.center_line(&surface), &[ROAD_WIDTH])?;

        let border_style = EntityStyle::new("white").priority(11).tier(tier);
        let borders = [
            PathEntity::curve(surface, render, road.offset_a.clone(), &border_style)?,
            PathEntity::curve(surface, render, road.offset_b.clone(), &border_style)?,
        ];

        let road_style = EntityStyle::new("gray").priority(10).tier(tier);
        let body = PolygonEntity::from_ribbon(surface, render, road.clone(), &road_style)?;
        let mut terrain = TrackQuery::new(Ground::OFF_ROAD);
        terrain.add_region(body, Ground::ROAD);

        log::debug!(
            "built map {} with {} road samples",
            self,
            road.center.len()
        );
        Ok(Track {
            map: self,
            terrain,
            road,
            borders,
        })
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MapId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MapId::ALL
            .into_iter()
            .find(|map| map.name() == s)
            .ok_or_else(|| Error::UnknownMap(s.to_string()))
    }
}

/// A built map
#[derive(Debug, Clone)]
pub struct Track {
    pub map: MapId,
    pub terrain: TrackQuery,
    pub road: Ribbon,
    pub borders: [PathEntity; 2],
}

impl Track {
    /// Hides the road and its borders
    pub fn hide(&mut self, render: &mut dyn RenderSurface) {
        self.terrain.hide(render);
        for border in &mut self.borders {
            border.hide(render);
        }
    }
}
