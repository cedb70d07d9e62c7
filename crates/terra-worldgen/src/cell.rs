//! Cell and map value types. Cells are immutable once generated.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Biome {
    Ocean,
    Coastal,
    Mountain,
    Desert,
    Savanna,
    TropicalForest,
    Rainforest,
    Tundra,
    Taiga,
    Grassland,
    Woodland,
    Forest,
    River,
}

impl Biome {
    pub const ALL: [Biome; 13] = [
        Biome::Ocean,
        Biome::Coastal,
        Biome::Mountain,
        Biome::Desert,
        Biome::Savanna,
        Biome::TropicalForest,
        Biome::Rainforest,
        Biome::Tundra,
        Biome::Taiga,
        Biome::Grassland,
        Biome::Woodland,
        Biome::Forest,
        Biome::River,
    ];

    pub fn index(self) -> u8 {
        Self::ALL.iter().position(|b| *b == self).unwrap() as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Biome::Ocean => "OCEAN",
            Biome::Coastal => "COASTAL",
            Biome::Mountain => "MOUNTAIN",
            Biome::Desert => "DESERT",
            Biome::Savanna => "SAVANNA",
            Biome::TropicalForest => "TROPICAL_FOREST",
            Biome::Rainforest => "RAINFOREST",
            Biome::Tundra => "TUNDRA",
            Biome::Taiga => "TAIGA",
            Biome::Grassland => "GRASSLAND",
            Biome::Woodland => "WOODLAND",
            Biome::Forest => "FOREST",
            Biome::River => "RIVER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Peaks,
    Cliffs,
    Hills,
    Springs,
    Lowlands,
    Wetlands,
    Marshes,
    FertileValleys,
    River,
}

impl Feature {
    pub const ALL: [Feature; 9] = [
        Feature::Peaks,
        Feature::Cliffs,
        Feature::Hills,
        Feature::Springs,
        Feature::Lowlands,
        Feature::Wetlands,
        Feature::Marshes,
        Feature::FertileValleys,
        Feature::River,
    ];

    pub fn index(self) -> u8 {
        Self::ALL.iter().position(|f| *f == self).unwrap() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Food,
    Wood,
    Stone,
    Iron,
    Gold,
    Horses,
}

impl Resource {
    pub const ALL: [Resource; 6] = [
        Resource::Food,
        Resource::Wood,
        Resource::Stone,
        Resource::Iron,
        Resource::Gold,
        Resource::Horses,
    ];

    pub fn index(self) -> u8 {
        Self::ALL.iter().position(|r| *r == self).unwrap() as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
    pub elevation: f32,
    pub moisture: f32,
    pub temperature: f32,
    pub biome: Biome,
    pub is_river: bool,
    pub features: Vec<Feature>,
    pub resources: Vec<Resource>,
}

impl Cell {
    pub fn is_land(&self, sea_level: f32) -> bool {
        self.elevation >= sea_level
    }
}

/// A generated width x height grid, row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Map {
    pub width: u32,
    pub height: u32,
    pub cells: Vec<Cell>,
}

impl Map {
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn get(&self, x: u32, y: u32) -> &Cell {
        &self.cells[self.index(x, y)]
    }

    pub fn get_mut(&mut self, x: u32, y: u32) -> &mut Cell {
        let i = self.index(x, y);
        &mut self.cells[i]
    }

    pub fn neighbors4(&self, x: u32, y: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let w = self.width;
        let h = self.height;
        [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .filter_map(move |(dx, dy)| {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx >= 0 && ny >= 0 && (nx as u32) < w && (ny as u32) < h {
                    Some((nx as u32, ny as u32))
                } else {
                    None
                }
            })
    }

    pub fn neighbors8(&self, x: u32, y: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let w = self.width;
        let h = self.height;
        (-1i64..=1)
            .flat_map(|dx| (-1i64..=1).map(move |dy| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .filter_map(move |(dx, dy)| {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx >= 0 && ny >= 0 && (nx as u32) < w && (ny as u32) < h {
                    Some((nx as u32, ny as u32))
                } else {
                    None
                }
            })
    }
}
