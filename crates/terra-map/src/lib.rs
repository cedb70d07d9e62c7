//! Cell storage and chunked, bandwidth-capped map access (component C).
//!
//! Generated maps are immutable after creation; random cell reads are O(1)
//! once loaded, and `rows` slices the grid row-major to cap per-response
//! payload size.

use serde::{Deserialize, Serialize};
use terra_worldgen::{Biome, Cell, Feature, Map, Resource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapMetadata {
    pub width: u32,
    pub height: u32,
}

/// Compact, wire-friendly encoding of one cell: numeric indices instead of
/// enum names, paired with the mapping tables below to decode on the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellRow {
    pub elevation: f32,
    pub moisture: f32,
    pub temperature: f32,
    pub biome_idx: u8,
    pub is_river: bool,
    pub feature_idx: Vec<u8>,
    pub resource_idx: Vec<u8>,
}

impl From<&Cell> for CellRow {
    fn from(c: &Cell) -> Self {
        Self {
            elevation: c.elevation,
            moisture: c.moisture,
            temperature: c.temperature,
            biome_idx: c.biome.index(),
            is_river: c.is_river,
            feature_idx: c.features.iter().map(|f| f.index()).collect(),
            resource_idx: c.resources.iter().map(|r| r.index()).collect(),
        }
    }
}

/// Reverse-mapping tables from wire index to tag name, sent alongside the
/// first chunk of a map so the client only needs to look each index up once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mappings {
    pub biomes: Vec<&'static str>,
    pub features: Vec<&'static str>,
    pub resources: Vec<&'static str>,
}

impl Default for Mappings {
    fn default() -> Self {
        Self {
            biomes: Biome::ALL.iter().map(|b| b.name()).collect(),
            features: vec![
                "peaks",
                "cliffs",
                "hills",
                "springs",
                "lowlands",
                "wetlands",
                "marshes",
                "fertile_valleys",
                "river",
            ],
            resources: vec!["food", "wood", "stone", "iron", "gold", "horses"],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub start_row: u32,
    pub end_row: u32,
    pub total_rows: u32,
    pub chunk: Vec<Vec<CellRow>>,
    pub mappings: Option<Mappings>,
}

/// Holds one generated map and serves random-access and chunked reads.
#[derive(Debug, Clone)]
pub struct CellStore {
    map: Map,
    max_rows_per_chunk: u32,
}

impl CellStore {
    pub fn new(map: Map, max_rows_per_chunk: u32) -> Self {
        Self {
            map,
            max_rows_per_chunk: max_rows_per_chunk.max(1),
        }
    }

    pub fn metadata(&self) -> MapMetadata {
        MapMetadata {
            width: self.map.width,
            height: self.map.height,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> &Cell {
        self.map.get(x, y)
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn is_land(&self, x: u32, y: u32, sea_level: f32) -> bool {
        self.map.get(x, y).is_land(sea_level)
    }

    /// River cells satisfy `is_land` too (elevation >= sea_level), so a
    /// "foundable here" check needs both: not ocean, and not a river.
    pub fn is_river(&self, x: u32, y: u32) -> bool {
        self.map.get(x, y).is_river
    }

    /// Row-major slice `[startRow, endRow)`, capped at `max_rows_per_chunk`.
    /// Mapping tables are included only when `start_row == 0`.
    pub fn rows(&self, start_row: u32, end_row: u32) -> ChunkPayload {
        let end_row = end_row
            .min(self.map.height)
            .min(start_row.saturating_add(self.max_rows_per_chunk));
        let start_row = start_row.min(end_row);

        let mut chunk = Vec::with_capacity((end_row - start_row) as usize);
        for y in start_row..end_row {
            let mut row = Vec::with_capacity(self.map.width as usize);
            for x in 0..self.map.width {
                row.push(CellRow::from(self.map.get(x, y)));
            }
            chunk.push(row);
        }

        ChunkPayload {
            start_row,
            end_row,
            total_rows: self.map.height,
            chunk,
            mappings: (start_row == 0).then(Mappings::default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_core::config::WorldConfig;

    fn store() -> CellStore {
        let map = terra_worldgen::Generator::new(20, 20, 3, 2, WorldConfig::default())
            .unwrap()
            .generate();
        CellStore::new(map, 8)
    }

    #[test]
    fn rows_are_capped_at_max_chunk_size() {
        let s = store();
        let chunk = s.rows(0, 20);
        assert_eq!(chunk.start_row, 0);
        assert_eq!(chunk.end_row, 8);
        assert_eq!(chunk.chunk.len(), 8);
        assert!(chunk.mappings.is_some());
    }

    #[test]
    fn non_first_chunk_omits_mappings() {
        let s = store();
        let chunk = s.rows(8, 16);
        assert!(chunk.mappings.is_none());
        assert_eq!(chunk.start_row, 8);
    }

    #[test]
    fn random_access_matches_chunked_access() {
        let s = store();
        let chunk = s.rows(0, 4);
        for (row_offset, row) in chunk.chunk.iter().enumerate() {
            for (x, cell_row) in row.iter().enumerate() {
                let cell = s.get(x as u32, row_offset as u32);
                assert_eq!(cell_row.biome_idx, cell.biome.index());
            }
        }
    }
}
