use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::territory::Territory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NationStatus {
    Active,
    Defeated,
    Winner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowType {
    Attack,
    Defend,
}

/// Invariant: `path` is 8-connected and begins at a cell the owner held
/// when the arrow was issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrowOrder {
    pub arrow_type: ArrowType,
    pub path: Vec<(u32, u32)>,
    pub remaining_power: f32,
    pub current_index: usize,
    pub percent: f32,
}

impl ArrowOrder {
    pub fn is_complete(&self) -> bool {
        self.current_index + 1 >= self.path.len()
    }

    pub fn current_cell(&self) -> (u32, u32) {
        self.path[self.current_index.min(self.path.len().saturating_sub(1))]
    }

    pub fn next_cell(&self) -> Option<(u32, u32)> {
        self.path.get(self.current_index + 1).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub x: u32,
    pub y: u32,
    pub city_type: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub x: u32,
    pub y: u32,
    pub structure_type: String,
}

/// A player's in-game entity: owner + territory + resources + units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nation {
    pub owner: String,
    pub starting_cell: (u32, u32),
    pub territory: Territory,
    pub population: f32,
    pub national_will: i32,
    pub resources: BTreeMap<String, f32>,
    pub cities: Vec<City>,
    pub structures: Vec<Structure>,
    pub attack_arrows: Vec<ArrowOrder>,
    pub defend_arrow: Option<ArrowOrder>,
    pub troop_target: f32,
    pub attack_percent: f32,
    pub status: NationStatus,
    pub auto_city: bool,
}

impl Nation {
    /// A freshly founded nation: single starting cell, population 100,
    /// nationalWill 50 (matches scenario S2's literal expectation).
    pub fn found(owner: impl Into<String>, x: u32, y: u32) -> Self {
        let mut territory = Territory::new();
        territory.insert(x, y);
        Self {
            owner: owner.into(),
            starting_cell: (x, y),
            territory,
            population: 100.0,
            national_will: 50,
            resources: BTreeMap::new(),
            cities: Vec::new(),
            structures: Vec::new(),
            attack_arrows: Vec::new(),
            defend_arrow: None,
            troop_target: 0.5,
            attack_percent: 0.25,
            status: NationStatus::Active,
            auto_city: false,
        }
    }

    pub fn territory_cells(&self) -> usize {
        self.territory.len()
    }

    /// Empties territory and discards cities/structures/arrows, per the
    /// defeat invariant: a defeated nation has no arrows and no land.
    pub fn mark_defeated(&mut self) {
        self.territory.clear();
        self.cities.clear();
        self.structures.clear();
        self.attack_arrows.clear();
        self.defend_arrow = None;
        self.status = NationStatus::Defeated;
    }

    pub fn mark_winner(&mut self) {
        self.status = NationStatus::Winner;
    }

    pub fn is_active(&self) -> bool {
        self.status == NationStatus::Active
    }
}
