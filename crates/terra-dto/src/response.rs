use serde::{Deserialize, Serialize};

/// Reverse-mapping tables from wire index to tag name, sent with the first
/// chunk of a map (component C).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMappings {
    pub biomes: Vec<String>,
    pub features: Vec<String>,
    pub resources: Vec<String>,
}

/// Paired coordinate arrays; the wire form territory and deltas are
/// serialized in, per the documented "require the paired-array form" note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub x: Vec<u32>,
    pub y: Vec<u32>,
}

impl Coords {
    pub fn len(&self) -> usize {
        self.x.len()
    }
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaCoords {
    pub add: Coords,
    pub sub: Coords,
}

/// Either an absolute territory (full sync) or an add/sub delta against the
/// subscriber's last acknowledged snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TerritoryPayload {
    Full {
        territory: Coords,
    },
    Delta {
        #[serde(rename = "territoryDeltaForClient")]
        territory_delta_for_client: DeltaCoords,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NationStatus {
    Active,
    Defeated,
    Winner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityDto {
    pub x: u32,
    pub y: u32,
    #[serde(rename = "type")]
    pub city_type: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureDto {
    pub x: u32,
    pub y: u32,
    #[serde(rename = "type")]
    pub structure_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationStateDto {
    pub owner: String,
    pub population: f32,
    #[serde(rename = "nationalWill")]
    pub national_will: i32,
    pub resources: std::collections::BTreeMap<String, f32>,
    pub cities: Vec<CityDto>,
    pub structures: Vec<StructureDto>,
    pub status: NationStatus,
    #[serde(rename = "troopTarget")]
    pub troop_target: f32,
    #[serde(rename = "attackPercent")]
    pub attack_percent: f32,
    #[serde(flatten)]
    pub territory: TerritoryPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateDto {
    pub nations: Vec<NationStateDto>,
    #[serde(rename = "winningNation", skip_serializing_if = "Option::is_none")]
    pub winning_nation: Option<WinningNationDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinningNationDto {
    pub owner: String,
}

/// Client -> server WebSocket control messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "userId")]
        user_id: String,
        password: String,
        #[serde(default)]
        full: Option<bool>,
    },
    Unsubscribe,
}

/// Server -> client WebSocket messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed {
        #[serde(rename = "roomId")]
        room_id: String,
        full: bool,
    },
    State {
        #[serde(rename = "tickCount")]
        tick_count: u64,
        #[serde(rename = "roomName")]
        room_name: String,
        #[serde(rename = "roomCreator")]
        room_creator: String,
        #[serde(rename = "gameState")]
        game_state: GameStateDto,
        #[serde(rename = "usePackedDeltas", skip_serializing_if = "Option::is_none")]
        use_packed_deltas: Option<bool>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ServerMessage always serializes")
    }

    /// The tick this message was produced on, for the monotone-delivery
    /// check consumers are required to apply (stale ticks are dropped).
    pub fn tick(&self) -> Option<u64> {
        match self {
            ServerMessage::State { tick_count, .. } => Some(*tick_count),
            _ => None,
        }
    }
}

impl ClientMessage {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
