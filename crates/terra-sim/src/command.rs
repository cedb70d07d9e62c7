use crate::nation::ArrowType;

/// Everything the updater consumes for one tick, drained from the room's
/// command channel in FIFO order. Validation (credentials, affordability,
/// numeric bounds) already happened at intake; a command that reaches here
/// that is still inapplicable (e.g. target now owned by someone else) is
/// silently dropped rather than erroring, per §4.E.
#[derive(Debug, Clone)]
pub enum Command {
    Join { user_id: String, password: String },
    FoundNation { owner: String, x: u32, y: u32 },
    BuildCity { owner: String, x: u32, y: u32, city_type: String, name: Option<String> },
    BuildStructure { owner: String, x: u32, y: u32, structure_type: String },
    Arrow { owner: String, arrow_type: ArrowType, path: Vec<(u32, u32)>, percent: f32 },
    ClearArrow { owner: String, arrow_type: ArrowType },
    SetTroopTarget { owner: String, target: f32 },
    SetAttackPercent { owner: String, percent: f32 },
    Quit { owner: String },
    Pause,
    Unpause,
    End,
}

impl Command {
    pub fn owner(&self) -> Option<&str> {
        match self {
            Command::FoundNation { owner, .. }
            | Command::BuildCity { owner, .. }
            | Command::BuildStructure { owner, .. }
            | Command::Arrow { owner, .. }
            | Command::ClearArrow { owner, .. }
            | Command::SetTroopTarget { owner, .. }
            | Command::SetAttackPercent { owner, .. }
            | Command::Quit { owner } => Some(owner),
            Command::Join { .. } | Command::Pause | Command::Unpause | Command::End => None,
        }
    }
}
