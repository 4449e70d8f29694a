use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerClass {
    Warrior,
    Archer,
    Mage,
    Healer,
}

impl PlayerClass {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "warrior" => Some(Self::Warrior),
            "archer" => Some(Self::Archer),
            "mage" => Some(Self::Mage),
            "healer" => Some(Self::Healer),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Warrior => "warrior",
            Self::Archer => "archer",
            Self::Mage => "mage",
            Self::Healer => "healer",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcherStance {
    Move,
    Ready,
}

impl ArcherStance {
    pub fn toggled(self) -> Self {
        match self {
            Self::Move => Self::Ready,
            Self::Ready => Self::Move,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Move => "Move",
            Self::Ready => "Ready",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyKind {
    Melee,
    Ranged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BossPhase {
    One,
    Two,
    Three,
    Four,
}

impl BossPhase {
    pub fn index(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Player,
    Enemy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    BossSpawn,
    Ember,
}

#[derive(Clone, Debug, Serialize)]
pub struct SelfView {
    pub id: u32,
    pub name: String,
    pub class: PlayerClass,
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub floor: u8,
    pub alive: bool,
    pub x: f32,
    pub y: f32,
    pub archer_stance: ArcherStance,
    pub special_cd: f32,
    pub special_cd_left: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub id: u32,
    pub name: String,
    pub class: PlayerClass,
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub floor: u8,
    pub alive: bool,
    pub x: f32,
    pub y: f32,
    pub archer_stance: ArcherStance,
}

#[derive(Clone, Debug, Serialize)]
pub struct EnemyView {
    pub id: u32,
    pub name: String,
    pub kind: EnemyKind,
    pub hp: i32,
    pub max_hp: i32,
    pub boss: bool,
    pub miniboss: bool,
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct DoorView {
    pub open: bool,
    pub x: Option<f32>,
    pub y: Option<f32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HazardView {
    pub kind: HazardKind,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// False while the zone is only telegraphed.
    pub active: bool,
    pub time_left: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct LevelView {
    pub floor: u8,
    pub width: f32,
    pub height: f32,
    pub shield_active: bool,
    pub enemies: Vec<EnemyView>,
    pub next_respawn_in: u64,
    pub door: DoorView,
    pub hazards: Vec<HazardView>,
    pub boss_phase: Option<u8>,
    pub boss_spawn_circle: Option<HazardView>,
    pub boss_adds_alive: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TargetRef {
    pub kind: ActorKind,
    pub id: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct AttackEvent {
    pub floor: u8,
    pub attacker_type: ActorKind,
    pub attacker_id: u32,
    pub attacker_name: String,
    pub from_x: f32,
    pub from_y: f32,
    pub target_type: ActorKind,
    pub target_id: u32,
    pub target_name: String,
    pub to_x: f32,
    pub to_y: f32,
    /// Negative values are heals.
    pub damage: i32,
    pub special: bool,
    /// Set for projectiles so the client can steer the effect at a moving target.
    pub homing: Option<TargetRef>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        msg: String,
        player_id: u32,
    },
    Event {
        msg: String,
    },
    Error {
        msg: String,
    },
    State {
        you: SelfView,
        level: LevelView,
        players: Vec<PlayerView>,
    },
    Attack(AttackEvent),
}

/// A gameplay intent decoded from a client command line.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Move {
        dx: f32,
        dy: f32,
    },
    Attack {
        target_enemy_id: Option<u32>,
        target_player_id: Option<u32>,
    },
    Special {
        target_player_id: Option<u32>,
    },
    Resurrect {
        target_player_id: Option<u32>,
        target_name: Option<String>,
    },
    EnterDoor,
    Status,
    Who,
    Help,
    Unknown(String),
}

impl Command {
    /// Commands a dead player may still issue.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Status | Self::Who | Self::Help)
    }

    /// Whether the command can change what floor-mates see.
    pub fn changes_world(&self) -> bool {
        !self.is_read_only() && !matches!(self, Self::Unknown(_))
    }
}
