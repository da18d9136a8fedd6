use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSource {
    Human,
    Bot,
}

impl ControlSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "human" => Some(Self::Human),
            "bot" => Some(Self::Bot),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Orange,
    Purple,
    Yellow,
}

impl PlayerColor {
    pub const ALL: [PlayerColor; 6] = [
        PlayerColor::Red,
        PlayerColor::Blue,
        PlayerColor::Green,
        PlayerColor::Orange,
        PlayerColor::Purple,
        PlayerColor::Yellow,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "red" => Some(Self::Red),
            "blue" => Some(Self::Blue),
            "green" => Some(Self::Green),
            "orange" => Some(Self::Orange),
            "purple" => Some(Self::Purple),
            "yellow" => Some(Self::Yellow),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::Blue => "Blue",
            Self::Green => "Green",
            Self::Orange => "Orange",
            Self::Purple => "Purple",
            Self::Yellow => "Yellow",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    SpeedBoost,
    Slow,
    Invincibility,
    ControlReverse,
    Invisibility,
    AreaPaint,
}

impl PowerUpKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "speed" | "speed_boost" => Some(Self::SpeedBoost),
            "slow" | "slowdown" => Some(Self::Slow),
            "invincibility" => Some(Self::Invincibility),
            "reverse" | "control_reverse" => Some(Self::ControlReverse),
            "invisible" | "invisibility" => Some(Self::Invisibility),
            "explosion" | "area_paint" => Some(Self::AreaPaint),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Idle,
    Running,
    Ended,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Vec2) -> f32 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyBindings {
    pub left: String,
    pub right: String,
}

impl KeyBindings {
    pub fn new(left: &str, right: &str) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub id: String,
    pub letter: char,
    pub color: PlayerColor,
    pub control: ControlSource,
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    pub speed: f32,
    pub moving: bool,
    #[serde(rename = "turningLeft")]
    pub turning_left: bool,
    #[serde(rename = "turningRight")]
    pub turning_right: bool,
    pub blocked: bool,
    #[serde(rename = "blockedUntil")]
    pub blocked_until: u64,
    pub invincible: bool,
    pub invisible: bool,
    pub reversed: bool,
    #[serde(rename = "speedEffectUntil")]
    pub speed_effect_until: u64,
    #[serde(rename = "invincibleUntil")]
    pub invincible_until: u64,
    #[serde(rename = "invisibleUntil")]
    pub invisible_until: u64,
    #[serde(rename = "reversedUntil")]
    pub reversed_until: u64,
}

impl PlayerView {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PowerUpView {
    pub id: String,
    pub kind: PowerUpKind,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "createdAtMs")]
    pub created_at_ms: u64,
    pub consumed: bool,
}

impl PowerUpView {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ArenaView {
    pub width: f32,
    pub height: f32,
    #[serde(rename = "cellSize")]
    pub cell_size: f32,
    pub cols: usize,
    pub rows: usize,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct CoverageEntry {
    pub color: PlayerColor,
    pub percent: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Winner {
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub letter: char,
    pub color: PlayerColor,
    pub coverage: f32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    RoundStarted {
        #[serde(rename = "remainingSecs")]
        remaining_secs: u32,
    },
    RoundEnded {
        winner: Option<Winner>,
    },
    PowerUpSpawned {
        #[serde(rename = "powerUp")]
        power_up: PowerUpView,
    },
    PowerUpTaken {
        #[serde(rename = "powerUpId")]
        power_up_id: String,
        kind: PowerUpKind,
        by: String,
    },
    PowerUpExpired {
        #[serde(rename = "powerUpId")]
        power_up_id: String,
    },
    PlayersCollided {
        a: String,
        b: String,
    },
    EffectExpired {
        #[serde(rename = "playerId")]
        player_id: String,
        kind: PowerUpKind,
    },
    PlayerUnblocked {
        #[serde(rename = "playerId")]
        player_id: String,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "nowMs")]
    pub now_ms: u64,
    #[serde(rename = "remainingSecs")]
    pub remaining_secs: u32,
    pub phase: RoundPhase,
    pub arena: ArenaView,
    pub players: Vec<PlayerView>,
    #[serde(rename = "powerUps")]
    pub power_ups: Vec<PowerUpView>,
    pub cells: Vec<Option<PlayerColor>>,
    pub coverage: Vec<CoverageEntry>,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoreEntry {
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub letter: char,
    pub color: PlayerColor,
    pub control: ControlSource,
    pub coverage: f32,
    #[serde(rename = "powerUps")]
    pub power_ups: i32,
    pub collisions: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoundSummary {
    pub winner: Option<Winner>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub ranking: Vec<ScoreEntry>,
}

#[derive(Clone, Debug)]
pub struct StartPlayer {
    pub id: String,
    pub color: PlayerColor,
    pub control: ControlSource,
    pub keys: Option<KeyBindings>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(PlayerColor::parse(" RED "), Some(PlayerColor::Red));
        assert_eq!(ControlSource::parse("Bot"), Some(ControlSource::Bot));
        assert_eq!(PlayerColor::parse("magenta"), None);
    }

    #[test]
    fn power_up_kind_accepts_prototype_tags() {
        assert_eq!(PowerUpKind::parse("speed"), Some(PowerUpKind::SpeedBoost));
        assert_eq!(PowerUpKind::parse("slowdown"), Some(PowerUpKind::Slow));
        assert_eq!(PowerUpKind::parse("reverse"), Some(PowerUpKind::ControlReverse));
        assert_eq!(PowerUpKind::parse("invisible"), Some(PowerUpKind::Invisibility));
        assert_eq!(PowerUpKind::parse("explosion"), Some(PowerUpKind::AreaPaint));
        assert_eq!(PowerUpKind::parse("shield"), None);
    }

    #[test]
    fn runtime_event_is_tagged() {
        let event = RuntimeEvent::PlayersCollided {
            a: "p1".to_string(),
            b: "p2".to_string(),
        };
        let value = serde_json::to_value(&event).expect("event serializes");
        assert_eq!(value["type"], "players_collided");
        assert_eq!(value["a"], "p1");
    }

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(Vec2::new(0.0, 0.0).distance_to(Vec2::new(3.0, 4.0)), 5.0);
    }
}
