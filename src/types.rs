use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, x: i32, y: i32) -> i32 {
        manhattan(self.x, self.y, x, y)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

pub fn manhattan(ax: i32, ay: i32, bx: i32, by: i32) -> i32 {
    (ax - bx).abs() + (ay - by).abs()
}

#[derive(Clone, Debug, Deserialize)]
pub struct BaseOwner {
    pub id: String,
    pub base: Position,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GameStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub players: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub me: Option<BaseOwner>,
    #[serde(default)]
    pub opponents: Vec<BaseOwner>,
    #[serde(default)]
    pub board_size: Option<(i32, i32)>,
    #[serde(default)]
    pub turn_length: Option<String>,
}

impl GameStatus {
    pub fn player_count(&self) -> usize {
        match &self.players {
            Some(players) => players.len(),
            None => self.opponents.len() + 1,
        }
    }

    pub fn is_started(&self) -> bool {
        self.status
            .as_deref()
            .map(|status| !status.eq_ignore_ascii_case("waiting"))
            .unwrap_or(true)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TurnStatus {
    pub is_me: bool,
    pub turn: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct IslandPayload {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub money_per_turn: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ShipPayload {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub custom: bool,
    pub hp: i64,
    pub max_hp: i64,
    pub position: (i32, i32),
    #[serde(default)]
    pub price: i64,
    pub shot_damage: i64,
    pub shot_range: i32,
    pub shots_left: i32,
    #[serde(default)]
    pub shots_per_turn: i32,
    pub units_left: i32,
    #[serde(default)]
    pub units_per_turn: i32,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PlayerPayload {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub hp: i64,
    pub me: bool,
    #[serde(default)]
    pub money: Option<i64>,
    #[serde(default)]
    pub ships: Vec<ShipPayload>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub custom: bool,
    pub max_hp: i64,
    pub price: i64,
    pub shot_damage: i64,
    pub shot_range: i32,
    pub shots_per_turn: i32,
    pub units_per_turn: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipAction {
    Move,
    Shoot,
}

/// Body of `POST /ship`. Exactly one of `position` and `relative` is set.
#[derive(Clone, Debug, Serialize)]
pub struct ShipCommand {
    pub action: ShipAction,
    pub ship: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<(i32, i32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative: Option<(i32, i32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MoveResponse {
    pub position: (i32, i32),
}

#[derive(Clone, Debug, Serialize)]
pub struct PurchaseRequest {
    pub ship: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PurchaseResponse {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConflictBody {
    pub code: u32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub ship: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateGameRequest {
    pub length: i32,
    pub width: i32,
    pub money_per_turn: i64,
    pub initial_hp: i64,
    pub turn_length: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct JoinGameRequest {
    pub game_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GameCredentials {
    pub game_id: String,
    pub token: String,
}
