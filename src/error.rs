use thiserror::Error;

use crate::constants::{
    CONFLICT_ALREADY_REGISTERED, CONFLICT_CANNOT_ACCESS_SHIP, CONFLICT_CANNOT_ATTACK_HOME_BASE,
    CONFLICT_INSUFFICIENT_FUNDS, CONFLICT_NOT_YOUR_TURN, CONFLICT_OUT_OF_SHOTS,
    CONFLICT_POSITION_OCCUPIED, CONFLICT_SHIP_IN_THE_WAY, CONFLICT_TARGET_OUT_OF_BOUNDS,
    CONFLICT_TARGET_OUT_OF_RANGE,
};

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Debug, Error)]
pub enum GameError {
    /// The destination cell of a move is taken. Turn-local; the autopilot
    /// retries once and then drops it.
    #[error("cell is occupied: {0}")]
    CellOccupied(String),

    #[error("there are no free cells within {radius} units of ({x}, {y})")]
    NoFreeCell { x: i32, y: i32, radius: i32 },

    #[error("ship {ship_id} has no attribute '{key}'")]
    AttributeMissing { ship_id: String, key: String },

    #[error("attribute '{key}' of ship {ship_id} has an unexpected type: {source}")]
    AttributeType {
        ship_id: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("attribute '{key}' is not JSON serializable: {source}")]
    NotSerializable {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("the game has ended")]
    GameEnded,

    #[error(
        "the game has not been started yet; call `start_game` if you created it \
         or `wait_for_game_start` to block until it starts"
    )]
    GameNotStarted,

    #[error("not your turn: {0}")]
    NotYourTurn(String),

    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    /// Buying a ship failed because one of ours sits on the base.
    #[error("ship {ship_id:?} is in the way: {message}")]
    ShipInTheWay {
        ship_id: Option<String>,
        message: String,
    },

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("cannot access ship: {0}")]
    CanNotAccessShip(String),

    #[error("out of shots: {0}")]
    OutOfShots(String),

    #[error("cannot attack a home base: {0}")]
    CannotAttackHomeBase(String),

    #[error("target out of range: {0}")]
    TargetOutOfRange(String),

    #[error("target out of bounds: {0}")]
    TargetOutOfBounds(String),

    #[error("conflict {code}: {message}")]
    Conflict { code: u32, message: String },

    #[error("ship {0} is not known")]
    UnknownShip(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode server payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed server payload: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GameError {
    /// Maps a 409 body to its typed condition; unknown codes stay generic.
    pub fn from_conflict(code: u32, message: String, ship_id: Option<String>) -> Self {
        match code {
            CONFLICT_NOT_YOUR_TURN => Self::NotYourTurn(message),
            CONFLICT_ALREADY_REGISTERED => Self::AlreadyRegistered(message),
            CONFLICT_SHIP_IN_THE_WAY => Self::ShipInTheWay { ship_id, message },
            CONFLICT_INSUFFICIENT_FUNDS => Self::InsufficientFunds(message),
            CONFLICT_CANNOT_ACCESS_SHIP => Self::CanNotAccessShip(message),
            CONFLICT_OUT_OF_SHOTS => Self::OutOfShots(message),
            CONFLICT_CANNOT_ATTACK_HOME_BASE => Self::CannotAttackHomeBase(message),
            CONFLICT_TARGET_OUT_OF_RANGE => Self::TargetOutOfRange(message),
            CONFLICT_POSITION_OCCUPIED => Self::CellOccupied(message),
            CONFLICT_TARGET_OUT_OF_BOUNDS => Self::TargetOutOfBounds(message),
            _ => Self::Conflict { code, message },
        }
    }

    pub fn is_cell_occupied(&self) -> bool {
        matches!(self, Self::CellOccupied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_codes_map_to_typed_errors() {
        assert!(GameError::from_conflict(9, "taken".to_string(), None).is_cell_occupied());
        assert!(matches!(
            GameError::from_conflict(1, "wait".to_string(), None),
            GameError::NotYourTurn(_)
        ));
        match GameError::from_conflict(3, "blocked".to_string(), Some("s1".to_string())) {
            GameError::ShipInTheWay { ship_id, message } => {
                assert_eq!(ship_id.as_deref(), Some("s1"));
                assert_eq!(message, "blocked");
            }
            other => panic!("expected ship in the way, got {other:?}"),
        }
    }

    #[test]
    fn unknown_conflict_code_stays_generic() {
        assert!(matches!(
            GameError::from_conflict(42, "odd".to_string(), None),
            GameError::Conflict { code: 42, .. }
        ));
    }
}
