pub const DEFAULT_URL_BASE: &str = "https://battleshapi.pythonanywhere.com/api/aircraft_carrier";
pub const DEFAULT_LOCAL_DATA_PATH: &str = "local_data.json";

pub const DEFAULT_POLL_MS: u64 = 500;
pub const MIN_POLL_MS: u64 = 300;

pub const TOKEN_HEADER: &str = "token";

pub const CONFLICT_NOT_YOUR_TURN: u32 = 1;
pub const CONFLICT_ALREADY_REGISTERED: u32 = 2;
pub const CONFLICT_SHIP_IN_THE_WAY: u32 = 3;
pub const CONFLICT_INSUFFICIENT_FUNDS: u32 = 4;
pub const CONFLICT_CANNOT_ACCESS_SHIP: u32 = 5;
pub const CONFLICT_OUT_OF_SHOTS: u32 = 6;
pub const CONFLICT_CANNOT_ATTACK_HOME_BASE: u32 = 7;
pub const CONFLICT_TARGET_OUT_OF_RANGE: u32 = 8;
pub const CONFLICT_POSITION_OCCUPIED: u32 = 9;
pub const CONFLICT_TARGET_OUT_OF_BOUNDS: u32 = 10;

pub const DEFAULT_GAME_LENGTH: i32 = 50;
pub const DEFAULT_GAME_WIDTH: i32 = 50;
pub const DEFAULT_MONEY_PER_TURN: i64 = 100;
pub const DEFAULT_INITIAL_HP: i64 = 1000;
pub const DEFAULT_TURN_LENGTH_SECS: u64 = 5;

/// Sleeps between polls never drop below the floor, however long the last
/// poll took.
pub fn poll_delay_ms(poll_every_ms: u64, elapsed_ms: u64) -> u64 {
    poll_every_ms.saturating_sub(elapsed_ms).max(MIN_POLL_MS)
}
