use crate::error::Result;
use crate::types::Position;

/// The one command the autopilot needs from whatever talks to the game.
#[allow(async_fn_in_trait)]
pub trait GameTransport {
    /// Moves a ship by a relative offset and returns where it ended up.
    /// A taken destination must surface as `GameError::CellOccupied`.
    async fn move_ship_relative(&mut self, ship_id: &str, dx: i32, dy: i32) -> Result<Position>;
}
