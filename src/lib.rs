pub mod autopilot;
pub mod board;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod planner;
pub mod registration;
pub mod sandbox;
pub mod session;
pub mod spatial;
pub mod store;
pub mod target_store;
pub mod transport;
pub mod types;

pub use autopilot::{run_autopilot_cycle, AutopilotReport};
pub use board::{Board, Island, Player, Ship};
pub use client::HttpGameClient;
pub use error::{GameError, Result};
pub use session::{Bot, GameSession, TurnContext};
pub use spatial::SpatialIndex;
pub use target_store::{ShipTarget, TargetStore};
pub use transport::GameTransport;
pub use types::Position;
