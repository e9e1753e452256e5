use reqwest::Method;
use serde::Serialize;
use tracing::info;

use crate::client::{check_status, decode, HttpGameClient};
use crate::constants::{
    DEFAULT_GAME_LENGTH, DEFAULT_GAME_WIDTH, DEFAULT_INITIAL_HP, DEFAULT_MONEY_PER_TURN,
    DEFAULT_TURN_LENGTH_SECS,
};
use crate::error::Result;
use crate::types::{CreateGameRequest, GameCredentials, JoinGameRequest};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSettings {
    pub length: i32,
    pub width: i32,
    pub money_per_turn: i64,
    pub initial_hp: i64,
    pub turn_length_secs: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            length: DEFAULT_GAME_LENGTH,
            width: DEFAULT_GAME_WIDTH,
            money_per_turn: DEFAULT_MONEY_PER_TURN,
            initial_hp: DEFAULT_INITIAL_HP,
            turn_length_secs: DEFAULT_TURN_LENGTH_SECS,
        }
    }
}

/// Account-level access: creates or joins games with basic auth and hands
/// back a token-scoped [`HttpGameClient`].
#[derive(Clone, Debug)]
pub struct Registration {
    http: reqwest::Client,
    url_base: String,
    client_id: String,
    client_secret: String,
}

impl Registration {
    pub fn new(url_base: impl Into<String>, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url_base: url_base.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Creates a game we are automatically part of. Share the returned game id
    /// with the other players.
    pub async fn create_game(&self, settings: &GameSettings) -> Result<GameCredentials> {
        let body = CreateGameRequest {
            length: settings.length,
            width: settings.width,
            money_per_turn: settings.money_per_turn,
            initial_hp: settings.initial_hp,
            turn_length: settings.turn_length_secs,
        };
        let credentials = self.register(&body).await?;
        info!(game_id = %credentials.game_id, "created game");
        Ok(credentials)
    }

    pub async fn join_game(&self, game_id: &str) -> Result<GameCredentials> {
        let body = JoinGameRequest {
            game_id: game_id.to_string(),
        };
        let credentials = self.register(&body).await?;
        info!(game_id = %credentials.game_id, "joined game");
        Ok(credentials)
    }

    /// Attaches to a game this account already joined.
    pub fn connect(&self, credentials: &GameCredentials) -> HttpGameClient {
        HttpGameClient::with_http(self.http.clone(), self.url_base.clone(), credentials.token.clone())
    }

    async fn register<B: Serialize>(&self, body: &B) -> Result<GameCredentials> {
        let response = self
            .http
            .request(Method::POST, format!("{}/game", self.url_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .json(body)
            .send()
            .await?;
        decode(check_status(response).await?).await
    }
}
