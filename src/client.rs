use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::constants::TOKEN_HEADER;
use crate::error::{GameError, Result};
use crate::transport::GameTransport;
use crate::types::{
    ConflictBody, GameStatus, IslandPayload, MoveResponse, PlayerPayload, Position,
    PurchaseRequest, PurchaseResponse, ShipAction, ShipCommand, StoreItem, TurnStatus,
};

/// Token-scoped client for one game. Every call carries the `token` header.
#[derive(Clone, Debug)]
pub struct HttpGameClient {
    http: reqwest::Client,
    url_base: String,
    token: String,
}

impl HttpGameClient {
    pub fn new(url_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), url_base, token)
    }

    pub fn with_http(http: reqwest::Client, url_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            url_base: url_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn url_base(&self) -> &str {
        &self.url_base
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub async fn status(&self) -> Result<GameStatus> {
        self.get("/game").await
    }

    pub async fn player_count(&self) -> Result<usize> {
        Ok(self.status().await?.player_count())
    }

    pub async fn is_game_started(&self) -> Result<bool> {
        Ok(self.status().await?.is_started())
    }

    pub async fn start_game(&self) -> Result<()> {
        self.send(self.request(Method::PUT, "/game")).await?;
        Ok(())
    }

    pub async fn turn(&self) -> Result<TurnStatus> {
        self.get("/turn").await
    }

    /// Ending a turn that is not ours is a no-op.
    pub async fn end_turn(&self) -> Result<()> {
        match self.send(self.request(Method::POST, "/turn")).await {
            Ok(_) | Err(GameError::NotYourTurn(_)) => Ok(()),
            Err(error) => Err(error),
        }
    }

    pub async fn islands(&self) -> Result<Vec<IslandPayload>> {
        self.get("/island").await
    }

    pub async fn ships(&self) -> Result<Vec<PlayerPayload>> {
        self.get("/ship").await
    }

    pub async fn store(&self) -> Result<Vec<StoreItem>> {
        self.get("/store").await
    }

    /// Buys a ship type from the store and returns the new ship's id.
    pub async fn buy_ship(&self, store_id: &str) -> Result<String> {
        let body = PurchaseRequest {
            ship: store_id.to_string(),
        };
        let response: PurchaseResponse = self.post("/store", &body).await?;
        Ok(response.id)
    }

    pub async fn move_ship(&self, ship_id: &str, x: i32, y: i32) -> Result<Position> {
        self.move_command(ShipCommand {
            action: ShipAction::Move,
            ship: ship_id.to_string(),
            position: Some((x, y)),
            relative: None,
            repeat: None,
        })
        .await
    }

    pub async fn move_ship_relative(&self, ship_id: &str, dx: i32, dy: i32) -> Result<Position> {
        self.move_command(ShipCommand {
            action: ShipAction::Move,
            ship: ship_id.to_string(),
            position: None,
            relative: Some((dx, dy)),
            repeat: None,
        })
        .await
    }

    pub async fn shoot_ship(&self, ship_id: &str, x: i32, y: i32, repeat: u32) -> Result<()> {
        self.shoot_command(ShipCommand {
            action: ShipAction::Shoot,
            ship: ship_id.to_string(),
            position: Some((x, y)),
            relative: None,
            repeat: Some(repeat),
        })
        .await
    }

    pub async fn shoot_ship_relative(&self, ship_id: &str, dx: i32, dy: i32, repeat: u32) -> Result<()> {
        self.shoot_command(ShipCommand {
            action: ShipAction::Shoot,
            ship: ship_id.to_string(),
            position: None,
            relative: Some((dx, dy)),
            repeat: Some(repeat),
        })
        .await
    }

    async fn move_command(&self, command: ShipCommand) -> Result<Position> {
        let response: MoveResponse = self.post("/ship", &command).await?;
        Ok(response.position.into())
    }

    async fn shoot_command(&self, command: ShipCommand) -> Result<()> {
        self.send(self.request(Method::POST, "/ship").json(&command))
            .await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "game request");
        self.http
            .request(method, format!("{}{}", self.url_base, path))
            .header(TOKEN_HEADER, &self.token)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        decode(response).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        check_status(response).await
    }
}

// Implemented on the shared reference so a session can drive the autopilot
// while its board and targets are borrowed mutably.
impl GameTransport for &HttpGameClient {
    async fn move_ship_relative(&mut self, ship_id: &str, dx: i32, dy: i32) -> Result<Position> {
        HttpGameClient::move_ship_relative(*self, ship_id, dx, dy).await
    }
}

/// 409 carries a typed conflict, 404 means the game is gone.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::CONFLICT {
        let text = response.text().await?;
        let body: ConflictBody = serde_json::from_str(&text)?;
        debug!(code = body.code, message = %body.message, "game conflict");
        return Err(GameError::from_conflict(body.code, body.message, body.ship));
    }
    if status == StatusCode::NOT_FOUND {
        return Err(GameError::GameEnded);
    }
    Ok(response.error_for_status()?)
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}
