use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveTime, Timelike};
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

use crate::autopilot::{run_autopilot_cycle, AutopilotReport};
use crate::board::{Board, Player};
use crate::client::HttpGameClient;
use crate::constants::poll_delay_ms;
use crate::error::{GameError, Result};
use crate::spatial::SpatialIndex;
use crate::target_store::TargetStore;
use crate::types::{GameStatus, Position, StoreItem};

/// Game logic plugged into a [`GameSession`]. Only `on_turn_start` is
/// required; the turn is ended automatically after it returns.
#[allow(async_fn_in_trait)]
pub trait Bot {
    /// Runs once when the session is built, before the game starts.
    async fn on_create(&mut self, _client: &HttpGameClient) -> Result<()> {
        Ok(())
    }

    /// Runs once, before `on_turn_start` on our first turn. If a turn fails
    /// before it completes, it is tried again on the next one.
    async fn on_game_start(&mut self, _ctx: &mut TurnContext<'_>) -> Result<()> {
        Ok(())
    }

    async fn on_turn_start(&mut self, ctx: &mut TurnContext<'_>) -> Result<()>;

    /// Runs for each ship the autopilot brought to its target this turn.
    async fn on_ship_arrive(&mut self, _ctx: &mut TurnContext<'_>, _ship_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Everything a bot may touch during its turn.
pub struct TurnContext<'a> {
    pub client: &'a HttpGameClient,
    pub board: &'a mut Board,
    pub targets: &'a mut TargetStore,
    /// Our own turns played so far, starting at 1.
    pub turn: u32,
    pub turn_length: Option<Duration>,
    bases: &'a HashMap<String, Position>,
    running: &'a AtomicBool,
}

impl TurnContext<'_> {
    pub fn spatial(&self) -> SpatialIndex<'_> {
        SpatialIndex::new(&*self.board, &*self.targets)
    }

    pub fn set_target(&mut self, ship_id: &str, x: i32, y: i32) {
        self.targets.set_target(ship_id, x, y);
    }

    pub fn flush_targets(&self) -> Result<()> {
        self.targets.flush()
    }

    /// Ends the game loop after this turn.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn other_players(&self) -> Vec<&Player> {
        self.board.other_players().collect()
    }

    pub fn random_other_player(&self) -> Option<&Player> {
        self.other_players().choose(&mut rand::rng()).copied()
    }

    /// Re-reads every player and ship from the server.
    pub async fn refresh(&mut self) -> Result<()> {
        refresh_board(self.client, self.board, self.bases).await?;
        self.board.reconcile(self.targets);
        Ok(())
    }

    pub async fn store(&self) -> Result<Vec<StoreItem>> {
        self.client.store().await
    }

    /// Buys a ship onto our base. With `auto_move`, a ship of ours parked on
    /// the base is moved to the first free cell it can reach and the purchase
    /// is tried once more.
    pub async fn buy_ship(&mut self, store_id: &str, auto_move: bool) -> Result<String> {
        let ship_id = match self.client.buy_ship(store_id).await {
            Ok(ship_id) => ship_id,
            Err(GameError::ShipInTheWay {
                ship_id: Some(blocker),
                message,
            }) if auto_move => {
                debug!(%blocker, %message, "clearing base before purchase");
                self.clear_base(&blocker).await?;
                self.client.buy_ship(store_id).await?
            }
            Err(error) => return Err(error),
        };
        self.refresh().await?;
        Ok(ship_id)
    }

    async fn clear_base(&mut self, blocker: &str) -> Result<()> {
        let base = self
            .board
            .me()
            .map(|me| me.base)
            .ok_or_else(|| GameError::Protocol("no player is flagged as me".to_string()))?;
        let units = self
            .board
            .ship(blocker)
            .map(|ship| ship.units_left)
            .ok_or_else(|| GameError::UnknownShip(blocker.to_string()))?;
        let spot = self.spatial().free_position_in_radius(base.x, base.y, units)?;
        self.move_ship(blocker, spot.x, spot.y).await?;
        Ok(())
    }

    pub async fn move_ship(&mut self, ship_id: &str, x: i32, y: i32) -> Result<Position> {
        let position = self.client.move_ship(ship_id, x, y).await?;
        self.board.place_ship(ship_id, position);
        Ok(position)
    }

    pub async fn move_ship_relative(&mut self, ship_id: &str, dx: i32, dy: i32) -> Result<Position> {
        let position = self.client.move_ship_relative(ship_id, dx, dy).await?;
        self.board.place_ship(ship_id, position);
        Ok(position)
    }

    pub async fn shoot_ship(&self, ship_id: &str, x: i32, y: i32, repeat: u32) -> Result<()> {
        self.client.shoot_ship(ship_id, x, y, repeat).await
    }

    pub async fn shoot_ship_relative(&self, ship_id: &str, dx: i32, dy: i32, repeat: u32) -> Result<()> {
        self.client.shoot_ship_relative(ship_id, dx, dy, repeat).await
    }
}

/// Cloneable switch that ends a running [`GameSession::play`] loop.
#[derive(Clone, Debug)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One bot playing one game.
pub struct GameSession<B> {
    client: HttpGameClient,
    board: Board,
    targets: TargetStore,
    bases: HashMap<String, Position>,
    turn_length: Option<Duration>,
    running: Arc<AtomicBool>,
    game_start_fired: bool,
    bot: B,
}

impl<B: Bot> GameSession<B> {
    /// Checks the token against the server, then runs the bot's `on_create`.
    pub async fn new(client: HttpGameClient, targets: TargetStore, mut bot: B) -> Result<Self> {
        client.status().await?;
        bot.on_create(&client).await?;
        Ok(Self {
            client,
            board: Board::default(),
            targets,
            bases: HashMap::new(),
            turn_length: None,
            running: Arc::new(AtomicBool::new(true)),
            game_start_fired: false,
            bot,
        })
    }

    pub fn client(&self) -> &HttpGameClient {
        &self.client
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn targets(&self) -> &TargetStore {
        &self.targets
    }

    pub fn bot(&self) -> &B {
        &self.bot
    }

    pub fn turn_length(&self) -> Option<Duration> {
        self.turn_length
    }

    pub fn flush_targets(&self) -> Result<()> {
        self.targets.flush()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.running))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn player_count(&self) -> Result<usize> {
        self.client.player_count().await
    }

    pub async fn is_game_started(&self) -> Result<bool> {
        self.client.is_game_started().await
    }

    pub async fn start_game(&self) -> Result<()> {
        self.client.start_game().await
    }

    /// Id of the player whose turn it is.
    pub async fn current_turn(&self) -> Result<String> {
        Ok(self.client.turn().await?.turn)
    }

    pub async fn wait_for_game_start(&self, poll_every: Duration) -> Result<()> {
        loop {
            let started = Instant::now();
            if self.client.is_game_started().await? {
                return Ok(());
            }
            tokio::time::sleep(poll_delay(poll_every, started.elapsed())).await;
        }
    }

    pub async fn wait_for_player_count(&self, count: usize, poll_every: Duration) -> Result<()> {
        loop {
            let started = Instant::now();
            let joined = self.client.player_count().await?;
            if joined >= count {
                return Ok(());
            }
            debug!(joined, wanted = count, "waiting for players");
            tokio::time::sleep(poll_delay(poll_every, started.elapsed())).await;
        }
    }

    /// Main loop. Must be called after the game has started.
    ///
    /// Polls for our turn; on each one refreshes the board, runs the
    /// autopilot, fires the bot hooks and ends the turn. Failures inside a
    /// turn are logged and the turn is still ended; the game ending or
    /// [`Self::stop`] breaks the loop.
    pub async fn play(&mut self, poll_every: Duration) -> Result<()> {
        let islands = self.client.islands().await?;
        self.board.refresh_islands(islands);
        let status = self.client.status().await?;
        self.apply_layout(&status)?;

        let mut turn = 0;
        while self.is_running() {
            let started = Instant::now();
            match self.client.turn().await {
                Ok(status) if status.is_me => {
                    turn += 1;
                    match self.play_turn(turn).await {
                        Ok(()) => {}
                        Err(GameError::GameEnded) => break,
                        Err(error) => warn!(turn, %error, "turn failed"),
                    }
                    match self.client.end_turn().await {
                        Ok(()) => {}
                        Err(GameError::GameEnded) => break,
                        Err(error) => return Err(error),
                    }
                }
                Ok(_) => {}
                Err(GameError::GameEnded) => break,
                Err(error) => return Err(error),
            }
            tokio::time::sleep(poll_delay(poll_every, started.elapsed())).await;
        }

        info!(turns = turn, "game loop finished");
        if let Err(error) = self.targets.flush() {
            warn!(%error, "could not persist ship targets");
        }
        Ok(())
    }

    fn apply_layout(&mut self, status: &GameStatus) -> Result<()> {
        self.bases = bases_from_status(status)?;
        let (width, height) = status
            .board_size
            .ok_or_else(|| GameError::Protocol("game status has no board_size".to_string()))?;
        self.board.width = width;
        self.board.height = height;
        self.turn_length = status
            .turn_length
            .as_deref()
            .map(parse_turn_length)
            .transpose()?;
        info!(width, height, players = self.bases.len(), "game layout loaded");
        Ok(())
    }

    async fn play_turn(&mut self, turn: u32) -> Result<()> {
        refresh_board(&self.client, &mut self.board, &self.bases).await?;
        self.board.reconcile(&mut self.targets);

        let mut transport = &self.client;
        let report = run_autopilot_cycle(&mut self.board, &mut self.targets, &mut transport).await?;
        log_report(turn, &report);

        let mut ctx = TurnContext {
            client: &self.client,
            board: &mut self.board,
            targets: &mut self.targets,
            turn,
            turn_length: self.turn_length,
            bases: &self.bases,
            running: &self.running,
        };
        for ship_id in &report.arrived {
            self.bot.on_ship_arrive(&mut ctx, ship_id).await?;
        }
        if !self.game_start_fired {
            self.bot.on_game_start(&mut ctx).await?;
            self.game_start_fired = true;
        }
        self.bot.on_turn_start(&mut ctx).await
    }
}

fn log_report(turn: u32, report: &AutopilotReport) {
    info!(
        turn,
        moved = report.moved.len(),
        arrived = report.arrived.len(),
        stalled = report.stalled.len(),
        "autopilot cycle"
    );
}

async fn refresh_board(
    client: &HttpGameClient,
    board: &mut Board,
    bases: &HashMap<String, Position>,
) -> Result<()> {
    let players = client.ships().await?;
    board.refresh_players(players, bases)
}

/// Base of every player, keyed by player id. A status without `me` means the
/// game has not started.
pub fn bases_from_status(status: &GameStatus) -> Result<HashMap<String, Position>> {
    let me = status.me.as_ref().ok_or(GameError::GameNotStarted)?;
    let mut bases = HashMap::with_capacity(status.opponents.len() + 1);
    bases.insert(me.id.clone(), me.base);
    for opponent in &status.opponents {
        bases.insert(opponent.id.clone(), opponent.base);
    }
    Ok(bases)
}

/// Parses the server's `HH:MM:SS` turn length.
pub fn parse_turn_length(raw: &str) -> Result<Duration> {
    let time = NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .map_err(|error| GameError::Protocol(format!("bad turn_length '{raw}': {error}")))?;
    Ok(Duration::from_secs(u64::from(time.num_seconds_from_midnight())))
}

pub fn poll_delay(poll_every: Duration, elapsed: Duration) -> Duration {
    let every = u64::try_from(poll_every.as_millis()).unwrap_or(u64::MAX);
    let elapsed = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(poll_delay_ms(every, elapsed))
}
