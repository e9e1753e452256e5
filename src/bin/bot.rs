use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use battleshapi_client::board::Located;
use battleshapi_client::config::{normalize_poll_ms, ClientConfig};
use battleshapi_client::registration::{GameSettings, Registration};
use battleshapi_client::store;
use battleshapi_client::types::StoreItem;
use battleshapi_client::{Bot, GameSession, HttpGameClient, Position, TargetStore, TurnContext};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Token of a game this account already joined.
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    client_id: Option<String>,
    #[arg(long)]
    client_secret: Option<String>,
    /// Join this game instead of creating one.
    #[arg(long)]
    game_id: Option<String>,
    /// After creating a game, wait for this many players and start it.
    #[arg(long, default_value_t = 2)]
    players: usize,
    #[arg(long)]
    url_base: Option<String>,
    #[arg(long)]
    local_data: Option<PathBuf>,
    #[arg(long)]
    poll_ms: Option<u64>,
}

/// Sends idle ships to the nearest island nobody holds or is heading for,
/// and buys the cheapest hull whenever it can afford one.
#[derive(Default)]
struct IslandHopper {
    inventory: Vec<StoreItem>,
}

impl Bot for IslandHopper {
    async fn on_create(&mut self, client: &HttpGameClient) -> battleshapi_client::Result<()> {
        self.inventory = client.store().await?;
        info!(items = self.inventory.len(), "store loaded");
        Ok(())
    }

    async fn on_turn_start(&mut self, ctx: &mut TurnContext<'_>) -> battleshapi_client::Result<()> {
        let money = ctx.board.me().and_then(|me| me.money).unwrap_or(0);
        if let Some(hull) = store::cheapest(&self.inventory).filter(|hull| hull.price <= money) {
            let hull_id = hull.id.clone();
            let ship_id = ctx.buy_ship(&hull_id, true).await?;
            info!(%ship_id, hull = %hull_id, "bought ship");
        }

        for (ship_id, island) in assign_islands(ctx) {
            info!(%ship_id, x = island.x, y = island.y, "heading for island");
            ctx.set_target(&ship_id, island.x, island.y);
        }
        ctx.flush_targets()
    }

    async fn on_ship_arrive(&mut self, ctx: &mut TurnContext<'_>, ship_id: &str) -> battleshapi_client::Result<()> {
        ctx.targets.set_attribute(ship_id, "arrived_on_turn", &ctx.turn)?;
        info!(%ship_id, turn = ctx.turn, "ship arrived");
        Ok(())
    }
}

fn assign_islands(ctx: &TurnContext<'_>) -> Vec<(String, Position)> {
    let index = ctx.spatial();
    let open = index.free_untargeted_islands();
    let mut claimed = HashSet::new();
    let mut plan = Vec::new();
    for ship in ctx.board.my_ships() {
        let idle = ctx
            .targets
            .get(&ship.id)
            .map(|target| !target.has_target())
            .unwrap_or(true);
        let holding = ctx
            .board
            .islands()
            .iter()
            .any(|island| ship.is_at(island.x, island.y));
        if !idle || holding {
            continue;
        }
        let choice = open
            .iter()
            .filter(|island| !claimed.contains(&island.id))
            .min_by_key(|island| ship.distance(island.x, island.y));
        if let Some(island) = choice {
            claimed.insert(island.id.clone());
            plan.push((ship.id.clone(), Position::new(island.x, island.y)));
        }
    }
    plan
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(url_base) = cli.url_base.clone() {
        config.url_base = url_base;
    }
    if let Some(path) = cli.local_data.clone() {
        config.local_data_path = path;
    }
    if let Some(poll_ms) = cli.poll_ms {
        config.poll_interval_ms = normalize_poll_ms(Some(poll_ms));
    }

    let (client, created) = connect(&cli, &config).await?;
    let targets = TargetStore::at_path(&config.local_data_path);
    info!(path = %config.local_data_path.display(), records = targets.len(), "ship targets loaded");

    let mut session = GameSession::new(client, targets, IslandHopper::default())
        .await
        .context("token rejected by the game server")?;
    let poll_every = config.poll_interval();

    if created {
        info!(players = cli.players, "waiting for players");
        session.wait_for_player_count(cli.players, poll_every).await?;
        session.start_game().await?;
    }
    session.wait_for_game_start(poll_every).await?;

    let stop = session.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    session.play(poll_every).await?;
    Ok(())
}

async fn connect(cli: &Cli, config: &ClientConfig) -> Result<(HttpGameClient, bool)> {
    if let Some(token) = &cli.token {
        return Ok((HttpGameClient::new(config.url_base.clone(), token.clone()), false));
    }
    let (Some(client_id), Some(client_secret)) = (&cli.client_id, &cli.client_secret) else {
        return Err(anyhow!("pass --token, or --client-id and --client-secret"));
    };
    let registration = Registration::new(config.url_base.clone(), client_id.clone(), client_secret.clone());
    match &cli.game_id {
        Some(game_id) => {
            let credentials = registration
                .join_game(game_id)
                .await
                .with_context(|| format!("could not join game {game_id}"))?;
            Ok((registration.connect(&credentials), false))
        }
        None => {
            let credentials = registration
                .create_game(&GameSettings::default())
                .await
                .context("could not create a game")?;
            info!(game_id = %credentials.game_id, "share this game id with the other players");
            Ok((registration.connect(&credentials), true))
        }
    }
}
