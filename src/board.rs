use std::collections::HashMap;

use crate::error::{GameError, Result};
use crate::target_store::TargetStore;
use crate::types::{manhattan, IslandPayload, PlayerPayload, Position, ShipPayload};

/// Anything that sits on a cell of the board.
pub trait Located {
    fn position(&self) -> Position;

    fn distance(&self, x: i32, y: i32) -> i32 {
        let pos = self.position();
        manhattan(pos.x, pos.y, x, y)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ship {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub x: i32,
    pub y: i32,
    pub hp: i64,
    pub max_hp: i64,
    pub units_left: i32,
    pub units_per_turn: i32,
    pub shots_left: i32,
    pub shots_per_turn: i32,
    pub shot_range: i32,
    pub shot_damage: i64,
    pub price: i64,
    pub custom: bool,
}

impl Ship {
    pub fn from_payload(owner_id: &str, payload: ShipPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name,
            owner_id: owner_id.to_string(),
            x: payload.position.0,
            y: payload.position.1,
            hp: payload.hp,
            max_hp: payload.max_hp,
            units_left: payload.units_left,
            units_per_turn: payload.units_per_turn,
            shots_left: payload.shots_left,
            shots_per_turn: payload.shots_per_turn,
            shot_range: payload.shot_range,
            shot_damage: payload.shot_damage,
            price: payload.price,
            custom: payload.custom,
        }
    }

    pub fn is_at(&self, x: i32, y: i32) -> bool {
        self.x == x && self.y == y
    }
}

impl Located for Ship {
    fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub hp: i64,
    pub money: Option<i64>,
    pub base: Position,
    pub is_me: bool,
    pub ships: Vec<Ship>,
}

impl Located for Player {
    fn position(&self) -> Position {
        self.base
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Island {
    pub id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub money_per_turn: i64,
}

impl From<IslandPayload> for Island {
    fn from(payload: IslandPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name,
            x: payload.x,
            y: payload.y,
            money_per_turn: payload.money_per_turn,
        }
    }
}

impl Located for Island {
    fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Snapshot of one turn: every player with their ships, plus the islands.
/// Rebuilt wholesale on refresh; local targets live in [`TargetStore`].
#[derive(Clone, Debug, Default)]
pub struct Board {
    pub width: i32,
    pub height: i32,
    players: Vec<Player>,
    islands: Vec<Island>,
    ship_index: HashMap<String, (usize, usize)>,
}

impl Board {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_players(mut self, players: Vec<Player>) -> Self {
        self.set_players(players);
        self
    }

    pub fn with_islands(mut self, islands: Vec<Island>) -> Self {
        self.islands = islands;
        self
    }

    /// Replaces every player from a `GET /ship` payload. Bases are not part of
    /// that payload, so they are joined in from the game status.
    pub fn refresh_players(
        &mut self,
        payload: Vec<PlayerPayload>,
        bases: &HashMap<String, Position>,
    ) -> Result<()> {
        let mut players = Vec::with_capacity(payload.len());
        for raw in payload {
            let base = bases.get(&raw.id).copied().ok_or_else(|| {
                GameError::Protocol(format!("no base location for player {}", raw.id))
            })?;
            let ships = raw
                .ships
                .into_iter()
                .map(|ship| Ship::from_payload(&raw.id, ship))
                .collect();
            players.push(Player {
                id: raw.id,
                name: raw.name,
                hp: raw.hp,
                money: raw.money,
                base,
                is_me: raw.me,
                ships,
            });
        }
        self.set_players(players);
        Ok(())
    }

    pub fn refresh_islands(&mut self, payload: Vec<IslandPayload>) {
        self.islands = payload.into_iter().map(Island::from).collect();
    }

    fn set_players(&mut self, players: Vec<Player>) {
        self.ship_index.clear();
        for (player_idx, player) in players.iter().enumerate() {
            for (ship_idx, ship) in player.ships.iter().enumerate() {
                self.ship_index
                    .entry(ship.id.clone())
                    .or_insert((player_idx, ship_idx));
            }
        }
        self.players = players;
    }

    /// Makes sure every owned ship has a target record. Fresh server state
    /// never touches the records themselves.
    pub fn reconcile(&self, targets: &mut TargetStore) {
        for ship in self.my_ships() {
            targets.get_or_create(&ship.id);
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    pub fn me(&self) -> Option<&Player> {
        self.players.iter().find(|player| player.is_me)
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn other_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|player| !player.is_me)
    }

    pub fn my_ships(&self) -> impl Iterator<Item = &Ship> {
        self.players
            .iter()
            .filter(|player| player.is_me)
            .flat_map(|player| player.ships.iter())
    }

    pub fn my_ship_ids(&self) -> Vec<String> {
        self.my_ships().map(|ship| ship.id.clone()).collect()
    }

    /// All ships, players first then ships, in server order.
    pub fn ships(&self) -> impl Iterator<Item = &Ship> {
        self.players.iter().flat_map(|player| player.ships.iter())
    }

    pub fn ship(&self, id: &str) -> Option<&Ship> {
        let (player_idx, ship_idx) = *self.ship_index.get(id)?;
        self.players.get(player_idx)?.ships.get(ship_idx)
    }

    pub fn ship_mut(&mut self, id: &str) -> Option<&mut Ship> {
        let (player_idx, ship_idx) = *self.ship_index.get(id)?;
        self.players.get_mut(player_idx)?.ships.get_mut(ship_idx)
    }

    pub fn is_mine(&self, ship_id: &str) -> bool {
        self.ship(ship_id)
            .and_then(|ship| self.player(&ship.owner_id))
            .map(|player| player.is_me)
            .unwrap_or(false)
    }

    /// Records where the server says a ship ended up. The distance travelled
    /// comes off its movement budget for the rest of the turn.
    pub fn place_ship(&mut self, ship_id: &str, position: Position) -> Option<&Ship> {
        let ship = self.ship_mut(ship_id)?;
        let travelled = manhattan(ship.x, ship.y, position.x, position.y);
        ship.x = position.x;
        ship.y = position.y;
        ship.units_left = (ship.units_left - travelled).max(0);
        Some(&*ship)
    }

    /// Inclusive on the far edge, matching how the server reports its size.
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        (0..=self.width).contains(&x) && (0..=self.height).contains(&y)
    }

    pub fn base_positions(&self) -> Vec<Position> {
        self.players.iter().map(|player| player.base).collect()
    }

    pub fn is_base(&self, x: i32, y: i32) -> bool {
        self.players
            .iter()
            .any(|player| player.base.x == x && player.base.y == y)
    }
}

/// Items sorted by ascending distance from `(x, y)`, paired with that distance.
/// Ties keep their original order.
pub fn by_distance<T: Located>(items: &[T], x: i32, y: i32) -> Vec<(&T, i32)> {
    let mut ranked: Vec<(&T, i32)> = items.iter().map(|item| (item, item.distance(x, y))).collect();
    ranked.sort_by_key(|(_, distance)| *distance);
    ranked
}

pub fn in_radius<T: Located>(items: &[T], x: i32, y: i32, r: i32) -> Vec<(&T, i32)> {
    by_distance(items, x, y)
        .into_iter()
        .filter(|(_, distance)| *distance <= r)
        .collect()
}

pub fn nearest<T: Located>(items: &[T], x: i32, y: i32) -> Option<(&T, i32)> {
    by_distance(items, x, y).into_iter().next()
}

pub fn n_nearest<T: Located>(items: &[T], x: i32, y: i32, n: usize) -> Vec<(&T, i32)> {
    let mut ranked = by_distance(items, x, y);
    ranked.truncate(n);
    ranked
}
