use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::{Board, Island, Player, Ship};
use crate::constants::DEFAULT_INITIAL_HP;
use crate::error::{GameError, Result};
use crate::transport::GameTransport;
use crate::types::{manhattan, Position, StoreItem};

/// In-process stand-in for the game server.
///
/// Holds the authoritative world, applies moves with the same rejections the
/// server uses and hands out [`Board`] snapshots. Only the player flagged as
/// "me" may move ships, like a token-scoped client.
#[derive(Debug)]
pub struct Sandbox {
    width: i32,
    height: i32,
    players: Vec<Player>,
    islands: Vec<Island>,
    turn: u32,
    next_ship: u32,
    rng: StdRng,
}

impl Sandbox {
    pub fn new(width: i32, height: i32, seed: u64) -> Self {
        Self {
            width,
            height,
            players: Vec::new(),
            islands: Vec::new(),
            turn: 1,
            next_ship: 1,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_player(mut self, id: &str, is_me: bool, base: Position) -> Self {
        self.players.push(Player {
            id: id.to_string(),
            name: id.to_string(),
            hp: DEFAULT_INITIAL_HP,
            money: is_me.then_some(0),
            base,
            is_me,
            ships: Vec::new(),
        });
        self
    }

    pub fn with_island(mut self, id: &str, x: i32, y: i32, money_per_turn: i64) -> Self {
        self.islands.push(Island {
            id: id.to_string(),
            name: id.to_string(),
            x,
            y,
            money_per_turn,
        });
        self
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn snapshot(&self) -> Board {
        Board::new(self.width, self.height)
            .with_players(self.players.clone())
            .with_islands(self.islands.clone())
    }

    pub fn ship_position(&self, ship_id: &str) -> Option<Position> {
        self.find_ship(ship_id).map(|ship| Position::new(ship.x, ship.y))
    }

    /// Puts a ship exactly where asked. The cell must be in bounds and empty.
    pub fn insert_ship(&mut self, owner_id: &str, template: &StoreItem, at: Position) -> Result<String> {
        if !self.in_bounds(at.x, at.y) {
            return Err(GameError::TargetOutOfBounds(format!("({}, {})", at.x, at.y)));
        }
        if let Some(blocker) = self.ship_at(at.x, at.y) {
            return Err(GameError::CellOccupied(format!(
                "({}, {}) holds {}",
                at.x, at.y, blocker.id
            )));
        }
        self.spawn(owner_id, template, at)
    }

    /// Buys a ship onto the owner's base, failing like the server does when
    /// something already sits there.
    pub fn buy_ship(&mut self, owner_id: &str, template: &StoreItem) -> Result<String> {
        let base = self.player(owner_id)?.base;
        if let Some(blocker) = self.ship_at(base.x, base.y) {
            return Err(GameError::ShipInTheWay {
                ship_id: Some(blocker.id.clone()),
                message: "there is a ship on the base".to_string(),
            });
        }
        self.spawn(owner_id, template, base)
    }

    /// Drops `count` ships on random free cells, reproducibly for a given seed.
    pub fn scatter_ships(&mut self, owner_id: &str, template: &StoreItem, count: usize) -> Result<Vec<String>> {
        let attempts = ((self.width + 1) * (self.height + 1)).max(1) as usize * 4;
        let mut placed = Vec::with_capacity(count);
        for _ in 0..count {
            let mut spot = None;
            for _ in 0..attempts {
                let x = self.rng.random_range(0..=self.width);
                let y = self.rng.random_range(0..=self.height);
                if self.ship_at(x, y).is_none() && !self.is_base(x, y) {
                    spot = Some(Position::new(x, y));
                    break;
                }
            }
            let at = spot.ok_or(GameError::NoFreeCell {
                x: self.width / 2,
                y: self.height / 2,
                radius: self.width.max(self.height),
            })?;
            placed.push(self.spawn(owner_id, template, at)?);
        }
        Ok(placed)
    }

    /// Advances the turn and refills every ship's movement and shots.
    pub fn end_turn(&mut self) {
        self.turn += 1;
        for ship in self.players.iter_mut().flat_map(|player| player.ships.iter_mut()) {
            ship.units_left = ship.units_per_turn;
            ship.shots_left = ship.shots_per_turn;
        }
    }

    fn spawn(&mut self, owner_id: &str, template: &StoreItem, at: Position) -> Result<String> {
        let id = format!("ship-{}", self.next_ship);
        let ship = Ship {
            id: id.clone(),
            name: template.name.clone(),
            owner_id: owner_id.to_string(),
            x: at.x,
            y: at.y,
            hp: template.max_hp,
            max_hp: template.max_hp,
            units_left: template.units_per_turn,
            units_per_turn: template.units_per_turn,
            shots_left: template.shots_per_turn,
            shots_per_turn: template.shots_per_turn,
            shot_range: template.shot_range,
            shot_damage: template.shot_damage,
            price: template.price,
            custom: template.custom,
        };
        let owner = self
            .players
            .iter_mut()
            .find(|player| player.id == owner_id)
            .ok_or_else(|| GameError::Protocol(format!("unknown player {owner_id}")))?;
        owner.ships.push(ship);
        self.next_ship += 1;
        Ok(id)
    }

    fn player(&self, id: &str) -> Result<&Player> {
        self.players
            .iter()
            .find(|player| player.id == id)
            .ok_or_else(|| GameError::Protocol(format!("unknown player {id}")))
    }

    fn ships(&self) -> impl Iterator<Item = &Ship> {
        self.players.iter().flat_map(|player| player.ships.iter())
    }

    fn find_ship(&self, ship_id: &str) -> Option<&Ship> {
        self.ships().find(|ship| ship.id == ship_id)
    }

    fn ship_at(&self, x: i32, y: i32) -> Option<&Ship> {
        self.ships().find(|ship| ship.is_at(x, y))
    }

    fn is_base(&self, x: i32, y: i32) -> bool {
        self.players
            .iter()
            .any(|player| player.base.x == x && player.base.y == y)
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        (0..=self.width).contains(&x) && (0..=self.height).contains(&y)
    }
}

impl GameTransport for Sandbox {
    async fn move_ship_relative(&mut self, ship_id: &str, dx: i32, dy: i32) -> Result<Position> {
        let ship = self
            .find_ship(ship_id)
            .ok_or_else(|| GameError::UnknownShip(ship_id.to_string()))?;
        let mine = self
            .players
            .iter()
            .any(|player| player.is_me && player.id == ship.owner_id);
        if !mine {
            return Err(GameError::CanNotAccessShip(ship_id.to_string()));
        }

        let (x, y) = (ship.x + dx, ship.y + dy);
        if !self.in_bounds(x, y) {
            return Err(GameError::TargetOutOfBounds(format!("({x}, {y})")));
        }
        let distance = manhattan(ship.x, ship.y, x, y);
        if distance > ship.units_left {
            return Err(GameError::TargetOutOfRange(format!(
                "{ship_id} has {} units left, needs {distance}",
                ship.units_left
            )));
        }
        if let Some(blocker) = self.ships().find(|other| other.id != ship_id && other.is_at(x, y)) {
            return Err(GameError::CellOccupied(format!(
                "({x}, {y}) holds {}",
                blocker.id
            )));
        }

        let ship = self
            .players
            .iter_mut()
            .flat_map(|player| player.ships.iter_mut())
            .find(|ship| ship.id == ship_id)
            .ok_or_else(|| GameError::UnknownShip(ship_id.to_string()))?;
        ship.x = x;
        ship.y = y;
        ship.units_left -= distance;
        Ok(Position::new(x, y))
    }
}

/// Stats for a plain test ship.
pub fn basic_hull(units_per_turn: i32) -> StoreItem {
    StoreItem {
        id: "basic".to_string(),
        name: "Basic".to_string(),
        custom: false,
        max_hp: 100,
        price: 100,
        shot_damage: 10,
        shot_range: 3,
        shots_per_turn: 1,
        units_per_turn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> Sandbox {
        Sandbox::new(10, 10, 7)
            .with_player("me", true, Position::new(0, 0))
            .with_player("them", false, Position::new(10, 10))
    }

    #[tokio::test]
    async fn moves_spend_units_until_end_of_turn() {
        let mut world = sandbox();
        let id = world
            .insert_ship("me", &basic_hull(3), Position::new(2, 2))
            .expect("cell is free");

        let pos = world.move_ship_relative(&id, 2, 1).await.expect("in budget");
        assert_eq!(pos, Position::new(4, 3));
        assert!(matches!(
            world.move_ship_relative(&id, 1, 0).await,
            Err(GameError::TargetOutOfRange(_))
        ));

        world.end_turn();
        assert_eq!(world.turn(), 2);
        assert_eq!(world.move_ship_relative(&id, 0, 3).await.expect("refilled"), Position::new(4, 6));
    }

    #[tokio::test]
    async fn rejects_occupied_foreign_and_out_of_bounds_moves() {
        let mut world = sandbox();
        let mine = world
            .insert_ship("me", &basic_hull(5), Position::new(1, 1))
            .expect("cell is free");
        let theirs = world
            .insert_ship("them", &basic_hull(5), Position::new(2, 1))
            .expect("cell is free");

        assert!(world.move_ship_relative(&mine, 1, 0).await.expect_err("taken").is_cell_occupied());
        assert!(matches!(
            world.move_ship_relative(&theirs, 0, 1).await,
            Err(GameError::CanNotAccessShip(_))
        ));
        assert!(matches!(
            world.move_ship_relative(&mine, -2, 0).await,
            Err(GameError::TargetOutOfBounds(_))
        ));
        assert!(matches!(
            world.move_ship_relative("nope", 0, 1).await,
            Err(GameError::UnknownShip(_))
        ));
        assert_eq!(world.ship_position(&mine), Some(Position::new(1, 1)));
    }

    #[test]
    fn buying_onto_a_blocked_base_names_the_blocker() {
        let mut world = sandbox();
        let first = world.buy_ship("me", &basic_hull(2)).expect("base is empty");
        match world.buy_ship("me", &basic_hull(2)) {
            Err(GameError::ShipInTheWay { ship_id, .. }) => assert_eq!(ship_id, Some(first)),
            other => panic!("expected ShipInTheWay, got {other:?}"),
        }
    }

    #[test]
    fn scatter_is_reproducible_and_avoids_bases() {
        let place = |seed| {
            let mut world = Sandbox::new(10, 10, seed)
                .with_player("me", true, Position::new(0, 0))
                .with_player("them", false, Position::new(10, 10));
            let ids = world.scatter_ships("me", &basic_hull(3), 8).expect("room to place");
            ids.iter()
                .map(|id| world.ship_position(id).expect("placed"))
                .collect::<Vec<_>>()
        };
        let first = place(42);
        assert_eq!(first, place(42));
        assert_eq!(first.len(), 8);
        for pos in &first {
            assert_ne!(*pos, Position::new(0, 0));
            assert_ne!(*pos, Position::new(10, 10));
        }
        let mut unique = first.clone();
        unique.sort_by_key(|pos| (pos.x, pos.y));
        unique.dedup();
        assert_eq!(unique.len(), first.len());
    }

    #[test]
    fn snapshot_reflects_world() {
        let mut world = sandbox().with_island("i1", 5, 5, 10);
        world
            .insert_ship("me", &basic_hull(2), Position::new(3, 3))
            .expect("cell is free");
        let board = world.snapshot();
        assert_eq!(board.my_ship_ids(), vec!["ship-1"]);
        assert_eq!(board.islands().len(), 1);
        assert!(board.is_base(10, 10));
    }
}
