use std::collections::{HashMap, HashSet};

use crate::board::{Board, Island, Ship};
use crate::error::{GameError, Result};
use crate::target_store::TargetStore;
use crate::types::Position;

/// Read-only queries over one board snapshot joined with the local targets.
///
/// Cell lookups go through a map built in player-then-ship order where the
/// first ship inserted for a cell wins, so ties resolve the same way a linear
/// scan would.
pub struct SpatialIndex<'a> {
    board: &'a Board,
    targets: &'a TargetStore,
    by_cell: HashMap<(i32, i32), &'a Ship>,
    bases: HashSet<(i32, i32)>,
}

impl<'a> SpatialIndex<'a> {
    pub fn new(board: &'a Board, targets: &'a TargetStore) -> Self {
        let mut by_cell = HashMap::new();
        for ship in board.ships() {
            by_cell.entry((ship.x, ship.y)).or_insert(ship);
        }
        let bases = board
            .base_positions()
            .into_iter()
            .map(|base| (base.x, base.y))
            .collect();
        Self {
            board,
            targets,
            by_cell,
            bases,
        }
    }

    pub fn occupied(&self, x: i32, y: i32) -> Option<&'a Ship> {
        self.by_cell.get(&(x, y)).copied()
    }

    /// Like [`Self::occupied`], but also matches ships that are heading for
    /// the cell: either the full target is `(x, y)`, or the ship already sits
    /// on column `x` and is only correcting y toward `y`.
    pub fn occupied_or_targeted(&self, x: i32, y: i32) -> Option<&'a Ship> {
        let targets = self.targets;
        self.board.ships().find(|ship| {
            if ship.is_at(x, y) {
                return true;
            }
            let Some(target) = targets.get(&ship.id) else {
                return false;
            };
            (target.target_x == Some(x) && target.target_y == Some(y))
                || (target.target_y == Some(y) && target.target_x.is_none() && ship.x == x)
        })
    }

    fn is_free(&self, x: i32, y: i32) -> bool {
        !self.bases.contains(&(x, y)) && !self.by_cell.contains_key(&(x, y))
    }

    /// Scan is clamped to the board, so any center or radius is safe.
    fn free_cells(&self, cx: i32, cy: i32, r: i32) -> impl Iterator<Item = Position> + '_ {
        let xs = cx.saturating_sub(r).max(0)..=cx.saturating_add(r).min(self.board.width);
        let ys = cy.saturating_sub(r).max(0)..=cy.saturating_add(r).min(self.board.height);
        xs.flat_map(move |x| ys.clone().map(move |y| (x, y)))
            .filter(move |&(x, y)| within_radius(x, y, cx, cy, r) && self.is_free(x, y))
            .map(Position::from)
    }

    /// First free cell within Manhattan distance `r` of the center, scanning
    /// x outer and y inner. Bases and ship cells never count as free.
    pub fn free_position_in_radius(&self, cx: i32, cy: i32, r: i32) -> Result<Position> {
        self.free_cells(cx, cy, r)
            .next()
            .ok_or(GameError::NoFreeCell {
                x: cx,
                y: cy,
                radius: r,
            })
    }

    /// Every free cell in scan order; not sorted by distance.
    pub fn all_free_positions_in_radius(&self, cx: i32, cy: i32, r: i32) -> Vec<Position> {
        self.free_cells(cx, cy, r).collect()
    }

    pub fn n_free_positions_in_radius(&self, cx: i32, cy: i32, r: i32, n: usize) -> Vec<Position> {
        self.free_cells(cx, cy, r).take(n).collect()
    }

    pub fn free_islands(&self) -> Vec<&'a Island> {
        self.board
            .islands()
            .iter()
            .filter(|island| self.occupied(island.x, island.y).is_none())
            .collect()
    }

    pub fn free_untargeted_islands(&self) -> Vec<&'a Island> {
        self.board
            .islands()
            .iter()
            .filter(|island| self.occupied_or_targeted(island.x, island.y).is_none())
            .collect()
    }

    /// Islands with one of my ships on them.
    pub fn captured_islands(&self) -> Vec<&'a Island> {
        self.board
            .islands()
            .iter()
            .filter(|island| {
                self.board
                    .my_ships()
                    .any(|ship| ship.is_at(island.x, island.y))
            })
            .collect()
    }
}

fn within_radius(x: i32, y: i32, cx: i32, cy: i32, r: i32) -> bool {
    let dx = (i64::from(x) - i64::from(cx)).abs();
    let dy = (i64::from(y) - i64::from(cy)).abs();
    dx + dy <= i64::from(r)
}

/// Stable ascending sort by Manhattan distance from `(x, y)`.
pub fn order_positions_by_distance(mut positions: Vec<Position>, x: i32, y: i32) -> Vec<Position> {
    positions.sort_by_key(|pos| pos.distance(x, y));
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::test_support::{island, player, ship};

    fn make_board() -> Board {
        Board::new(6, 6)
            .with_players(vec![
                player(
                    "me",
                    true,
                    (0, 0),
                    vec![ship("a", "me", 1, 0, 3), ship("b", "me", 3, 3, 3)],
                ),
                player("them", false, (6, 6), vec![ship("z", "them", 0, 1, 3)]),
            ])
            .with_islands(vec![island("i1", 3, 3), island("i2", 5, 1), island("i3", 2, 5)])
    }

    #[test]
    fn occupied_finds_current_cell_only() {
        let board = make_board();
        let targets = TargetStore::in_memory();
        let index = SpatialIndex::new(&board, &targets);
        assert_eq!(index.occupied(1, 0).map(|s| s.id.as_str()), Some("a"));
        assert_eq!(index.occupied(0, 1).map(|s| s.id.as_str()), Some("z"));
        assert!(index.occupied(2, 2).is_none());
    }

    #[test]
    fn occupied_prefers_first_ship_in_scan_order() {
        let board = Board::new(6, 6).with_players(vec![
            player("p1", true, (0, 0), vec![ship("first", "p1", 2, 2, 1)]),
            player("p2", false, (6, 6), vec![ship("second", "p2", 2, 2, 1)]),
        ]);
        let targets = TargetStore::in_memory();
        let index = SpatialIndex::new(&board, &targets);
        assert_eq!(index.occupied(2, 2).map(|s| s.id.as_str()), Some("first"));
    }

    #[test]
    fn occupied_or_targeted_matches_current_full_target_and_glide() {
        let board = make_board();
        let mut targets = TargetStore::in_memory();
        board.reconcile(&mut targets);
        targets.set_target("a", 4, 4);
        {
            let b = targets.get_or_create("b");
            b.target_x = None;
            b.target_y = Some(6);
        }
        let index = SpatialIndex::new(&board, &targets);

        assert_eq!(index.occupied_or_targeted(1, 0).map(|s| s.id.as_str()), Some("a"));
        assert_eq!(index.occupied_or_targeted(4, 4).map(|s| s.id.as_str()), Some("a"));
        assert_eq!(index.occupied_or_targeted(3, 6).map(|s| s.id.as_str()), Some("b"));
        assert!(index.occupied_or_targeted(4, 6).is_none());
    }

    #[test]
    fn occupied_or_targeted_ignores_target_on_other_column() {
        let board = make_board();
        let mut targets = TargetStore::in_memory();
        board.reconcile(&mut targets);
        targets.set_target("b", 5, 6);
        let index = SpatialIndex::new(&board, &targets);
        assert!(index.occupied_or_targeted(3, 6).is_none());
        assert_eq!(index.occupied_or_targeted(5, 6).map(|s| s.id.as_str()), Some("b"));
    }

    #[test]
    fn free_position_skips_bases_and_ships_in_scan_order() {
        let board = make_board();
        let targets = TargetStore::in_memory();
        let index = SpatialIndex::new(&board, &targets);
        // (0,0) is a base, (0,1) and (1,0) hold ships.
        assert!(matches!(
            index.free_position_in_radius(0, 0, 1),
            Err(GameError::NoFreeCell { x: 0, y: 0, radius: 1 })
        ));
        let pos = index.free_position_in_radius(0, 0, 2).expect("a cell is free");
        assert_eq!(pos, Position::new(0, 2));
    }

    #[test]
    fn free_position_postconditions_hold() {
        let board = make_board();
        let targets = TargetStore::in_memory();
        let index = SpatialIndex::new(&board, &targets);
        for cx in -2..=8 {
            for cy in -2..=8 {
                for r in 0..=4 {
                    let Ok(pos) = index.free_position_in_radius(cx, cy, r) else {
                        continue;
                    };
                    assert!(board.in_bounds(pos.x, pos.y));
                    assert!(pos.distance(cx, cy) <= r);
                    assert!(!board.is_base(pos.x, pos.y));
                    assert!(board.ships().all(|ship| !ship.is_at(pos.x, pos.y)));
                }
            }
        }
    }

    #[test]
    fn huge_radius_and_far_centers_stay_on_the_board() {
        let board = make_board();
        let targets = TargetStore::in_memory();
        let index = SpatialIndex::new(&board, &targets);
        assert_eq!(
            index.free_position_in_radius(0, 0, i32::MAX).expect("a cell is free"),
            Position::new(0, 2)
        );
        // 7x7 cells minus two bases and three ships.
        assert_eq!(index.all_free_positions_in_radius(3, 3, i32::MAX).len(), 44);
        assert!(matches!(
            index.free_position_in_radius(i32::MAX, i32::MIN, 5),
            Err(GameError::NoFreeCell { .. })
        ));
        assert!(index.all_free_positions_in_radius(i32::MIN, 0, i32::MAX).is_empty());
    }

    #[test]
    fn all_and_n_free_positions_follow_scan_order() {
        let board = make_board();
        let targets = TargetStore::in_memory();
        let index = SpatialIndex::new(&board, &targets);
        let all = index.all_free_positions_in_radius(0, 0, 2);
        assert_eq!(
            all,
            vec![Position::new(0, 2), Position::new(1, 1), Position::new(2, 0)]
        );
        assert_eq!(index.n_free_positions_in_radius(0, 0, 2, 2), all[..2].to_vec());
        assert!(index.all_free_positions_in_radius(0, 0, 1).is_empty());
    }

    #[test]
    fn ordering_by_distance_is_stable() {
        let ordered = order_positions_by_distance(
            vec![
                Position::new(3, 0),
                Position::new(0, 1),
                Position::new(1, 0),
                Position::new(0, 3),
            ],
            0,
            0,
        );
        assert_eq!(
            ordered,
            vec![
                Position::new(0, 1),
                Position::new(1, 0),
                Position::new(3, 0),
                Position::new(0, 3),
            ]
        );
    }

    #[test]
    fn island_queries_respect_occupancy_and_targets() {
        let board = make_board();
        let mut targets = TargetStore::in_memory();
        board.reconcile(&mut targets);
        targets.set_target("a", 5, 1);
        let index = SpatialIndex::new(&board, &targets);

        let ids = |islands: Vec<&Island>| -> Vec<String> {
            islands.into_iter().map(|island| island.id.clone()).collect()
        };
        assert_eq!(ids(index.free_islands()), vec!["i2", "i3"]);
        assert_eq!(ids(index.free_untargeted_islands()), vec!["i3"]);
        assert_eq!(ids(index.captured_islands()), vec!["i1"]);
    }
}
