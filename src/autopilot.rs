use crate::board::Board;
use crate::error::{GameError, Result};
use crate::planner::next_move_for;
use crate::target_store::TargetStore;
use crate::transport::GameTransport;

/// What the cycle did this turn, by ship id in processing order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutopilotReport {
    pub moved: Vec<String>,
    pub arrived: Vec<String>,
    /// Ships that hit an occupied cell twice and stay put this turn.
    pub stalled: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Moved,
    Arrived,
    Idle,
}

/// Moves every owned ship with a pending target one step closer.
///
/// Ships whose destination is occupied are retried once after the pass, in
/// reverse order. A second occupied cell is dropped silently for the turn;
/// any other failure aborts the cycle. Targets are mutated in place but not
/// flushed.
///
/// A ship whose plan is `(0, 0)` (arrived, or no units left) sends no move
/// request at all.
pub async fn run_autopilot_cycle<T: GameTransport>(
    board: &mut Board,
    targets: &mut TargetStore,
    transport: &mut T,
) -> Result<AutopilotReport> {
    let mut report = AutopilotReport::default();
    let mut retry = Vec::new();

    for ship_id in board.my_ship_ids() {
        let pending = targets
            .get(&ship_id)
            .map(|target| target.has_target())
            .unwrap_or(false);
        if !pending {
            continue;
        }
        match attempt_move(board, targets, transport, &ship_id).await {
            Ok(step) => record(&mut report, step, ship_id),
            Err(error) if error.is_cell_occupied() => retry.push(ship_id),
            Err(error) => return Err(error),
        }
    }

    // Reversing flips which of two mutually blocking ships goes first.
    retry.reverse();
    for ship_id in retry {
        match attempt_move(board, targets, transport, &ship_id).await {
            Ok(step) => record(&mut report, step, ship_id),
            Err(error) if error.is_cell_occupied() => report.stalled.push(ship_id),
            Err(error) => return Err(error),
        }
    }

    Ok(report)
}

fn record(report: &mut AutopilotReport, step: Step, ship_id: String) {
    match step {
        Step::Moved => report.moved.push(ship_id),
        Step::Arrived => report.arrived.push(ship_id),
        Step::Idle => {}
    }
}

async fn attempt_move<T: GameTransport>(
    board: &mut Board,
    targets: &mut TargetStore,
    transport: &mut T,
    ship_id: &str,
) -> Result<Step> {
    let ship = board
        .ship(ship_id)
        .ok_or_else(|| GameError::UnknownShip(ship_id.to_string()))?;
    let target = targets.get_or_create(ship_id);
    let (dx, dy) = next_move_for(ship, target);
    if (dx, dy) == (0, 0) {
        // No command for an empty move: either arrived or out of budget.
        return Ok(if target.has_target() {
            Step::Idle
        } else {
            Step::Arrived
        });
    }

    let position = transport.move_ship_relative(ship_id, dx, dy).await?;
    board.place_ship(ship_id, position);
    Ok(Step::Moved)
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::board::test_support::{player, ship};
    use crate::board::Ship;
    use crate::types::Position;

    #[derive(Default)]
    struct ScriptedTransport {
        positions: HashMap<String, (i32, i32)>,
        denied: HashSet<String>,
        calls: Vec<(String, i32, i32)>,
    }

    impl ScriptedTransport {
        fn tracking(board: &Board) -> Self {
            Self {
                positions: board
                    .ships()
                    .map(|ship| (ship.id.clone(), (ship.x, ship.y)))
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl GameTransport for ScriptedTransport {
        async fn move_ship_relative(&mut self, ship_id: &str, dx: i32, dy: i32) -> Result<Position> {
            self.calls.push((ship_id.to_string(), dx, dy));
            if self.denied.contains(ship_id) {
                return Err(GameError::CanNotAccessShip(ship_id.to_string()));
            }
            let (x, y) = self.positions[ship_id];
            let destination = (x + dx, y + dy);
            if self.positions.values().any(|pos| *pos == destination) {
                return Err(GameError::CellOccupied(format!("{destination:?}")));
            }
            self.positions.insert(ship_id.to_string(), destination);
            Ok(destination.into())
        }
    }

    fn my_board(ships: Vec<Ship>) -> Board {
        Board::new(10, 10).with_players(vec![
            player("me", true, (10, 0), ships),
            player("them", false, (10, 10), vec![ship("z", "them", 9, 9, 1)]),
        ])
    }

    #[tokio::test]
    async fn ships_without_targets_are_skipped() {
        let mut board = my_board(vec![ship("a", "me", 0, 0, 3)]);
        let mut targets = TargetStore::in_memory();
        board.reconcile(&mut targets);
        let mut transport = ScriptedTransport::tracking(&board);

        let report = run_autopilot_cycle(&mut board, &mut targets, &mut transport)
            .await
            .expect("cycle runs");
        assert_eq!(report, AutopilotReport::default());
        assert!(transport.calls.is_empty());
    }

    #[tokio::test]
    async fn moves_toward_target_and_updates_snapshot() {
        let mut board = my_board(vec![ship("a", "me", 0, 0, 3)]);
        let mut targets = TargetStore::in_memory();
        targets.set_target("a", 5, 5);
        let mut transport = ScriptedTransport::tracking(&board);

        let report = run_autopilot_cycle(&mut board, &mut targets, &mut transport)
            .await
            .expect("cycle runs");
        assert_eq!(report.moved, vec!["a"]);
        assert_eq!(transport.calls, vec![("a".to_string(), 3, 0)]);
        let ship = board.ship("a").expect("ship exists");
        assert_eq!((ship.x, ship.y, ship.units_left), (3, 0, 0));
    }

    #[tokio::test]
    async fn arrival_is_reported_without_a_move_command() {
        let mut board = my_board(vec![ship("a", "me", 4, 4, 3)]);
        let mut targets = TargetStore::in_memory();
        targets.set_target("a", 4, 4);
        let mut transport = ScriptedTransport::tracking(&board);

        let report = run_autopilot_cycle(&mut board, &mut targets, &mut transport)
            .await
            .expect("cycle runs");
        assert_eq!(report.arrived, vec!["a"]);
        assert!(transport.calls.is_empty());
        assert!(!targets.get("a").expect("record").has_target());
    }

    #[tokio::test]
    async fn exhausted_budget_is_idle_not_arrived() {
        let mut board = my_board(vec![ship("a", "me", 0, 0, 0)]);
        let mut targets = TargetStore::in_memory();
        targets.set_target("a", 2, 0);
        let mut transport = ScriptedTransport::tracking(&board);

        let report = run_autopilot_cycle(&mut board, &mut targets, &mut transport)
            .await
            .expect("cycle runs");
        assert_eq!(report, AutopilotReport::default());
        assert!(targets.get("a").expect("record").has_target());
    }

    #[tokio::test]
    async fn second_collision_on_same_cell_is_swallowed() {
        let mut board = my_board(vec![ship("s1", "me", 2, 0, 2), ship("s2", "me", 0, 2, 2)]);
        let mut targets = TargetStore::in_memory();
        targets.set_target("s1", 2, 2);
        targets.set_target("s2", 2, 2);
        let mut transport = ScriptedTransport::tracking(&board);

        let report = run_autopilot_cycle(&mut board, &mut targets, &mut transport)
            .await
            .expect("collisions are not errors");
        assert_eq!(report.moved, vec!["s1"]);
        assert_eq!(report.stalled, vec!["s2"]);
        assert_eq!(
            transport.calls,
            vec![
                ("s1".to_string(), 0, 2),
                ("s2".to_string(), 2, 0),
                ("s2".to_string(), 2, 0),
            ]
        );
        let s2 = board.ship("s2").expect("ship exists");
        assert_eq!((s2.x, s2.y), (0, 2));
    }

    #[tokio::test]
    async fn retry_runs_in_reverse_order() {
        // a waits on b, b waits on c; c moving first frees b, then b frees a.
        let mut board = my_board(vec![
            ship("a", "me", 0, 0, 1),
            ship("b", "me", 1, 0, 1),
            ship("c", "me", 2, 0, 1),
        ]);
        let mut targets = TargetStore::in_memory();
        targets.set_target("a", 1, 0);
        targets.set_target("b", 2, 0);
        targets.set_target("c", 3, 0);
        let mut transport = ScriptedTransport::tracking(&board);

        let report = run_autopilot_cycle(&mut board, &mut targets, &mut transport)
            .await
            .expect("cycle runs");
        assert_eq!(report.moved, vec!["c", "b", "a"]);
        assert!(report.stalled.is_empty());
        let called: Vec<&str> = transport.calls.iter().map(|(id, _, _)| id.as_str()).collect();
        assert_eq!(called, vec!["a", "b", "c", "b", "a"]);
    }

    #[tokio::test]
    async fn other_failures_abort_the_cycle() {
        let mut board = my_board(vec![ship("a", "me", 0, 0, 1), ship("b", "me", 5, 5, 1)]);
        let mut targets = TargetStore::in_memory();
        targets.set_target("a", 1, 0);
        targets.set_target("b", 6, 5);
        let mut transport = ScriptedTransport::tracking(&board);
        transport.denied.insert("a".to_string());

        let result = run_autopilot_cycle(&mut board, &mut targets, &mut transport).await;
        assert!(matches!(result, Err(GameError::CanNotAccessShip(_))));
        assert_eq!(transport.calls.len(), 1);
    }

    #[tokio::test]
    async fn opponent_ships_are_never_moved() {
        let mut board = my_board(vec![]);
        let mut targets = TargetStore::in_memory();
        targets.set_target("z", 0, 0);
        let mut transport = ScriptedTransport::tracking(&board);

        let report = run_autopilot_cycle(&mut board, &mut targets, &mut transport)
            .await
            .expect("cycle runs");
        assert_eq!(report, AutopilotReport::default());
        assert!(transport.calls.is_empty());
    }
}
