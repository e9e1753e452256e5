use crate::board::Ship;
use crate::target_store::ShipTarget;

/// Next incremental move toward `target` with `units_left` of budget.
///
/// The x axis is served first: if it needs the whole budget, y does not move
/// this turn. Whatever is left goes to y. Axes that are unset or already
/// reached are cleared on the record, so a record with both axes cleared
/// means the ship has arrived.
pub fn next_move(current_x: i32, current_y: i32, target: &mut ShipTarget, units_left: i32) -> (i32, i32) {
    let dx = axis_delta(current_x, &mut target.target_x);
    let dy = axis_delta(current_y, &mut target.target_y);
    allocate(dx, dy, units_left.max(0))
}

pub fn next_move_for(ship: &Ship, target: &mut ShipTarget) -> (i32, i32) {
    next_move(ship.x, ship.y, target, ship.units_left)
}

fn axis_delta(current: i32, target: &mut Option<i32>) -> i32 {
    match *target {
        Some(value) if value != current => value - current,
        _ => {
            *target = None;
            0
        }
    }
}

fn allocate(dx: i32, dy: i32, units: i32) -> (i32, i32) {
    if dx.abs() >= units {
        return (dx.signum() * units, 0);
    }
    let remaining = units - dx.abs();
    (dx, dy.signum() * dy.abs().min(remaining))
}
