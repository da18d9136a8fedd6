use crate::types::Vec2;

/// Normalizes a heading in degrees into `[0, 360)`.
pub(super) fn wrap_heading(heading: f32) -> f32 {
    let wrapped = heading.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest turn from `from` to `to`, in `(-180, 180]` degrees.
pub(super) fn heading_delta(from: f32, to: f32) -> f32 {
    let delta = wrap_heading(to - from);
    if delta > 180.0 {
        delta - 360.0
    } else {
        delta
    }
}

pub(super) fn heading_towards(from: Vec2, to: Vec2) -> f32 {
    wrap_heading((to.y - from.y).atan2(to.x - from.x).to_degrees())
}

pub(super) fn step_along(position: Vec2, heading: f32, distance: f32) -> Vec2 {
    let radians = heading.to_radians();
    Vec2::new(
        position.x + distance * radians.cos(),
        position.y + distance * radians.sin(),
    )
}

/// Keeps a player's cell-sized box inside the arena.
pub(super) fn clamp_to_arena(position: Vec2, width: f32, height: f32, cell_size: f32) -> Vec2 {
    Vec2::new(
        position.x.clamp(0.0, (width - cell_size).max(0.0)),
        position.y.clamp(0.0, (height - cell_size).max(0.0)),
    )
}
