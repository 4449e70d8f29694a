pub(super) fn dist2(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    (ax - bx).powi(2) + (ay - by).powi(2)
}

/// Moves `from` toward `to` by at most `step`.
pub(super) fn step_toward(from: (f32, f32), to: (f32, f32), step: f32) -> (f32, f32) {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let length = (dx * dx + dy * dy).sqrt();
    if length <= f32::EPSILON {
        return from;
    }
    if length <= step {
        return to;
    }
    (from.0 + dx / length * step, from.1 + dy / length * step)
}

/// Index of the point closest to `(x, y)`, first one wins on ties.
pub(super) fn nearest<I>(x: f32, y: f32, points: I) -> Option<usize>
where
    I: IntoIterator<Item = (f32, f32)>,
{
    let mut best: Option<(usize, f32)> = None;
    for (idx, (px, py)) in points.into_iter().enumerate() {
        let d = dist2(x, y, px, py);
        if best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((idx, d));
        }
    }
    best.map(|(idx, _)| idx)
}
