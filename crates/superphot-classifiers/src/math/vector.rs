/// Index of the largest value. Ties resolve to the first occurrence and NaN
/// entries are never selected unless every entry is NaN.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &v) in values.iter().enumerate() {
        match best {
            None => best = Some((idx, v)),
            Some((_, b)) if v > b || (b.is_nan() && !v.is_nan()) => best = Some((idx, v)),
            _ => {}
        }
    }
    best.map(|(idx, _)| idx)
}
