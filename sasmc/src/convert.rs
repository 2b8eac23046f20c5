// Checked numeric casts; panics here would mean ensembles or step counts far
// beyond anything the optimizer can iterate over.

pub fn f64_from_usize(x: usize) -> f64 {
    f64::from(u32::try_from(x).unwrap())
}

pub fn usize_from_u64(x: u64) -> usize {
    usize::try_from(x).unwrap()
}

pub fn u64_from_usize(x: usize) -> u64 {
    u64::try_from(x).unwrap()
}

// step counters stay far below 2^53, where this cast is exact
#[allow(clippy::cast_precision_loss)]
pub fn f64_from_u64(x: u64) -> f64 {
    x as f64
}
