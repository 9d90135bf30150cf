use std::env;
use std::str::FromStr;
use std::sync::OnceLock;

use rand::prelude::*;

use rand_xorshift::XorShiftRng;

/// Input patterns for exercising sorting implementations, i32 valued.

// --- Public ---

pub fn random_init_seed() -> u64 {
    static SEED: OnceLock<u64> = OnceLock::new();

    *SEED.get_or_init(|| {
        env::var("OVERRIDE_SEED")
            .ok()
            .map(|seed| u64::from_str(&seed).unwrap())
            .unwrap_or_else(rand_root_seed)
    })
}

pub fn random(len: usize) -> Vec<i32> {
    //     .
    // : . : :
    // :.:::.::

    let mut rng = seeded_rng();
    (0..len).map(|_| rng.gen::<i32>()).collect()
}

pub fn random_uniform(len: usize, range: std::ops::RangeInclusive<i32>) -> Vec<i32> {
    // :.:.:.::

    let mut rng = seeded_rng();
    (0..len).map(|_| rng.gen_range(range.clone())).collect()
}

pub fn random_sorted(len: usize, sorted_percent: f64) -> Vec<i32> {
    //     .:
    //   .:::. :
    // .::::::.::
    // [----][--]
    //  ^      ^
    //  |      |
    // sorted  |
    //     unsorted

    let mut v = random(len);
    let sorted_len = (((len as f64) * (sorted_percent / 100.0)).round() as usize).min(len);
    v[..sorted_len].sort_unstable();
    v
}

pub fn all_equal(len: usize) -> Vec<i32> {
    // ......
    // ::::::

    vec![66; len]
}

pub fn ascending(len: usize) -> Vec<i32> {
    //     .:
    //   .:::
    // .:::::

    (0..len as i32).collect()
}

pub fn descending(len: usize) -> Vec<i32> {
    // :.
    // :::.
    // :::::.

    (0..len as i32).rev().collect()
}

pub fn saw_mixed(len: usize, saw_count: usize) -> Vec<i32> {
    // :.  :.    .::.    .:
    // :::.:::..::::::..:::

    if len == 0 {
        return Vec::new();
    }

    let mut vals = random(len);
    let chunk_size = (len / saw_count.max(1)).max(1);

    for (i, chunk) in vals.chunks_mut(chunk_size).enumerate() {
        if i % 2 == 0 {
            chunk.sort_unstable();
        } else {
            chunk.sort_unstable_by_key(|&e| std::cmp::Reverse(e));
        }
    }

    vals
}

pub fn pipe_organ(len: usize) -> Vec<i32> {
    //   .:.
    // .:::::.

    let mut vals = random(len);

    let mid = len / 2;
    vals[..mid].sort_unstable();
    vals[mid..].sort_unstable_by_key(|&e| std::cmp::Reverse(e));

    vals
}

// --- Private ---

fn rand_root_seed() -> u64 {
    // Seconds since UNIX epoch / 10; given CI log output this value is
    // reasonably easy to re-construct.
    use std::time::{SystemTime, UNIX_EPOCH};

    let epoch_seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();

    epoch_seconds / 10
}

fn seeded_rng() -> XorShiftRng {
    XorShiftRng::seed_from_u64(random_init_seed())
}
