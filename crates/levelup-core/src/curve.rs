//! Level threshold curve
//!
//! A staircase: every block of ten levels shares one per-level increment,
//! and the increment triples from one block to the next. Levels 1-10 cost
//! 1 000 each, 11-20 cost 3 000, ... 51-60 cost 243 000. Past level 60 the
//! last increment repeats so the curve keeps rising.

/// Per-level increment of the first block.
const BASE_STEP: u64 = 1_000;
const LEVELS_PER_BLOCK: u32 = 10;
/// Number of blocks whose step triples. Later levels reuse the last step.
const TRIPLING_BLOCKS: u32 = 6;

/// Most levels a single grant may advance before the loop gives up.
pub const MAX_LEVEL_STEPS: u32 = 100;

/// XP needed to go from `level - 1` to `level`.
pub fn xp_step(level: u32) -> u64 {
    if level == 0 {
        return 0;
    }
    let block = ((level - 1) / LEVELS_PER_BLOCK).min(TRIPLING_BLOCKS - 1);
    BASE_STEP * 3u64.pow(block)
}

/// Cumulative XP required to hold `level`. `required(0) == 0`.
pub fn required(level: u32) -> u64 {
    let mut total = 0u64;
    let mut remaining = level;
    for block in 0..TRIPLING_BLOCKS {
        if remaining == 0 {
            return total;
        }
        let levels = remaining.min(LEVELS_PER_BLOCK);
        total += u64::from(levels) * BASE_STEP * 3u64.pow(block);
        remaining -= levels;
    }
    let last_step = xp_step(TRIPLING_BLOCKS * LEVELS_PER_BLOCK);
    total.saturating_add(u64::from(remaining).saturating_mul(last_step))
}

/// Greatest level whose threshold is covered by `xp`, never below 1.
pub fn level_for_xp(xp: u64) -> u32 {
    let mut level = 0u32;
    let mut remaining = xp;
    for block in 0..TRIPLING_BLOCKS {
        let step = BASE_STEP * 3u64.pow(block);
        let span = step * u64::from(LEVELS_PER_BLOCK);
        if remaining < span {
            level += (remaining / step) as u32;
            return level.max(1);
        }
        remaining -= span;
        level += LEVELS_PER_BLOCK;
    }
    let last_step = xp_step(TRIPLING_BLOCKS * LEVELS_PER_BLOCK);
    let extra = (remaining / last_step).min(u64::from(u32::MAX - level)) as u32;
    (level + extra).max(1)
}
