//! Pod health score bounds

pub const MIN_SCORE: i32 = -20;
pub const MAX_SCORE: i32 = 20;

/// Clamp a running score into `[MIN_SCORE, MAX_SCORE]`
pub fn normalize(score: i32) -> i32 {
    score.clamp(MIN_SCORE, MAX_SCORE)
}
