use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use core::num::NonZeroI64;
use model::Question;
use rand::Rng;

/// How long a question stays out of rotation after being shown.
const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub question_id: NonZeroI64,
    /// Index of the chosen entry in the pool passed to [`pick`].
    pub index: usize,
    /// Set when every question in the pool was used within the window, so
    /// the fallback to the full pool kicked in. The caller should warn the
    /// teacher that repeats are now possible.
    pub exhausted: bool,
}

/// Choose the next question for a class, avoiding anything shown within
/// the last seven days. The chosen entry is stamped with `last_used_at`
/// in place; persisting that stamp is the question bank's job.
pub fn pick<R: Rng>(pool: &mut [Question], now: DateTime<Utc>, rng: &mut R) -> Result<Selection> {
    if pool.is_empty() {
        return Err(Error::EmptyPool);
    }

    let window = Duration::days(WINDOW_DAYS);
    let candidates: Vec<usize> = pool
        .iter()
        .enumerate()
        .filter(|(_, question)| match question.last_used_at {
            Some(used) => now - used >= window,
            None => true,
        })
        .map(|(index, _)| index)
        .collect();

    let exhausted = candidates.is_empty();
    let index = if exhausted {
        rng.gen_range(0..pool.len())
    } else {
        candidates[rng.gen_range(0..candidates.len())]
    };

    pool[index].last_used_at = Some(now);
    Ok(Selection { question_id: pool[index].id, index, exhausted })
}
