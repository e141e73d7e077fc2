//! Per-stub response cursor.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Something with an optional `_behaviors.repeat` count.
pub trait HasRepeatBehavior {
    fn repeat(&self) -> Option<u32>;
}

/// Where a cursor stands: which response, and how many times it has been
/// served in the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    response: u32,
    served: u32,
}

impl Position {
    fn unpack(word: u64) -> Self {
        Self {
            response: (word >> 32) as u32,
            served: word as u32,
        }
    }

    fn pack(self) -> u64 {
        (u64::from(self.response) << 32) | u64::from(self.served)
    }

    /// Clamp into a list of `len` responses.
    fn clamped(self, len: u32) -> Self {
        Self {
            response: self.response.min(len.saturating_sub(1)),
            ..self
        }
    }

    /// The position after serving the current response once more.
    fn after_serving(self, len: u32, repeat: u32) -> Self {
        let served = self.served.saturating_add(1);
        if served < repeat {
            return Self { served, ..self };
        }
        Self {
            response: (self.response + 1) % len,
            served: 0,
        }
    }
}

/// Lock-free cursor over a stub's responses.
///
/// The response index and the serve count of the current response share one
/// `AtomicU64`, and a read-and-advance is a single `fetch_update`. Concurrent
/// resolutions against one stub each observe a distinct position.
#[derive(Default)]
pub struct ResponseCursor(AtomicU64);

impl ResponseCursor {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    fn position(&self) -> Position {
        Position::unpack(self.0.load(Ordering::Acquire))
    }

    /// Index the next resolution would use, without advancing.
    #[must_use]
    pub fn peek(&self, response_count: u32) -> u32 {
        self.position().clamped(response_count).response
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }

    /// Take the current response index and advance. `repeat_of(i)` is how many
    /// consecutive times response `i` is served (absent or zero means once).
    #[must_use]
    pub fn next(&self, response_count: u32, mut repeat_of: impl FnMut(u32) -> Option<u32>) -> u32 {
        if response_count == 0 {
            return 0;
        }

        let step = |word: u64| {
            let current = Position::unpack(word).clamped(response_count);
            let repeat = repeat_of(current.response).unwrap_or(1).max(1);
            Some(current.after_serving(response_count, repeat).pack())
        };
        // The closure always returns `Some`, so both arms carry the previous word.
        let previous = match self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, step) {
            Ok(word) | Err(word) => word,
        };
        Position::unpack(previous).clamped(response_count).response
    }

    /// [`next`](Self::next) for a slice of responses carrying their own repeat counts.
    #[must_use]
    pub fn next_for<T: HasRepeatBehavior>(&self, responses: &[T]) -> usize {
        self.next(responses.len() as u32, |i| {
            responses.get(i as usize).and_then(HasRepeatBehavior::repeat)
        }) as usize
    }
}

impl fmt::Debug for ResponseCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let position = Position::unpack(self.0.load(Ordering::Relaxed));
        f.debug_struct("ResponseCursor")
            .field("response", &position.response)
            .field("served", &position.served)
            .finish()
    }
}
