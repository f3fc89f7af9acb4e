use std::fmt;
use std::str::FromStr;

use quadscan_source::CollectionMode;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Next,
    Prev,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown direction '{0}', expected 'next' or 'prev'")]
pub struct ParseDirectionError(String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "next" => Ok(Direction::Next),
            "prev" | "previous" => Ok(Direction::Prev),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Next => "next",
            Direction::Prev => "prev",
        })
    }
}

/// Cursor over one collection.
///
/// `index` is `-1` exactly when the collection is empty; otherwise it lies in
/// `0..total`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    mode: CollectionMode,
    index: i64,
    total: usize,
}

impl NavigationState {
    /// Cursor on the first item, or unset for an empty collection.
    pub fn new(mode: CollectionMode, total: usize) -> Self {
        Self {
            mode,
            index: if total > 0 { 0 } else { -1 },
            total,
        }
    }

    pub fn mode(&self) -> CollectionMode {
        self.mode
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn contains(&self, index: i64) -> bool {
        index >= 0 && (index as u64) < self.total as u64
    }

    pub fn has_next(&self) -> bool {
        self.contains(self.index + 1)
    }

    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    /// Index `advance` would move to, without moving. Clamped at both ends.
    pub fn target(&self, direction: Direction) -> i64 {
        if self.is_empty() {
            return -1;
        }
        match direction {
            Direction::Next if self.has_next() => self.index + 1,
            Direction::Prev if self.has_prev() => self.index - 1,
            _ => self.index,
        }
    }

    pub fn advance(&mut self, direction: Direction) -> i64 {
        self.index = self.target(direction);
        self.index
    }

    /// Move to `index` if it is in range. Returns whether the cursor moved.
    pub fn select(&mut self, index: i64) -> bool {
        if self.contains(index) {
            self.index = index;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cursor_starts_at_first_or_unset() {
        let nav = NavigationState::new(CollectionMode::Local, 3);
        assert_eq!((nav.index(), nav.total()), (0, 3));
        assert!(nav.has_next() && !nav.has_prev());

        let empty = NavigationState::new(CollectionMode::Shared, 0);
        assert_eq!(empty.index(), -1);
        assert!(!empty.has_next() && !empty.has_prev());
    }

    #[test]
    fn advance_clamps_at_both_ends() {
        let mut nav = NavigationState::new(CollectionMode::Remote, 3);
        assert_eq!(nav.advance(Direction::Prev), 0);
        assert_eq!(nav.advance(Direction::Next), 1);
        assert_eq!(nav.advance(Direction::Next), 2);
        assert_eq!(nav.advance(Direction::Next), 2);
        assert!(!nav.has_next());
        assert_eq!(nav.advance(Direction::Prev), 1);
    }

    #[test]
    fn any_walk_stays_in_bounds() {
        for total in 0..5usize {
            let mut nav = NavigationState::new(CollectionMode::Local, total);
            // Deterministic pseudo-random walk.
            let mut seed = 0x2545_f491_u32 ^ total as u32;
            for _ in 0..200 {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                let dir = if seed & 1 == 0 { Direction::Next } else { Direction::Prev };
                let idx = nav.advance(dir);
                if total == 0 {
                    assert_eq!(idx, -1);
                } else {
                    assert!((0..total as i64).contains(&idx), "{idx} of {total}");
                }
            }
        }
    }

    #[test]
    fn select_rejects_out_of_range() {
        let mut nav = NavigationState::new(CollectionMode::Local, 2);
        assert!(nav.select(1));
        assert!(!nav.select(2));
        assert!(!nav.select(-1));
        assert_eq!(nav.index(), 1);
    }

    #[test]
    fn directions_parse() {
        assert_eq!("next".parse::<Direction>(), Ok(Direction::Next));
        assert_eq!(" Previous ".parse::<Direction>(), Ok(Direction::Prev));
        assert!("up".parse::<Direction>().is_err());
    }
}
