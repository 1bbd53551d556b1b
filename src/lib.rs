use std::fmt::{self, Debug, Display, Formatter};

use smallvec::SmallVec;

pub mod analyzer;
pub mod error;
pub mod fill;
pub mod grid;
pub mod ranking;
pub mod search;
pub mod slot;
pub mod word_index;
pub mod word_list;

pub use crate::error::{Error, Result};
pub use crate::fill::{
    fill, BacktrackPolicy, FillOptions, FillOutcome, FillStatus, SelectionPolicy, StartPolicy,
    Statistics, StopReason,
};
pub use crate::grid::{CellInput, Grid, GridInput};
pub use crate::ranking::RankingMode;
pub use crate::search::{search, CrossConstraint, SearchHit};
pub use crate::slot::SlotSpec;
pub use crate::word_index::{BuildReport, WordIndex, WordIndexStore};

/// Words must be strictly shorter than this to be indexed.
pub const MAX_WORD_LENGTH: usize = 64;

/// The most distinct characters an admissible set will collect for a single cell.
pub const MAX_ALPHABET_SIZE: usize = 50;

/// The expected maximum length for a single slot; longer slots still work but spill to the heap.
pub const MAX_SLOT_LENGTH: usize = 21;

/// How many candidate lookups a fill call may make before settling for its best partial fill.
pub const DEFAULT_ATTEMPT_BUDGET: usize = 25_000;

/// The byte standing for an empty cell in a pattern.
pub const WILDCARD: u8 = b'.';

/// Identifies one word list loaded into a `WordIndexStore`.
pub type ListId = usize;

/// An identifier for a given slot, based on its index in the slot table of a fill call.
pub type SlotId = usize;

/// Zero-indexed x and y coords for a cell in the grid, where y = 0 in the top row.
pub type GridCoord = (usize, usize);

/// Direction that a slot is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Across,
    Down,
}

impl Direction {
    pub fn other(self) -> Direction {
        match self {
            Direction::Across => Direction::Down,
            Direction::Down => Direction::Across,
        }
    }

    /// The coords `n` cells further along this direction.
    pub fn advance(self, (x, y): GridCoord, n: usize) -> GridCoord {
        match self {
            Direction::Across => (x + n, y),
            Direction::Down => (x, y + n),
        }
    }
}

/// A fixed-length sequence of lowercase letters and wildcards describing what a slot currently
/// looks like.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Pattern(SmallVec<[u8; MAX_SLOT_LENGTH]>);

impl Pattern {
    /// A pattern of `length` wildcards.
    pub fn wildcards(length: usize) -> Pattern {
        Pattern(SmallVec::from_elem(WILDCARD, length))
    }

    /// Parse a pattern where `.` or `?` stands for an empty cell.
    pub fn parse(text: &str) -> Result<Pattern> {
        text.chars()
            .map(|c| match c {
                '.' | '?' => Ok(WILDCARD),
                c if c.is_ascii_alphabetic() => Ok(c.to_ascii_lowercase() as u8),
                _ => Err(Error::InvalidWord(text.to_string())),
            })
            .collect::<Result<_>>()
            .map(Pattern)
    }

    /// Build a pattern of the given length from `(offset, letter)` pairs.
    pub fn from_constraints(length: usize, constraints: &[(usize, char)]) -> Result<Pattern> {
        let mut pattern = Pattern::wildcards(length);

        for &(offset, letter) in constraints {
            if offset >= length {
                return Err(Error::PatternOffsetOutOfRange { offset, length });
            }
            if !letter.is_ascii_alphabetic() {
                return Err(Error::InvalidWord(letter.to_string()));
            }
            pattern.set(offset, Some(letter.to_ascii_lowercase() as u8));
        }

        Ok(pattern)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The letter at `offset`, or `None` if that cell is a wildcard.
    pub fn get(&self, offset: usize) -> Option<u8> {
        match self.0[offset] {
            WILDCARD => None,
            letter => Some(letter),
        }
    }

    pub fn set(&mut self, offset: usize, letter: Option<u8>) {
        self.0[offset] = letter.unwrap_or(WILDCARD);
    }

    /// Does this pattern contain no wildcards at all?
    pub fn is_complete(&self) -> bool {
        !self.0.contains(&WILDCARD)
    }

    pub fn with_wildcard_at(&self, offset: usize) -> Pattern {
        let mut pattern = self.clone();
        pattern.set(offset, None);
        pattern
    }

    /// Does the word agree with every concrete position of this pattern?
    pub fn matches(&self, word: &[u8]) -> bool {
        word.len() == self.0.len()
            && self.0.iter().zip(word).all(|(&p, &w)| p == WILDCARD || p == w)
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            write!(f, "{}", byte as char)?;
        }
        Ok(())
    }
}

impl Debug for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.to_string())
    }
}
