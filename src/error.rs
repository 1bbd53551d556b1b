use thiserror::Error;

use crate::{ListId, SlotId};

/// Errors for structurally malformed input. Unsatisfiable grids and exhausted attempt budgets
/// are not errors; they come back as a partial `FillOutcome`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("grid is {width}x{height} and needs {expected} cells, but {actual} were given")]
    GridSizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("cell ({x}, {y}) holds {letter:?}, which is not an ASCII letter")]
    InvalidLetter { x: usize, y: usize, letter: char },

    #[error("slot {slot} leaves the grid or covers an unavailable cell at ({x}, {y})")]
    SlotOutOfBounds { slot: SlotId, x: usize, y: usize },

    #[error("slot {slot} claims length {claimed} but the grid run is {actual} cells long")]
    SlotLengthMismatch {
        slot: SlotId,
        claimed: usize,
        actual: usize,
    },

    #[error("slots {first} and {second} share more than one cell")]
    OverlappingSlots { first: SlotId, second: SlotId },

    #[error("slot {slot} has a constraint at offset {offset}, past its length {length}")]
    ConstraintOutOfRange {
        slot: SlotId,
        offset: usize,
        length: usize,
    },

    #[error("slot {slot} expects {expected:?} at offset {offset} but the grid has {found:?}")]
    ContradictoryConstraint {
        slot: SlotId,
        offset: usize,
        expected: char,
        found: char,
    },

    #[error("candidate {word:?} for slot {slot} does not have length {length}")]
    CandidateLengthMismatch {
        slot: SlotId,
        word: String,
        length: usize,
    },

    #[error("pattern constraint at offset {offset} is past its length {length}")]
    PatternOffsetOutOfRange { offset: usize, length: usize },

    #[error("pattern has length {actual}, expected {expected}")]
    PatternLengthMismatch { expected: usize, actual: usize },

    #[error("word {word:?} does not have length {length}")]
    WordLengthMismatch { word: String, length: usize },

    #[error("word length {0} is outside the supported range")]
    UnsupportedLength(usize),

    #[error("{0:?} is not a valid word")]
    InvalidWord(String),

    #[error("no word list is loaded under id {0}")]
    UnknownWordList(ListId),

    #[error("selected slot {0} does not exist")]
    UnknownSlot(SlotId),

    #[error("cross constraints must cover all {expected} positions, got {actual}")]
    CrossConstraintArity { expected: usize, actual: usize },

    #[error("template is empty")]
    EmptyTemplate,

    #[error("template row {row} has width {actual}, expected {expected}")]
    RaggedTemplate {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
