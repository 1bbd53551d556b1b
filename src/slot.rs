use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use smallvec::SmallVec;

use crate::grid::Grid;
use crate::word_index::{WordIndex, WordIndexStore};
use crate::{Direction, Error, GridCoord, ListId, Pattern, Result, SlotId, MAX_SLOT_LENGTH, MAX_WORD_LENGTH};

/// An identifier for the word source a slot draws its candidates from, based on its index in the
/// slot table's `sources`.
pub type SourceId = usize;

/// Slot metadata as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSpec {
    pub x: usize,
    pub y: usize,
    pub direction: Direction,
    pub length: usize,
    /// Letters the caller expects at given offsets; they must agree with the grid.
    pub constraints: Vec<(usize, char)>,
    /// A candidate list already filtered to this slot's length. `None` draws from the word list
    /// passed to the fill call.
    pub candidates: Option<Vec<(String, i32)>>,
}

impl SlotSpec {
    pub fn new(x: usize, y: usize, direction: Direction, length: usize) -> SlotSpec {
        SlotSpec { x, y, direction, length, constraints: vec![], candidates: None }
    }

    pub fn with_candidates(mut self, candidates: Vec<(String, i32)>) -> SlotSpec {
        self.candidates = Some(candidates);
        self
    }

    /// Generate the coords for each cell of this slot.
    pub fn cell_coords(&self) -> impl Iterator<Item=GridCoord> + '_ {
        (0..self.length).map(|offset| self.direction.advance((self.x, self.y), offset))
    }
}

/// A crossing between one slot and another, referencing the other slot's id and the location of
/// the intersection within the other slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    pub other_slot_id: SlotId,
    pub other_slot_cell: usize,
}

/// The aspects of a slot that are static during filling.
#[derive(Debug, Clone)]
pub struct SlotConfig {
    pub id: SlotId,
    pub start_cell: GridCoord,
    pub direction: Direction,
    pub length: usize,
    pub source: SourceId,
    pub crossings: SmallVec<[Option<Crossing>; MAX_SLOT_LENGTH]>,
}

impl SlotConfig {
    pub fn cell_coords(&self) -> impl Iterator<Item=GridCoord> + '_ {
        (0..self.length).map(|offset| self.direction.advance(self.start_cell, offset))
    }
}

/// Where a slot's words come from: a length bucket of a shared word list, or a per-call index
/// built from a caller-supplied candidate list.
enum WordSource<'a> {
    Shared(&'a WordIndex),
    Owned(WordIndex),
}

impl<'a> WordSource<'a> {
    fn index(&self) -> &WordIndex {
        match self {
            WordSource::Shared(index) => index,
            WordSource::Owned(index) => index,
        }
    }
}

/// The fixed set of slots for one fill call, with their crossings and word sources.
pub struct SlotTable<'a> {
    configs: Vec<SlotConfig>,
    sources: Vec<WordSource<'a>>,
}

impl<'a> Debug for SlotTable<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotTable")
            .field("configs", &self.configs)
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl<'a> SlotTable<'a> {
    /// Validate the slot specs against the grid and build the table. Slots drawing from the word
    /// list share one source per length; slots with identical candidate lists share one too.
    pub fn build(
        grid: &Grid,
        specs: &[SlotSpec],
        store: &'a WordIndexStore,
        list_id: ListId,
    ) -> Result<SlotTable<'a>> {
        // (slot id, cell index within slot) for each cell, per direction.
        let mut across_at: HashMap<GridCoord, (SlotId, usize)> = HashMap::new();
        let mut down_at: HashMap<GridCoord, (SlotId, usize)> = HashMap::new();

        for (slot_id, spec) in specs.iter().enumerate() {
            Self::validate(grid, slot_id, spec)?;

            let cells_by_loc = match spec.direction {
                Direction::Across => &mut across_at,
                Direction::Down => &mut down_at,
            };
            for (cell_idx, loc) in spec.cell_coords().enumerate() {
                if let Some(&(other_slot_id, _)) = cells_by_loc.get(&loc) {
                    return Err(Error::OverlappingSlots { first: other_slot_id, second: slot_id });
                }
                cells_by_loc.insert(loc, (slot_id, cell_idx));
            }
        }

        let mut sources: Vec<WordSource<'a>> = vec![];
        let mut shared_by_length: HashMap<usize, SourceId> = HashMap::new();
        let mut owned_by_list: HashMap<&[(String, i32)], SourceId> = HashMap::new();
        let mut configs = Vec::with_capacity(specs.len());

        for (slot_id, spec) in specs.iter().enumerate() {
            let source = match &spec.candidates {
                Some(candidates) => *owned_by_list.entry(candidates.as_slice()).or_insert_with(|| {
                    let (index, _) = WordIndex::build(
                        spec.length,
                        candidates.iter().map(|(word, score)| (word.as_str(), *score)),
                    );
                    sources.push(WordSource::Owned(index));
                    sources.len() - 1
                }),
                None => match shared_by_length.get(&spec.length) {
                    Some(&source) => source,
                    None => {
                        let word_source = if spec.length < MAX_WORD_LENGTH {
                            WordSource::Shared(store.index(list_id, spec.length)?)
                        } else {
                            WordSource::Owned(WordIndex::new(spec.length))
                        };
                        sources.push(word_source);
                        shared_by_length.insert(spec.length, sources.len() - 1);
                        sources.len() - 1
                    }
                },
            };

            let crossing_map = match spec.direction {
                Direction::Across => &down_at,
                Direction::Down => &across_at,
            };
            let crossings = spec.cell_coords().map(|loc| {
                crossing_map.get(&loc).map(|&(other_slot_id, other_slot_cell)| {
                    Crossing { other_slot_id, other_slot_cell }
                })
            }).collect();

            configs.push(SlotConfig {
                id: slot_id,
                start_cell: (spec.x, spec.y),
                direction: spec.direction,
                length: spec.length,
                source,
                crossings,
            });
        }

        Ok(SlotTable { configs, sources })
    }

    fn validate(grid: &Grid, slot_id: SlotId, spec: &SlotSpec) -> Result<()> {
        for loc in spec.cell_coords() {
            if !grid.is_available(loc) {
                return Err(Error::SlotOutOfBounds { slot: slot_id, x: loc.0, y: loc.1 });
            }
        }

        let actual = grid.run_length((spec.x, spec.y), spec.direction);
        if spec.length == 0 || actual != spec.length {
            return Err(Error::SlotLengthMismatch { slot: slot_id, claimed: spec.length, actual });
        }

        for &(offset, expected) in &spec.constraints {
            if offset >= spec.length {
                return Err(Error::ConstraintOutOfRange { slot: slot_id, offset, length: spec.length });
            }
            let found = grid.letter(spec.direction.advance((spec.x, spec.y), offset));
            if found != Some(expected.to_ascii_lowercase() as u8) {
                return Err(Error::ContradictoryConstraint {
                    slot: slot_id,
                    offset,
                    expected,
                    found: found.map(|letter| letter as char).unwrap_or('.'),
                });
            }
        }

        for (word, _) in spec.candidates.iter().flatten() {
            if word.trim().chars().count() != spec.length {
                return Err(Error::CandidateLengthMismatch {
                    slot: slot_id,
                    word: word.clone(),
                    length: spec.length,
                });
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn configs(&self) -> &[SlotConfig] {
        &self.configs
    }

    pub fn config(&self, slot_id: SlotId) -> &SlotConfig {
        &self.configs[slot_id]
    }

    /// The index a slot draws its words from.
    pub fn words_for(&self, slot_id: SlotId) -> &WordIndex {
        self.sources[self.configs[slot_id].source].index()
    }

    /// Do these two slots share a cell?
    pub fn intersects(&self, slot_id: SlotId, other_slot_id: SlotId) -> bool {
        self.configs[slot_id].crossings.iter().flatten()
            .any(|crossing| crossing.other_slot_id == other_slot_id)
    }

    pub fn read_pattern(&self, grid: &Grid, slot_id: SlotId) -> Pattern {
        let config = &self.configs[slot_id];
        grid.read_pattern(config.start_cell, config.direction, config.length)
    }
}
