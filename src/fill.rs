use bit_set::BitSet;
use instant::{Duration, Instant};
use log::{debug, trace};
use smallvec::SmallVec;

use crate::analyzer::{validate_candidate, Analyzer, CrossCell, CrossSection};
use crate::grid::{Grid, GridInput};
use crate::ranking::{ranker_for, select_candidate, CandidateRanker, RankingMode, UsedWords};
use crate::slot::{SlotSpec, SlotTable};
use crate::word_index::WordIndexStore;
use crate::{Error, GridCoord, ListId, Result, SlotId, DEFAULT_ATTEMPT_BUDGET, MAX_SLOT_LENGTH};

/// Which slot to fill first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPolicy {
    /// The first slot in the table.
    Origin,
    /// A specific slot, e.g. the one the user has selected. Falls back to the first slot if it's
    /// already complete.
    Selection(SlotId),
    /// The slot with the fewest matching words.
    #[default]
    Auto,
}

/// Which slot to fill next once something has been placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// The first unfinished slot in table order.
    FromOrigin,
    /// The unfinished slot with the fewest matching words, ties broken by table order.
    MostConstrained,
    /// The most constrained unfinished slot crossing the most recent placement that still has
    /// one, so the fill grows outward from where it started.
    #[default]
    ConnectedToFrontier,
}

/// Which placement to undo when a slot has no viable candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BacktrackPolicy {
    /// The most recent placement that can change the stuck slot's candidates, clearing
    /// everything after it. Falls back to a single step when the failure wasn't local.
    #[default]
    NearestIntersection,
    /// Always the most recent placement.
    SingleStep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillOptions {
    pub start: StartPolicy,
    pub selection: SelectionPolicy,
    pub backtrack: BacktrackPolicy,
    pub ranking: RankingMode,
    pub forbid_duplicates: bool,
    /// Stop as soon as this many slots are complete.
    pub target_done_count: Option<usize>,
    /// How many candidate lookups to allow before giving up.
    pub attempt_budget: usize,
}

impl Default for FillOptions {
    fn default() -> Self {
        FillOptions {
            start: StartPolicy::default(),
            selection: SelectionPolicy::default(),
            backtrack: BacktrackPolicy::default(),
            ranking: RankingMode::default(),
            forbid_duplicates: true,
            target_done_count: None,
            attempt_budget: DEFAULT_ATTEMPT_BUDGET,
        }
    }
}

/// A struct tracking statistics about the filling process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Candidate lookups, each counted against the attempt budget.
    pub attempts: u64,
    pub placements: u64,
    /// Candidates rejected because placing them would leave a crossing slot with no matches.
    pub retries: u64,
    pub backtracks: u64,
    /// Backtracks that skipped over at least one placement to reach a crossing slot.
    pub backjumps: u64,
    pub best_done: usize,
    pub duration: Duration,
}

/// Why a fill stopped short of completing every slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Backtracking ran out of alternatives.
    Exhausted,
    AttemptLimitReached,
    TargetReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    Complete,
    Partial(StopReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillOutcome {
    /// The letters to write back onto the caller's grid, as `(x, y, letter)` in row-major order.
    pub diff: Vec<(usize, usize, char)>,
    pub status: FillStatus,
    pub done_slots: usize,
    pub total_slots: usize,
    pub statistics: Statistics,
}

impl FillOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == FillStatus::Complete
    }
}

/// A struct tracking the live state of a single slot during filling.
#[derive(Debug, Clone, Default)]
struct Slot {
    /// Matches for the slot's current pattern.
    count: usize,
    done: bool,
    /// How many acceptable candidates to skip the next time this slot is searched.
    offset: usize,
}

/// What happened when searching one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Placed,
    Stuck,
    OutOfAttempts,
}

/// The state of one fill call.
struct Filler<'a> {
    grid: Grid,
    table: SlotTable<'a>,
    slots: Vec<Slot>,
    /// Slots in the order they were placed.
    trail: Vec<SlotId>,
    /// A slot that backtracking has just rewound, to be searched again before anything else.
    pending: Option<SlotId>,
    /// Set when the last slot to get stuck may have been blocked by placements that don't
    /// constrain it: it was a rewound slot, or the duplicate filter turned a candidate away.
    /// Backtracking then steps back one placement instead of jumping.
    step_back: bool,
    analyzer: Analyzer,
    ranker: Box<dyn CandidateRanker>,
    options: FillOptions,
    statistics: Statistics,
    best_done: usize,
    best_fill: Vec<(usize, usize, char)>,
    start: Instant,
}

impl<'a> Filler<'a> {
    fn new(grid: Grid, table: SlotTable<'a>, options: FillOptions) -> Filler<'a> {
        let mut filler = Filler {
            slots: vec![Slot::default(); table.len()],
            grid,
            table,
            trail: vec![],
            pending: None,
            step_back: false,
            analyzer: Analyzer::new(),
            ranker: ranker_for(options.ranking),
            options,
            statistics: Statistics::default(),
            best_done: 0,
            best_fill: vec![],
            start: Instant::now(),
        };

        // Slots that arrive already complete, with a real word, count as done before we begin.
        for slot_id in 0..filler.slots.len() {
            let count = filler.live_count(slot_id);
            let complete = filler.table.read_pattern(&filler.grid, slot_id).is_complete();
            filler.slots[slot_id].count = count;
            filler.slots[slot_id].done = complete && count > 0;
        }

        filler.best_done = filler.done_count();
        filler.best_fill = filler.grid.snapshot_fill();
        filler.statistics.best_done = filler.best_done;
        filler
    }

    /// Count matches for a slot's pattern as it currently stands in the grid.
    fn live_count(&mut self, slot_id: SlotId) -> usize {
        let pattern = self.table.read_pattern(&self.grid, slot_id);
        self.analyzer.count_matches(self.table.config(slot_id).source, self.table.words_for(slot_id), &pattern)
    }

    fn done_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.done).count()
    }

    fn run(&mut self) -> FillStatus {
        loop {
            let done = self.done_count();
            if done == self.slots.len() {
                return FillStatus::Complete;
            }
            if self.options.target_done_count.map(|target| done >= target).unwrap_or(false) {
                return FillStatus::Partial(StopReason::TargetReached);
            }
            if self.statistics.attempts >= self.options.attempt_budget as u64 {
                return FillStatus::Partial(StopReason::AttemptLimitReached);
            }

            let slot_id = match self.select_slot() {
                Some(slot_id) => slot_id,
                None => return FillStatus::Partial(StopReason::Exhausted),
            };

            match self.try_slot(slot_id) {
                Attempt::Placed => {}
                Attempt::OutOfAttempts => return FillStatus::Partial(StopReason::AttemptLimitReached),
                Attempt::Stuck => {
                    if !self.backtrack(slot_id) {
                        return FillStatus::Partial(StopReason::Exhausted);
                    }
                }
            }
        }
    }

    fn first_undone(&self) -> Option<SlotId> {
        (0..self.slots.len()).find(|&slot_id| !self.slots[slot_id].done)
    }

    fn most_constrained<I: Iterator<Item=SlotId>>(&self, slot_ids: I) -> Option<SlotId> {
        slot_ids
            .filter(|&slot_id| !self.slots[slot_id].done)
            .min_by_key(|&slot_id| self.slots[slot_id].count)
    }

    /// Choose the next slot to search, or `None` if every slot is done.
    fn select_slot(&mut self) -> Option<SlotId> {
        if let Some(slot_id) = self.pending.take() {
            if !self.slots[slot_id].done {
                return Some(slot_id);
            }
        }

        if self.trail.is_empty() {
            return match self.options.start {
                StartPolicy::Origin => self.first_undone(),
                StartPolicy::Selection(slot_id) if !self.slots[slot_id].done => Some(slot_id),
                StartPolicy::Selection(_) => self.first_undone(),
                StartPolicy::Auto => self.most_constrained(0..self.slots.len()),
            };
        }

        match self.options.selection {
            SelectionPolicy::FromOrigin => self.first_undone(),
            SelectionPolicy::MostConstrained => self.most_constrained(0..self.slots.len()),
            SelectionPolicy::ConnectedToFrontier => {
                self.trail.iter().rev().find_map(|&placed_id| {
                    let crossing_ids = self.table.config(placed_id).crossings.iter()
                        .flatten()
                        .map(|crossing| crossing.other_slot_id);
                    self.most_constrained(crossing_ids)
                }).or_else(|| self.most_constrained(0..self.slots.len()))
            }
        }
    }

    /// What each crossing slot will accept at the cell it shares with `slot_id`.
    fn cross_section(&mut self, slot_id: SlotId) -> CrossSection {
        let config = self.table.config(slot_id);
        let mut cells: SmallVec<[CrossCell; MAX_SLOT_LENGTH]> = SmallVec::with_capacity(config.length);

        for crossing in &config.crossings {
            let cell = match crossing {
                None => CrossCell::Open,
                Some(crossing) => {
                    let other = self.table.config(crossing.other_slot_id);
                    let pattern = self.grid.read_pattern(other.start_cell, other.direction, other.length);
                    if pattern.is_complete() {
                        CrossCell::Concrete
                    } else {
                        let admissible = self.analyzer.admissible_chars_at(
                            other.source,
                            self.table.words_for(other.id),
                            &pattern,
                            crossing.other_slot_cell,
                        );
                        CrossCell::Constrained(admissible.clone())
                    }
                }
            };
            cells.push(cell);
        }

        CrossSection::new(cells)
    }

    fn used_words(&self) -> UsedWords {
        let mut used = UsedWords::new();
        for (slot_id, slot) in self.slots.iter().enumerate() {
            if slot.done {
                used.insert(self.table.read_pattern(&self.grid, slot_id).to_string());
            }
        }
        used
    }

    /// Search for a word for this slot starting at its current offset, and place the first one
    /// that leaves every crossing slot with at least one match.
    fn try_slot(&mut self, slot_id: SlotId) -> Attempt {
        let pattern = self.table.read_pattern(&self.grid, slot_id);
        let cross = self.cross_section(slot_id);
        let used = if self.options.forbid_duplicates { Some(self.used_words()) } else { None };
        let rewound = self.slots[slot_id].offset > 0;

        loop {
            if self.statistics.attempts >= self.options.attempt_budget as u64 {
                return Attempt::OutOfAttempts;
            }
            self.statistics.attempts += 1;

            if cross.is_dead() {
                trace!("slot {} has a crossing that admits nothing", slot_id);
                self.step_back = rewound;
                return Attempt::Stuck;
            }

            let offset = self.slots[slot_id].offset;
            let candidate = select_candidate(
                self.ranker.as_ref(),
                self.table.words_for(slot_id).matches(&pattern),
                &cross,
                used.as_ref(),
                offset,
            ).map(|entry| entry.word.clone());

            let word = match candidate {
                Some(word) => word,
                None => {
                    trace!("slot {} has no candidates for {} past offset {}", slot_id, pattern, offset);
                    let blocked_by_duplicates = used.as_ref().map(|used| {
                        self.table.words_for(slot_id).matches(&pattern).any(|entry| {
                            !used.allows(&entry.word) && validate_candidate(entry.word.as_bytes(), &cross)
                        })
                    }).unwrap_or(false);
                    self.step_back = rewound || blocked_by_duplicates;
                    return Attempt::Stuck;
                }
            };

            trace!("trying {:?} in slot {} at offset {}", word, slot_id, offset);
            if self.place_if_viable(slot_id, word.as_bytes()) {
                self.commit(slot_id);
                return Attempt::Placed;
            }

            self.slots[slot_id].offset += 1;
            self.statistics.retries += 1;
        }
    }

    /// Write a word into the grid and check every crossing slot still has a match. If one
    /// doesn't, the letters we wrote are removed again.
    fn place_if_viable(&mut self, slot_id: SlotId, word: &[u8]) -> bool {
        let config = self.table.config(slot_id);
        let coords: SmallVec<[GridCoord; MAX_SLOT_LENGTH]> = config.cell_coords().collect();
        let crossing_ids: SmallVec<[SlotId; MAX_SLOT_LENGTH]> = config.crossings.iter()
            .flatten()
            .map(|crossing| crossing.other_slot_id)
            .collect();

        let mut written: SmallVec<[GridCoord; MAX_SLOT_LENGTH]> = SmallVec::new();
        for (&coord, &letter) in coords.iter().zip(word) {
            if self.grid.letter(coord).is_none() {
                self.grid.place(coord, letter);
                written.push(coord);
            }
        }

        let viable = crossing_ids.iter().all(|&other_id| self.live_count(other_id) > 0);
        if !viable {
            for coord in written {
                self.grid.clear(coord);
            }
        }
        viable
    }

    /// Finish placing a word that `place_if_viable` accepted.
    fn commit(&mut self, slot_id: SlotId) {
        let crossing_ids: SmallVec<[SlotId; MAX_SLOT_LENGTH]> = self.table.config(slot_id).crossings.iter()
            .flatten()
            .map(|crossing| crossing.other_slot_id)
            .collect();

        for other_id in crossing_ids {
            self.slots[other_id].count = self.live_count(other_id);
        }
        self.slots[slot_id].count = self.live_count(slot_id);
        self.slots[slot_id].done = true;
        self.trail.push(slot_id);
        self.statistics.placements += 1;

        let done = self.done_count();
        if done > self.best_done {
            debug!("new best fill with {} of {} slots", done, self.slots.len());
            self.best_done = done;
            self.best_fill = self.grid.snapshot_fill();
            self.statistics.best_done = done;
        }
    }

    /// Undo placements until some earlier slot can try its next candidate. Returns `false` if
    /// there's nothing left to undo.
    fn backtrack(&mut self, stuck_slot_id: SlotId) -> bool {
        self.slots[stuck_slot_id].offset = 0;

        if self.trail.is_empty() {
            return false;
        }
        self.statistics.backtracks += 1;

        let last = self.trail.len() - 1;
        let mut position = match self.options.backtrack {
            BacktrackPolicy::NearestIntersection if !self.step_back => self.trail.iter()
                .rposition(|&placed_id| self.constrains(placed_id, stuck_slot_id))
                .unwrap_or(last),
            _ => last,
        };
        if position < last {
            self.statistics.backjumps += 1;
        }

        loop {
            let anchor = self.trail[position];
            let next_offset = self.slots[anchor].offset + 1;
            self.clear_trail_from(position);

            if next_offset < self.slots[anchor].count {
                debug!(
                    "backtracked from slot {} to slot {} at offset {} ({} placements remain)",
                    stuck_slot_id, anchor, next_offset, self.trail.len(),
                );
                self.slots[anchor].offset = next_offset;
                self.pending = Some(anchor);
                return true;
            }

            if position == 0 {
                debug!("backtracking from slot {} exhausted every alternative", stuck_slot_id);
                return false;
            }
            position -= 1;
        }
    }

    /// Whether a placement can change which candidates `slot_id` accepts: it crosses the slot,
    /// or crosses one of the slot's crossings.
    fn constrains(&self, placed_id: SlotId, slot_id: SlotId) -> bool {
        self.table.intersects(slot_id, placed_id) || self.table.config(slot_id).crossings.iter()
            .flatten()
            .any(|crossing| self.table.intersects(crossing.other_slot_id, placed_id))
    }

    /// Clear every placement from `position` to the end of the trail. Cells still needed by a
    /// done slot keep their letters.
    fn clear_trail_from(&mut self, position: usize) {
        let cleared: Vec<SlotId> = self.trail.drain(position..).collect();

        for &slot_id in &cleared {
            self.slots[slot_id].done = false;
            self.slots[slot_id].offset = 0;
        }

        let mut touched = BitSet::with_capacity(self.slots.len());
        for &slot_id in &cleared {
            touched.insert(slot_id);

            let config = self.table.config(slot_id);
            for (coord, crossing) in config.cell_coords().zip(&config.crossings) {
                match crossing {
                    Some(crossing) => {
                        touched.insert(crossing.other_slot_id);
                        if !self.slots[crossing.other_slot_id].done {
                            self.grid.clear(coord);
                        }
                    }
                    None => self.grid.clear(coord),
                }
            }
        }

        for slot_id in touched.iter() {
            self.slots[slot_id].count = self.live_count(slot_id);
        }
    }

    fn finish(self, status: FillStatus) -> FillOutcome {
        let mut statistics = self.statistics;
        statistics.duration = self.start.elapsed();

        let (diff, done_slots) = match status {
            FillStatus::Complete => (self.grid.snapshot_fill(), self.slots.len()),
            FillStatus::Partial(_) => (self.best_fill, self.best_done),
        };

        debug!("fill finished: {:?}, {} of {} slots, {:?}", status, done_slots, self.slots.len(), statistics);

        FillOutcome { diff, status, done_slots, total_slots: self.slots.len(), statistics }
    }
}

/// Fill the slots of a grid from a word list. When `slots` is `None`, they're derived from the
/// grid. Malformed input is an error; running out of words or attempts is not, and yields the
/// best partial fill found along with a `Partial` status.
pub fn fill(
    store: &WordIndexStore,
    list_id: ListId,
    grid: &GridInput,
    slots: Option<&[SlotSpec]>,
    options: &FillOptions,
) -> Result<FillOutcome> {
    let grid = Grid::load(grid)?;

    let derived;
    let specs = match slots {
        Some(slots) => slots,
        None => {
            derived = grid.derive_slots();
            &derived[..]
        }
    };

    let table = SlotTable::build(&grid, specs, store, list_id)?;
    if let StartPolicy::Selection(slot_id) = options.start {
        if slot_id >= table.len() {
            return Err(Error::UnknownSlot(slot_id));
        }
    }

    debug!("filling {} slots in a {}x{} grid", table.len(), grid.width(), grid.height());

    let mut filler = Filler::new(grid, table, options.clone());
    let status = filler.run();
    Ok(filler.finish(status))
}
