use std::collections::HashSet;
use std::fmt::Debug;

use crate::analyzer::{validate_candidate, CrossCell, CrossSection};
use crate::word_index::Entry;

/// How candidates for a slot are ordered before the retry offset picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingMode {
    /// Index order. Candidates are produced lazily.
    #[default]
    Plain,
    /// Highest word score first.
    Scored,
    /// Prefer words whose letters leave the crossing slots the most options, using the median
    /// over all constrained crossings.
    Nice,
}

/// Orders the candidates for one slot. Implementations must be deterministic, since retry
/// offsets index into the ordered list.
pub trait CandidateRanker: Debug {
    /// Whether this ranker needs every candidate up front. If not, candidates stay in index
    /// order and are produced lazily.
    fn reorders(&self) -> bool;

    fn sort(&self, candidates: &mut Vec<&Entry>, cross: &CrossSection);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRanker;

impl CandidateRanker for PlainRanker {
    fn reorders(&self) -> bool {
        false
    }

    fn sort(&self, _candidates: &mut Vec<&Entry>, _cross: &CrossSection) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreRanker;

impl CandidateRanker for ScoreRanker {
    fn reorders(&self) -> bool {
        true
    }

    fn sort(&self, candidates: &mut Vec<&Entry>, _cross: &CrossSection) {
        candidates.sort_by_key(|entry| -(entry.score as i64));
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NiceRanker;

impl NiceRanker {
    /// The median number of crossing matches a word keeps alive, over the constrained
    /// crossings. Words with no constrained crossings get 0.
    fn median_support(word: &[u8], cross: &CrossSection) -> usize {
        let mut support: Vec<usize> = cross.cells().iter().zip(word).filter_map(|(cell, &letter)| {
            match cell {
                CrossCell::Constrained(admissible) => Some(admissible.count_for(letter)),
                _ => None,
            }
        }).collect();

        if support.is_empty() {
            return 0;
        }
        support.sort_unstable();
        support[support.len() / 2]
    }
}

impl CandidateRanker for NiceRanker {
    fn reorders(&self) -> bool {
        true
    }

    fn sort(&self, candidates: &mut Vec<&Entry>, cross: &CrossSection) {
        candidates.sort_by_cached_key(|entry| {
            let median = NiceRanker::median_support(entry.word.as_bytes(), cross);
            (-(median as i64), -(entry.score as i64))
        });
    }
}

pub fn ranker_for(mode: RankingMode) -> Box<dyn CandidateRanker> {
    match mode {
        RankingMode::Plain => Box::new(PlainRanker),
        RankingMode::Scored => Box::new(ScoreRanker),
        RankingMode::Nice => Box::new(NiceRanker),
    }
}

/// Words already placed elsewhere in the grid, for duplicate avoidance.
#[derive(Debug, Clone, Default)]
pub struct UsedWords {
    words: HashSet<String>,
}

impl UsedWords {
    pub fn new() -> UsedWords {
        UsedWords::default()
    }

    pub fn insert(&mut self, word: String) {
        self.words.insert(word);
    }

    pub fn allows(&self, word: &str) -> bool {
        !self.words.contains(word)
    }
}

/// Pick the `offset`th acceptable candidate from `matches`: one that fits the crossings, isn't
/// already used (if `used` is given), in the order the ranker dictates.
pub fn select_candidate<'i, I>(
    ranker: &dyn CandidateRanker,
    matches: I,
    cross: &CrossSection,
    used: Option<&UsedWords>,
    offset: usize,
) -> Option<&'i Entry>
    where
        I: Iterator<Item=&'i Entry>
{
    let mut acceptable = matches.filter(|entry| {
        validate_candidate(entry.word.as_bytes(), cross)
            && used.map(|used| used.allows(&entry.word)).unwrap_or(true)
    });

    if ranker.reorders() {
        let mut candidates: Vec<&Entry> = acceptable.collect();
        ranker.sort(&mut candidates, cross);
        candidates.get(offset).copied()
    } else {
        acceptable.nth(offset)
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use crate::analyzer::{admissible_chars_at, CrossCell, CrossSection};
    use crate::ranking::{ranker_for, select_candidate, RankingMode, UsedWords};
    use crate::word_index::WordIndex;
    use crate::Pattern;

    fn index() -> WordIndex {
        WordIndex::build(3, [("cop", 1), ("cat", 10), ("car", 5)]).0
    }

    fn pick(mode: RankingMode, cross: &CrossSection, used: Option<&UsedWords>, offset: usize) -> Option<String> {
        let index = index();
        let pattern = Pattern::parse("c..").unwrap();
        select_candidate(ranker_for(mode).as_ref(), index.matches(&pattern), cross, used, offset)
            .map(|entry| entry.word.clone())
    }

    #[test]
    fn test_plain_and_scored_order() {
        let cross = CrossSection::open(3);

        assert_eq!(pick(RankingMode::Plain, &cross, None, 0), Some("car".to_string()));
        assert_eq!(pick(RankingMode::Plain, &cross, None, 2), Some("cop".to_string()));
        assert_eq!(pick(RankingMode::Plain, &cross, None, 3), None);
        assert_eq!(pick(RankingMode::Scored, &cross, None, 0), Some("cat".to_string()));
        assert_eq!(pick(RankingMode::Scored, &cross, None, 1), Some("car".to_string()));
    }

    #[test]
    fn test_nice_prefers_well_supported_letters() {
        // The crossing at position 2 can take "t" in three ways but "r" or "p" in only one.
        let crossing_words = WordIndex::build(3, [("tab", 1), ("tea", 1), ("toe", 1), ("rib", 1), ("pod", 1)]).0;
        let cross = CrossSection::new(smallvec![
            CrossCell::Open,
            CrossCell::Open,
            CrossCell::Constrained(admissible_chars_at(&crossing_words, &Pattern::parse("...").unwrap(), 0)),
        ]);

        assert_eq!(pick(RankingMode::Nice, &cross, None, 0), Some("cat".to_string()));
        // "car" and "cop" tie on support, so score breaks the tie.
        assert_eq!(pick(RankingMode::Nice, &cross, None, 1), Some("car".to_string()));
        assert_eq!(pick(RankingMode::Nice, &cross, None, 2), Some("cop".to_string()));
    }

    #[test]
    fn test_used_words_are_skipped() {
        let mut used = UsedWords::new();
        used.insert("car".to_string());

        let cross = CrossSection::open(3);
        assert_eq!(pick(RankingMode::Plain, &cross, Some(&used), 0), Some("cat".to_string()));
        assert_eq!(pick(RankingMode::Plain, &cross, None, 0), Some("car".to_string()));
    }
}
