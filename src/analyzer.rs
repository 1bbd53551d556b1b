use std::collections::HashMap;

use smallvec::SmallVec;

use crate::slot::SourceId;
use crate::word_index::WordIndex;
use crate::{Pattern, MAX_ALPHABET_SIZE, MAX_SLOT_LENGTH};

/// The letters that can appear at one offset of a slot while keeping it fillable, with how many
/// matching words put each letter there. Letters are kept in the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Admissible {
    /// Total matches for the slot's pattern.
    pub n_matches: usize,
    chars: SmallVec<[(u8, usize); 26]>,
}

impl Admissible {
    pub fn contains(&self, letter: u8) -> bool {
        self.chars.iter().any(|&(c, _)| c == letter)
    }

    /// How many matching words place `letter` at this offset.
    pub fn count_for(&self, letter: u8) -> usize {
        self.chars.iter().find(|&&(c, _)| c == letter).map(|&(_, count)| count).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn chars(&self) -> impl Iterator<Item=u8> + '_ {
        self.chars.iter().map(|&(c, _)| c)
    }

    fn add(&mut self, letter: u8, count: usize) {
        if let Some(existing) = self.chars.iter_mut().find(|(c, _)| *c == letter) {
            existing.1 += count;
        } else if self.chars.len() < MAX_ALPHABET_SIZE {
            self.chars.push((letter, count));
        }
    }

    /// Fold in the admissible set of the same slot computed against another word list.
    pub fn merge(&mut self, other: &Admissible) {
        self.n_matches += other.n_matches;
        for &(letter, count) in &other.chars {
            self.add(letter, count);
        }
    }
}

/// Total number of index entries matching `pattern`.
pub fn count_matches(index: &WordIndex, pattern: &Pattern) -> usize {
    index.count_matches(pattern)
}

/// Which letters at `offset` keep a slot with this pattern satisfiable. If the offset already
/// holds a letter, that letter is the only candidate, and it's admissible only if the pattern
/// matches anything at all.
pub fn admissible_chars_at(index: &WordIndex, pattern: &Pattern, offset: usize) -> Admissible {
    let mut result = Admissible::default();

    match pattern.get(offset) {
        Some(letter) => {
            result.n_matches = index.count_matches(pattern);
            if result.n_matches > 0 {
                result.add(letter, result.n_matches);
            }
        }
        None => {
            for entry in index.matches(pattern) {
                result.n_matches += 1;
                result.add(entry.word.as_bytes()[offset], 1);
            }
        }
    }

    result
}

/// What a crossing slot allows at the cell it shares with the slot being filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossCell {
    /// No slot crosses this cell.
    Open,
    /// The crossing slot has no empty cells; any letter is accepted for now and checked when it
    /// is actually placed.
    Concrete,
    Constrained(Admissible),
}

/// The crossing constraints for every position of a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossSection {
    cells: SmallVec<[CrossCell; MAX_SLOT_LENGTH]>,
}

impl CrossSection {
    pub fn new(cells: SmallVec<[CrossCell; MAX_SLOT_LENGTH]>) -> CrossSection {
        CrossSection { cells }
    }

    /// A cross section with no crossings at all.
    pub fn open(length: usize) -> CrossSection {
        CrossSection { cells: (0..length).map(|_| CrossCell::Open).collect() }
    }

    pub fn cells(&self) -> &[CrossCell] {
        &self.cells
    }

    /// Does some crossing slot admit no letter at all at its shared cell? If so, nothing can be
    /// placed in the slot being filled.
    pub fn is_dead(&self) -> bool {
        self.cells.iter().any(|cell| matches!(cell, CrossCell::Constrained(admissible) if admissible.is_empty()))
    }
}

/// A candidate is acceptable if, at every position whose crossing slot still has empty cells,
/// its letter is in that crossing's admissible set.
pub fn validate_candidate(word: &[u8], cross: &CrossSection) -> bool {
    word.len() == cross.cells.len()
        && cross.cells.iter().zip(word).all(|(cell, &letter)| match cell {
            CrossCell::Open | CrossCell::Concrete => true,
            CrossCell::Constrained(admissible) => admissible.contains(letter),
        })
}

/// Memoizes match counts and admissible sets for one fill call. The word sources don't change
/// during a call, so equal `(source, pattern)` queries always give equal answers.
#[derive(Debug, Default)]
pub struct Analyzer {
    counts: HashMap<(SourceId, Pattern), usize>,
    admissible: HashMap<(SourceId, Pattern, usize), Admissible>,
}

impl Analyzer {
    pub fn new() -> Analyzer {
        Analyzer::default()
    }

    pub fn count_matches(&mut self, source: SourceId, index: &WordIndex, pattern: &Pattern) -> usize {
        if let Some(&count) = self.counts.get(&(source, pattern.clone())) {
            return count;
        }

        let count = count_matches(index, pattern);
        self.counts.insert((source, pattern.clone()), count);
        count
    }

    pub fn admissible_chars_at(
        &mut self,
        source: SourceId,
        index: &WordIndex,
        pattern: &Pattern,
        offset: usize,
    ) -> &Admissible {
        self.admissible
            .entry((source, pattern.clone(), offset))
            .or_insert_with(|| admissible_chars_at(index, pattern, offset))
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use crate::analyzer::{admissible_chars_at, validate_candidate, Admissible, Analyzer, CrossCell, CrossSection};
    use crate::word_index::WordIndex;
    use crate::Pattern;

    fn index() -> WordIndex {
        WordIndex::build(3, [("cat", 10), ("car", 5), ("cop", 1), ("dog", 3)]).0
    }

    #[test]
    fn test_admissible_chars_at_wildcard_offset() {
        let admissible = admissible_chars_at(&index(), &Pattern::parse("c..").unwrap(), 1);

        assert_eq!(admissible.n_matches, 3);
        assert_eq!(admissible.chars().collect::<Vec<_>>(), vec![b'a', b'o']);
        assert_eq!(admissible.count_for(b'a'), 2);
        assert_eq!(admissible.count_for(b'o'), 1);
        assert_eq!(admissible.count_for(b'x'), 0);
    }

    #[test]
    fn test_admissible_chars_at_concrete_offset() {
        let admissible = admissible_chars_at(&index(), &Pattern::parse("c.t").unwrap(), 0);
        assert_eq!(admissible.chars().collect::<Vec<_>>(), vec![b'c']);
        assert_eq!(admissible.n_matches, 1);

        let dead = admissible_chars_at(&index(), &Pattern::parse("x..").unwrap(), 0);
        assert!(dead.is_empty());
        assert_eq!(dead.n_matches, 0);
    }

    #[test]
    fn test_validate_candidate() {
        let index = index();
        let cross = CrossSection::new(smallvec![
            CrossCell::Constrained(admissible_chars_at(&index, &Pattern::parse("...").unwrap(), 0)),
            CrossCell::Open,
            CrossCell::Concrete,
        ]);

        assert!(validate_candidate(b"cxx", &cross));
        assert!(validate_candidate(b"dzz", &cross));
        assert!(!validate_candidate(b"axx", &cross));
        assert!(!validate_candidate(b"cx", &cross));
        assert!(!cross.is_dead());

        let dead = CrossSection::new(smallvec![CrossCell::Constrained(Admissible::default())]);
        assert!(dead.is_dead());
        assert!(!CrossSection::open(3).is_dead());
    }

    #[test]
    fn test_analyzer_memoizes() {
        let index = index();
        let empty = WordIndex::new(3);
        let mut analyzer = Analyzer::new();
        let pattern = Pattern::parse("c..").unwrap();

        assert_eq!(analyzer.count_matches(0, &index, &pattern), 3);
        // Same key, so the cached answer comes back even though a different index is passed.
        assert_eq!(analyzer.count_matches(0, &empty, &pattern), 3);
        assert_eq!(analyzer.count_matches(1, &empty, &pattern), 0);

        assert_eq!(analyzer.admissible_chars_at(0, &index, &pattern, 2).len(), 3);
        assert_eq!(analyzer.admissible_chars_at(0, &empty, &pattern, 2).len(), 3);
    }

    #[test]
    fn test_merge_sums_counts() {
        let mut left = admissible_chars_at(&index(), &Pattern::parse("c..").unwrap(), 1);
        let other = WordIndex::build(3, [("cab", 1), ("cub", 1)]).0;
        left.merge(&admissible_chars_at(&other, &Pattern::parse("c..").unwrap(), 1));

        assert_eq!(left.n_matches, 5);
        assert_eq!(left.count_for(b'a'), 3);
        assert_eq!(left.chars().collect::<Vec<_>>(), vec![b'a', b'o', b'u']);
    }
}
