use std::collections::HashMap;

use smallvec::SmallVec;

use crate::analyzer::{admissible_chars_at, validate_candidate, Admissible, CrossCell, CrossSection};
use crate::word_index::WordIndexStore;
use crate::{Error, ListId, Pattern, Result, MAX_SLOT_LENGTH, MAX_WORD_LENGTH};

/// The slot crossing one position of the searched word: its current pattern, and where in it the
/// shared cell sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossConstraint {
    pub offset: usize,
    pub pattern: Pattern,
}

impl CrossConstraint {
    pub fn new(offset: usize, pattern: Pattern) -> CrossConstraint {
        CrossConstraint { offset, pattern }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub word: String,
    pub score: i32,
    /// Whether every crossing slot could still be completed with this word in place.
    pub is_cross_consistent: bool,
}

/// Find every word of `length` matching `pattern` in the given word lists, flagging the ones that
/// keep their crossing slots fillable. `cross` has one entry per position of the word, `None`
/// where nothing crosses. Nothing is placed; the store is only read.
pub fn search(
    store: &WordIndexStore,
    length: usize,
    pattern: &Pattern,
    cross: Option<&[Option<CrossConstraint>]>,
    list_ids: &[ListId],
) -> Result<Vec<SearchHit>> {
    if length == 0 || length >= MAX_WORD_LENGTH {
        return Ok(vec![]);
    }
    if pattern.len() != length {
        return Err(Error::PatternLengthMismatch { expected: length, actual: pattern.len() });
    }

    let section = match cross {
        Some(cross) => cross_section(store, length, cross, list_ids)?,
        None => CrossSection::open(length),
    };

    let mut hits = vec![];
    for &list_id in list_ids {
        let index = store.index(list_id, length)?;
        hits.extend(index.matches(pattern).map(|entry| SearchHit {
            word: entry.word.clone(),
            score: entry.score,
            is_cross_consistent: validate_candidate(entry.word.as_bytes(), &section),
        }));
    }

    if list_ids.len() > 1 {
        hits.sort_by(|a, b| a.word.cmp(&b.word));
    }

    Ok(hits)
}

/// Combine the crossing constraints into a cross section, pooling admissible letters over every
/// list. Crossings with identical patterns and offsets are only analyzed once.
fn cross_section(
    store: &WordIndexStore,
    length: usize,
    cross: &[Option<CrossConstraint>],
    list_ids: &[ListId],
) -> Result<CrossSection> {
    if cross.len() != length {
        return Err(Error::CrossConstraintArity { expected: length, actual: cross.len() });
    }

    let mut memo: HashMap<(&Pattern, usize), Admissible> = HashMap::new();
    let mut cells: SmallVec<[CrossCell; MAX_SLOT_LENGTH]> = SmallVec::with_capacity(length);

    for (position, constraint) in cross.iter().enumerate() {
        let constraint = match constraint {
            Some(constraint) => constraint,
            None => {
                cells.push(CrossCell::Open);
                continue;
            }
        };

        let cross_length = constraint.pattern.len();
        if constraint.offset >= cross_length {
            return Err(Error::ConstraintOutOfRange {
                slot: position,
                offset: constraint.offset,
                length: cross_length,
            });
        }

        if constraint.pattern.is_complete() {
            cells.push(CrossCell::Concrete);
            continue;
        }

        let key = (&constraint.pattern, constraint.offset);
        let admissible = match memo.get(&key) {
            Some(admissible) => admissible.clone(),
            None => {
                let mut admissible = Admissible::default();
                if cross_length < MAX_WORD_LENGTH {
                    for &list_id in list_ids {
                        let index = store.index(list_id, cross_length)?;
                        admissible.merge(&admissible_chars_at(index, &constraint.pattern, constraint.offset));
                    }
                }
                memo.insert(key, admissible.clone());
                admissible
            }
        };
        cells.push(CrossCell::Constrained(admissible));
    }

    Ok(CrossSection::new(cells))
}

#[cfg(test)]
mod tests {
    use crate::search::{search, CrossConstraint, SearchHit};
    use crate::word_index::WordIndexStore;
    use crate::{Error, Pattern};

    fn store() -> WordIndexStore {
        let mut store = WordIndexStore::new();
        store.preprocess(0, &[
            ("cat".to_string(), 10),
            ("car".to_string(), 5),
            ("cop".to_string(), 1),
            ("tea".to_string(), 2),
            ("rat".to_string(), 3),
        ]);
        store.preprocess(1, &[("cab".to_string(), 4), ("ale".to_string(), 7)]);
        store
    }

    fn pattern(text: &str) -> Pattern {
        Pattern::parse(text).unwrap()
    }

    fn hit(word: &str, score: i32, is_cross_consistent: bool) -> SearchHit {
        SearchHit { word: word.to_string(), score, is_cross_consistent }
    }

    #[test]
    fn test_search_sees_updated_scores() {
        let mut store = store();
        assert_eq!(store.update_score(0, 3, "cat", 99), Ok(true));

        let hits = search(&store, 3, &pattern("..."), None, &[0]).unwrap();
        assert!(hits.contains(&hit("cat", 99, true)));
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn test_search_flags_cross_consistency() {
        let store = store();
        // The last letter starts a three letter word going down.
        let cross = vec![None, None, Some(CrossConstraint::new(0, pattern("...")))];

        let hits = search(&store, 3, &pattern("c.."), Some(&cross[..]), &[0]).unwrap();
        assert_eq!(hits, vec![
            hit("car", 5, true),
            hit("cat", 10, true),
            hit("cop", 1, false),
        ]);

        // A complete crossing accepts anything for now.
        let cross = vec![None, None, Some(CrossConstraint::new(0, pattern("tea")))];
        let hits = search(&store, 3, &pattern("c.."), Some(&cross[..]), &[0]).unwrap();
        assert!(hits.iter().all(|hit| hit.is_cross_consistent));
    }

    #[test]
    fn test_search_across_lists_sorts_by_word() {
        let store = store();

        let words: Vec<String> = search(&store, 3, &pattern("..."), None, &[0, 1]).unwrap()
            .into_iter()
            .map(|hit| hit.word)
            .collect();
        assert_eq!(words, vec!["ale", "cab", "car", "cat", "cop", "rat", "tea"]);

        // Letters admitted by either list count.
        let cross = vec![Some(CrossConstraint::new(0, pattern("..."))), None, None];
        let hits = search(&store, 3, &pattern("..."), Some(&cross[..]), &[0, 1]).unwrap();
        assert!(hits.iter().all(|hit| hit.is_cross_consistent));
    }

    #[test]
    fn test_search_edge_cases() {
        let store = store();

        assert_eq!(search(&store, 0, &pattern(""), None, &[0]), Ok(vec![]));
        assert_eq!(
            search(&store, 3, &pattern("...."), None, &[0]),
            Err(Error::PatternLengthMismatch { expected: 3, actual: 4 })
        );
        assert_eq!(
            search(&store, 3, &pattern("..."), Some(&[None][..]), &[0]),
            Err(Error::CrossConstraintArity { expected: 3, actual: 1 })
        );
        assert_eq!(
            search(&store, 3, &pattern("..."), Some(&[None, Some(CrossConstraint::new(3, pattern("..."))), None][..]), &[0]),
            Err(Error::ConstraintOutOfRange { slot: 1, offset: 3, length: 3 })
        );
        assert_eq!(search(&store, 3, &pattern("..."), None, &[4]), Err(Error::UnknownWordList(4)));
        assert_eq!(search(&store, 3, &pattern("xyz"), None, &[0]), Ok(vec![]));
    }
}
