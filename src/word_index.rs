use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use log::{debug, trace, warn};
use smallvec::{smallvec, SmallVec};

use crate::word_list::normalize_word;
use crate::{Error, ListId, Pattern, Result, MAX_WORD_LENGTH, WILDCARD};

/// An identifier for a stored entry, based on its index in the owning `WordIndex`'s `entries`.
pub type EntryId = usize;

/// Index of a node in a `WordIndex`'s node arena.
type NodeId = usize;

/// The split character of the node that terminates a word.
const END_OF_WORD: u8 = 0;

/// A word and its score as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub word: String,
    pub score: i32,
}

/// A node in the ternary search tree. Nodes whose `split` is `END_OF_WORD` carry the entries for
/// the word spelled by the path leading to them; several entries can share one spelling.
#[derive(Debug, Clone)]
struct Node {
    split: u8,
    lo: Option<NodeId>,
    eq: Option<NodeId>,
    hi: Option<NodeId>,
    entries: SmallVec<[EntryId; 1]>,
}

/// Where a freshly allocated node gets attached during insertion.
#[derive(Debug, Clone, Copy)]
enum Link {
    Root,
    Lo(NodeId),
    Eq(NodeId),
    Hi(NodeId),
}

/// A pattern-matching index over words of one fixed length, stored as an arena-allocated
/// ternary search tree.
#[derive(Clone)]
pub struct WordIndex {
    length: usize,
    nodes: Vec<Node>,
    entries: Vec<Entry>,
}

impl Debug for WordIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordIndex")
            .field("length", &self.length)
            .field("nodes", &self.nodes.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl WordIndex {
    pub fn new(length: usize) -> WordIndex {
        WordIndex { length, nodes: vec![], entries: vec![] }
    }

    /// Build an index for `length` from the given words, skipping any that don't normalize to
    /// exactly that length. Returns the index and the number of skipped words.
    pub fn build<'a, I>(length: usize, words: I) -> (WordIndex, usize)
        where
            I: IntoIterator<Item=(&'a str, i32)>
    {
        let mut index = WordIndex::new(length);
        let mut rejected = 0;

        for (word, score) in words {
            match normalize_word(word) {
                Some(word) if word.len() == length => {
                    index.insert_normalized(word, score);
                }
                _ => {
                    trace!("rejecting {:?} for length {}", word, length);
                    rejected += 1;
                }
            }
        }

        (index, rejected)
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// How many entries are stored, counting duplicate spellings separately.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, entry_id: EntryId) -> &Entry {
        &self.entries[entry_id]
    }

    /// Add one more entry. Existing entries keep their ids and relative order.
    pub fn insert(&mut self, word: &str, score: i32) -> Result<EntryId> {
        let normalized = normalize_word(word).ok_or_else(|| Error::InvalidWord(word.to_string()))?;
        if normalized.len() != self.length {
            return Err(Error::WordLengthMismatch { word: word.to_string(), length: self.length });
        }

        Ok(self.insert_normalized(normalized, score))
    }

    fn insert_normalized(&mut self, word: String, score: i32) -> EntryId {
        let entry_id = self.entries.len();
        let key: SmallVec<[u8; 32]> = word.bytes().collect();
        self.entries.push(Entry { word, score });

        let mut current = if self.nodes.is_empty() { None } else { Some(0) };
        let mut link = Link::Root;
        let mut depth = 0;

        loop {
            let c = key.get(depth).copied().unwrap_or(END_OF_WORD);

            let node_id = match current {
                Some(node_id) => node_id,
                None => self.push_node(c, link),
            };
            let split = self.nodes[node_id].split;

            if c < split {
                current = self.nodes[node_id].lo;
                link = Link::Lo(node_id);
            } else if c > split {
                current = self.nodes[node_id].hi;
                link = Link::Hi(node_id);
            } else if c == END_OF_WORD {
                self.nodes[node_id].entries.push(entry_id);
                return entry_id;
            } else {
                current = self.nodes[node_id].eq;
                link = Link::Eq(node_id);
                depth += 1;
            }
        }
    }

    fn push_node(&mut self, split: u8, link: Link) -> NodeId {
        let node_id = self.nodes.len();
        self.nodes.push(Node { split, lo: None, eq: None, hi: None, entries: smallvec![] });

        match link {
            Link::Root => {}
            Link::Lo(parent) => self.nodes[parent].lo = Some(node_id),
            Link::Eq(parent) => self.nodes[parent].eq = Some(node_id),
            Link::Hi(parent) => self.nodes[parent].hi = Some(node_id),
        }

        node_id
    }

    /// Find the end-of-word node for an exact (already normalized) spelling.
    fn find_exact(&self, word: &[u8]) -> Option<NodeId> {
        let mut current = if self.nodes.is_empty() { None } else { Some(0) };
        let mut depth = 0;

        while let Some(node_id) = current {
            let node = &self.nodes[node_id];
            let c = word.get(depth).copied().unwrap_or(END_OF_WORD);

            if c < node.split {
                current = node.lo;
            } else if c > node.split {
                current = node.hi;
            } else if c == END_OF_WORD {
                return Some(node_id);
            } else {
                current = node.eq;
                depth += 1;
            }
        }

        None
    }

    /// Overwrite the score of every stored copy of `word`. Returns whether anything was found.
    pub fn update_score(&mut self, word: &str, score: i32) -> bool {
        let Some(normalized) = normalize_word(word) else {
            return false;
        };
        let Some(node_id) = self.find_exact(normalized.as_bytes()) else {
            return false;
        };

        for &entry_id in &self.nodes[node_id].entries {
            self.entries[entry_id].score = score;
        }

        true
    }

    /// Lazily produce every entry matching `pattern`, in key order (duplicates in insertion
    /// order). A pattern of the wrong length matches nothing.
    pub fn matches(&self, pattern: &Pattern) -> Matches<'_> {
        let mut stack = vec![];
        if pattern.len() == self.length && !self.nodes.is_empty() {
            stack.push(Frame::Visit(0, 0));
        }

        Matches { index: self, pattern: pattern.clone(), stack, emitting: None }
    }

    /// The number of entries matching `pattern`.
    pub fn count_matches(&self, pattern: &Pattern) -> usize {
        self.matches(pattern).count()
    }

    pub fn has_matches(&self, pattern: &Pattern) -> bool {
        self.matches(pattern).next().is_some()
    }

    /// The `n`th (zero-based) match for `pattern`, if there are that many.
    pub fn nth_match(&self, pattern: &Pattern, n: usize) -> Option<&Entry> {
        self.matches(pattern).nth(n)
    }
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    /// Visit a node while matching the pattern position `depth`.
    Visit(NodeId, usize),
    /// Yield the entries of an end-of-word node.
    Emit(NodeId),
}

/// Iterator over the entries of a `WordIndex` matching a pattern. Traversal uses an explicit
/// stack in the same order as the recursive walk: low branch, equal branch, the node's own
/// entries, then high branch.
pub struct Matches<'a> {
    index: &'a WordIndex,
    pattern: Pattern,
    stack: Vec<Frame>,
    emitting: Option<(NodeId, usize)>,
}

impl<'a> Iterator for Matches<'a> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<&'a Entry> {
        let index = self.index;

        loop {
            if let Some((node_id, next)) = self.emitting {
                let entries = &index.nodes[node_id].entries;
                if next < entries.len() {
                    self.emitting = Some((node_id, next + 1));
                    return Some(&index.entries[entries[next]]);
                }
                self.emitting = None;
            }

            match self.stack.pop()? {
                Frame::Emit(node_id) => self.emitting = Some((node_id, 0)),
                Frame::Visit(node_id, depth) => {
                    let node = &index.nodes[node_id];
                    let c = self.pattern.as_bytes().get(depth).copied().unwrap_or(END_OF_WORD);
                    let wildcard = c == WILDCARD;

                    // Pushed in reverse of the order they should be visited.
                    if let Some(hi) = node.hi {
                        if wildcard || c > node.split {
                            self.stack.push(Frame::Visit(hi, depth));
                        }
                    }
                    if c == END_OF_WORD && node.split == END_OF_WORD {
                        self.stack.push(Frame::Emit(node_id));
                    }
                    if let Some(eq) = node.eq {
                        if (wildcard || c == node.split) && c != END_OF_WORD && node.split != END_OF_WORD {
                            self.stack.push(Frame::Visit(eq, depth + 1));
                        }
                    }
                    if let Some(lo) = node.lo {
                        if wildcard || c < node.split {
                            self.stack.push(Frame::Visit(lo, depth));
                        }
                    }
                }
            }
        }
    }
}

/// The outcome of indexing one word list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildReport {
    pub indexed: usize,
    pub rejected: usize,
}

/// Owns every loaded word list, each as one `WordIndex` per word length.
#[derive(Debug, Default)]
pub struct WordIndexStore {
    lists: HashMap<ListId, Vec<WordIndex>>,
}

impl WordIndexStore {
    pub fn new() -> WordIndexStore {
        WordIndexStore { lists: HashMap::new() }
    }

    /// Index a word list under `list_id`, replacing any list already loaded there. Malformed
    /// words are skipped and counted; they never abort the build. The new indices are built on
    /// the side, so the store only changes once the build is complete.
    pub fn preprocess(&mut self, list_id: ListId, words: &[(String, i32)]) -> BuildReport {
        let mut buckets: Vec<Vec<(&str, i32)>> = (0..MAX_WORD_LENGTH).map(|_| vec![]).collect();
        let mut report = BuildReport::default();

        for (word, score) in words {
            let length = word.trim().len();
            if length == 0 || length >= MAX_WORD_LENGTH {
                trace!("rejecting {:?}: unsupported length {}", word, length);
                report.rejected += 1;
                continue;
            }
            buckets[length].push((word.as_str(), *score));
        }

        let indices: Vec<WordIndex> = buckets.into_iter().enumerate().map(|(length, bucket)| {
            let (index, rejected) = WordIndex::build(length, bucket);
            report.indexed += index.len();
            report.rejected += rejected;
            index
        }).collect();

        if report.rejected > 0 {
            warn!("word list {}: rejected {} malformed words", list_id, report.rejected);
        }
        debug!("word list {}: indexed {} words", list_id, report.indexed);

        self.lists.insert(list_id, indices);
        report
    }

    /// Release every loaded list.
    pub fn postprocess(&mut self) {
        self.lists.clear();
    }

    /// Release one list. Returns whether it was loaded.
    pub fn remove_list(&mut self, list_id: ListId) -> bool {
        self.lists.remove(&list_id).is_some()
    }

    pub fn contains_list(&self, list_id: ListId) -> bool {
        self.lists.contains_key(&list_id)
    }

    /// The index for one list and word length.
    pub fn index(&self, list_id: ListId, length: usize) -> Result<&WordIndex> {
        let indices = self.lists.get(&list_id).ok_or(Error::UnknownWordList(list_id))?;
        indices.get(length).ok_or(Error::UnsupportedLength(length))
    }

    fn index_mut(&mut self, list_id: ListId, length: usize) -> Result<&mut WordIndex> {
        let indices = self.lists.get_mut(&list_id).ok_or(Error::UnknownWordList(list_id))?;
        indices.get_mut(length).ok_or(Error::UnsupportedLength(length))
    }

    pub fn insert_word(&mut self, list_id: ListId, length: usize, word: &str, score: i32) -> Result<()> {
        self.index_mut(list_id, length)?.insert(word, score).map(|_| ())
    }

    /// Overwrite the score of a stored word. Absent words (or lengths) are a no-op, not an
    /// error; only an unknown list id is.
    pub fn update_score(&mut self, list_id: ListId, length: usize, word: &str, score: i32) -> Result<bool> {
        match self.index_mut(list_id, length) {
            Ok(index) => Ok(index.update_score(word, score)),
            Err(Error::UnsupportedLength(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Every word of one list matching a glob, where `?` is any one letter and `*` is any run of
    /// letters. Results come in length order, then index order.
    pub fn find_by_glob(&self, list_id: ListId, glob: &str) -> Result<Vec<&str>> {
        let indices = self.lists.get(&list_id).ok_or(Error::UnknownWordList(list_id))?;
        let glob: Vec<u8> = glob.bytes()
            .filter(|c| c.is_ascii_alphabetic() || *c == b'?' || *c == b'*')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let fixed_length = !glob.contains(&b'*');
        let min_length = glob.iter().filter(|&&c| c != b'*').count();

        let mut result = vec![];
        for index in indices.iter().filter(|index| index.length() >= min_length) {
            if fixed_length && index.length() != min_length {
                continue;
            }
            let everything = Pattern::wildcards(index.length());
            result.extend(
                index.matches(&everything)
                    .filter(|entry| glob_matches(&glob, entry.word.as_bytes()))
                    .map(|entry| entry.word.as_str())
            );
        }

        Ok(result)
    }
}

/// Match a word against a glob of letters, `?` and `*`.
fn glob_matches(glob: &[u8], word: &[u8]) -> bool {
    let (mut g, mut w) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while w < word.len() {
        if g < glob.len() && (glob[g] == b'?' || glob[g] == word[w]) {
            g += 1;
            w += 1;
        } else if g < glob.len() && glob[g] == b'*' {
            backtrack = Some((g, w));
            g += 1;
        } else if let Some((star_g, star_w)) = backtrack {
            g = star_g + 1;
            w = star_w + 1;
            backtrack = Some((star_g, star_w + 1));
        } else {
            return false;
        }
    }

    glob[g..].iter().all(|&c| c == b'*')
}

#[cfg(test)]
mod tests {
    use crate::word_index::{glob_matches, BuildReport, WordIndex, WordIndexStore};
    use crate::{Error, Pattern};

    fn words(list: &[(&str, i32)]) -> Vec<(String, i32)> {
        list.iter().map(|&(word, score)| (word.to_string(), score)).collect()
    }

    fn matched_words(index: &WordIndex, pattern: &str) -> Vec<String> {
        index.matches(&Pattern::parse(pattern).unwrap()).map(|entry| entry.word.clone()).collect()
    }

    #[test]
    fn test_matches_agree_with_brute_force() {
        let dictionary = ["cat", "car", "cop", "cot", "dog", "dig", "ace", "act", "tab", "zoo"];
        let (index, rejected) =
            WordIndex::build(3, dictionary.iter().map(|&word| (word, 0)));
        assert_eq!(rejected, 0);

        let patterns = [
            "...", "c..", ".a.", "..t", "c.t", "ca.", "d.g", "z..", "x..", ".o.", "cat", "tac",
        ];

        for pattern_str in patterns {
            let pattern = Pattern::parse(pattern_str).unwrap();
            let mut expected: Vec<&str> = dictionary.iter().cloned()
                .filter(|word| pattern.matches(word.as_bytes()))
                .collect();
            expected.sort();

            let found = matched_words(&index, pattern_str);
            assert_eq!(found, expected, "pattern {}", pattern_str);
            assert_eq!(index.count_matches(&pattern), expected.len());
        }
    }

    #[test]
    fn test_duplicates_are_kept_in_insertion_order() {
        let mut index = WordIndex::new(3);
        index.insert("cat", 1).unwrap();
        index.insert("car", 2).unwrap();
        index.insert("Cat", 3).unwrap();

        let scores: Vec<i32> = index.matches(&Pattern::parse("cat").unwrap())
            .map(|entry| entry.score)
            .collect();
        assert_eq!(scores, vec![1, 3]);
        assert_eq!(index.len(), 3);

        assert!(index.update_score("cat", 7));
        assert!(index.matches(&Pattern::parse("cat").unwrap()).all(|entry| entry.score == 7));
        assert!(!index.update_score("cab", 7));
    }

    #[test]
    fn test_nth_match_is_deterministic() {
        let (index, _) = WordIndex::build(3, [("cop", 1), ("cat", 10), ("car", 5)]);
        let pattern = Pattern::parse("c..").unwrap();

        assert_eq!(index.nth_match(&pattern, 0).unwrap().word, "car");
        assert_eq!(index.nth_match(&pattern, 1).unwrap().word, "cat");
        assert_eq!(index.nth_match(&pattern, 2).unwrap().word, "cop");
        assert!(index.nth_match(&pattern, 3).is_none());
        assert!(index.has_matches(&pattern));
        assert!(!index.has_matches(&Pattern::parse("x..").unwrap()));
    }

    #[test]
    fn test_wrong_length_pattern_matches_nothing() {
        let (index, _) = WordIndex::build(3, [("cat", 1)]);
        assert_eq!(index.count_matches(&Pattern::parse("....").unwrap()), 0);
        assert_eq!(index.count_matches(&Pattern::parse("..").unwrap()), 0);
    }

    #[test]
    fn test_insert_rejects_bad_words() {
        let mut index = WordIndex::new(3);
        assert_eq!(index.insert("c t", 0), Err(Error::InvalidWord("c t".to_string())));
        assert_eq!(
            index.insert("cats", 0),
            Err(Error::WordLengthMismatch { word: "cats".to_string(), length: 3 })
        );
        assert!(index.is_empty());
    }

    #[test]
    fn test_store_lifecycle() {
        let mut store = WordIndexStore::new();
        let report = store.preprocess(0, &words(&[("cat", 10), ("car", 5), ("no way", 1), ("", 0)]));
        assert_eq!(report, BuildReport { indexed: 2, rejected: 2 });

        store.insert_word(0, 3, "cop", 1).unwrap();
        assert_eq!(store.index(0, 3).unwrap().len(), 3);

        assert_eq!(store.update_score(0, 3, "cat", 99), Ok(true));
        assert_eq!(store.update_score(0, 3, "dog", 99), Ok(false));
        assert_eq!(store.update_score(0, 500, "dog", 99), Ok(false));
        assert_eq!(store.update_score(1, 3, "cat", 99), Err(Error::UnknownWordList(1)));

        let cat = store.index(0, 3).unwrap().nth_match(&Pattern::parse("cat").unwrap(), 0).unwrap();
        assert_eq!(cat.score, 99);

        assert!(store.remove_list(0));
        assert!(!store.contains_list(0));

        store.preprocess(1, &words(&[("dog", 1)]));
        store.postprocess();
        store.postprocess();
        assert!(store.index(1, 3).is_err());
    }

    #[test]
    fn test_preprocess_replaces_existing_list() {
        let mut store = WordIndexStore::new();
        store.preprocess(0, &words(&[("cat", 1)]));
        store.preprocess(0, &words(&[("dog", 1)]));

        let index = store.index(0, 3).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.entry(0).word, "dog");
    }

    #[test]
    fn test_find_by_glob() {
        let mut store = WordIndexStore::new();
        store.preprocess(0, &words(&[("cat", 1), ("cart", 1), ("coat", 1), ("act", 1), ("cast", 1)]));

        assert_eq!(store.find_by_glob(0, "c?t").unwrap(), vec!["cat"]);
        assert_eq!(store.find_by_glob(0, "c*t").unwrap(), vec!["cat", "cart", "cast", "coat"]);
        assert_eq!(store.find_by_glob(0, "*a*").unwrap().len(), 5);
        assert!(store.find_by_glob(3, "*").is_err());
    }

    #[test]
    fn test_glob_matches() {
        assert!(glob_matches(b"c*t", b"cat"));
        assert!(glob_matches(b"c*t", b"ct"));
        assert!(glob_matches(b"*", b""));
        assert!(glob_matches(b"a*b*c", b"axxbyyc"));
        assert!(!glob_matches(b"a*b*c", b"axxbyy"));
        assert!(!glob_matches(b"c?t", b"ct"));
    }
}
