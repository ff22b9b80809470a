use crate::settings::MINIMUM_WORD_TABLE_CAPACITY;
use rustc_hash::FxHashMap;

/// A dense key for an interned identifier. Comparing two words is a single
/// integer comparison once both have been interned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WordId(u32);

impl WordId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for WordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WordId({})", self.0)
    }
}

/// Process-lifetime identifier interning table.
///
/// Dual mapping: a Vec<Box<str>> for O(1) key to text resolution, and an
/// FxHashMap for O(1) text to key lookup while interning. Keys are dense and
/// stable for the lifetime of one compilation.
#[derive(Debug, Default)]
pub struct WordTable {
    words: Vec<Box<str>>,
    word_to_key: FxHashMap<&'static str, WordId>,
}

impl WordTable {
    pub fn new() -> Self {
        Self {
            words: Vec::with_capacity(MINIMUM_WORD_TABLE_CAPACITY),
            word_to_key: FxHashMap::default(),
        }
    }

    /// Interns a word, returning its key. Idempotent: the same text always
    /// maps to the same key.
    #[inline]
    pub fn intern(&mut self, word: &str) -> WordId {
        if let Some(&existing) = self.word_to_key.get(word) {
            return existing;
        }
        self.intern_new(word)
    }

    #[cold]
    #[inline(never)]
    fn intern_new(&mut self, word: &str) -> WordId {
        let new_key = WordId(self.words.len() as u32);
        let boxed: Box<str> = word.into();

        // SAFETY: the table owns the Box<str> for the whole compilation,
        // never removes entries, and the boxed text has a stable heap
        // address, so handing the map a 'static borrow of it is sound.
        let static_ref: &'static str =
            unsafe { std::mem::transmute::<&str, &'static str>(boxed.as_ref()) };

        self.word_to_key.insert(static_ref, new_key);
        self.words.push(boxed);

        new_key
    }

    /// Resolves a key back to its text. Total for keys this table produced.
    #[inline]
    pub fn resolve(&self, key: WordId) -> &str {
        self.words[key.0 as usize].as_ref()
    }

    /// Looks a word up without interning it.
    #[inline]
    pub fn get_existing(&self, word: &str) -> Option<WordId> {
        self.word_to_key.get(word).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut words = WordTable::new();
        let a = words.intern("counter");
        let b = words.intern("counter");
        assert_eq!(a, b);
        assert_eq!(words.resolve(a), "counter");
    }

    #[test]
    fn keys_are_dense() {
        let mut words = WordTable::new();
        let first = words.intern("a");
        let second = words.intern("b");
        assert_eq!(first.as_u32() + 1, second.as_u32());
    }

    #[test]
    fn distinct_words_get_distinct_keys() {
        let mut words = WordTable::new();
        let a = words.intern("value");
        let b = words.intern("values");
        assert_ne!(a, b);
        assert_eq!(words.resolve(b), "values");
    }
}
