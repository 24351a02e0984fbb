//! Candidate password streams.
//!
//! A [`CandidatePlan`] describes the full ordered sequence tested by one run. It knows its
//! length up front (for ETA math) and can be iterated any number of times; the numeric space is
//! rendered on demand rather than stored.

use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::iter::FusedIterator;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Embedded list of common passwords, most common first.
const BUILTIN_WORDLIST: &str = include_str!("../data/common-passwords.txt");

/// Widest supported brute-force field (10^9 candidates).
pub const MAX_NUMERIC_WIDTH: u8 = 9;
/// Brute-force width used when none is specified (`000000`..=`999999`).
pub const DEFAULT_NUMERIC_WIDTH: u8 = 6;

/// Candidate-generation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackStrategy {
    Dictionary,
    BruteForce,
    /// Dictionary first, then the numeric space.
    Hybrid,
}

impl AttackStrategy {
    fn includes_dictionary(self) -> bool {
        matches!(self, AttackStrategy::Dictionary | AttackStrategy::Hybrid)
    }

    fn includes_numeric(self) -> bool {
        matches!(self, AttackStrategy::BruteForce | AttackStrategy::Hybrid)
    }
}

impl fmt::Display for AttackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttackStrategy::Dictionary => "dictionary",
            AttackStrategy::BruteForce => "brute-force",
            AttackStrategy::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

impl FromStr for AttackStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dictionary" | "dict" => Ok(AttackStrategy::Dictionary),
            "brute-force" | "bruteforce" | "numeric" => Ok(AttackStrategy::BruteForce),
            "hybrid" => Ok(AttackStrategy::Hybrid),
            other => Err(format!("unknown attack strategy `{other}`")),
        }
    }
}

/// An ordered dictionary of passwords. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wordlist {
    words: Arc<[String]>,
}

impl Wordlist {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }

    /// The embedded curated list.
    pub fn builtin() -> Self {
        Self::new(parse_lines(BUILTIN_WORDLIST))
    }

    /// Load a newline-separated list. Blank lines are skipped; order and duplicates are kept.
    pub fn from_reader<R: Read>(reader: R) -> std::io::Result<Self> {
        let mut words = Vec::new();
        for line in BufReader::new(reader).lines() {
            let line = line?;
            let word = line.strip_suffix('\r').unwrap_or(&line);
            if !word.is_empty() {
                words.push(word.to_string());
            }
        }
        Ok(Self::new(words))
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.words.iter().map(String::as_str)
    }
}

impl Default for Wordlist {
    fn default() -> Self {
        Self::builtin()
    }
}

fn parse_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
}

/// Every fixed-width, zero-padded decimal string of a given width, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericSpace {
    width: u8,
}

impl NumericSpace {
    /// Returns `None` unless `1 <= width <= MAX_NUMERIC_WIDTH`.
    pub fn new(width: u8) -> Option<Self> {
        (1..=MAX_NUMERIC_WIDTH)
            .contains(&width)
            .then_some(Self { width })
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn len(&self) -> u64 {
        10u64.pow(u32::from(self.width))
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, index: u64) -> Option<String> {
        (index < self.len()).then(|| self.render(index))
    }

    fn render(&self, value: u64) -> String {
        format!("{value:0width$}", width = usize::from(self.width))
    }
}

impl Default for NumericSpace {
    fn default() -> Self {
        Self {
            width: DEFAULT_NUMERIC_WIDTH,
        }
    }
}

/// The full candidate sequence for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePlan {
    strategy: AttackStrategy,
    wordlist: Wordlist,
    numeric: NumericSpace,
}

impl CandidatePlan {
    /// Plan using the built-in dictionary and the default 6-digit numeric space.
    pub fn new(strategy: AttackStrategy) -> Self {
        Self {
            strategy,
            wordlist: Wordlist::builtin(),
            numeric: NumericSpace::default(),
        }
    }

    pub fn with_wordlist(mut self, wordlist: Wordlist) -> Self {
        self.wordlist = wordlist;
        self
    }

    pub fn with_numeric_space(mut self, numeric: NumericSpace) -> Self {
        self.numeric = numeric;
        self
    }

    pub fn strategy(&self) -> AttackStrategy {
        self.strategy
    }

    fn dictionary_len(&self) -> u64 {
        if self.strategy.includes_dictionary() {
            self.wordlist.len() as u64
        } else {
            0
        }
    }

    fn numeric_len(&self) -> u64 {
        if self.strategy.includes_numeric() {
            self.numeric.len()
        } else {
            0
        }
    }

    /// Total number of candidates, known before any is produced.
    pub fn len(&self) -> u64 {
        self.dictionary_len() + self.numeric_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Candidate at a zero-based position.
    pub fn get(&self, index: u64) -> Option<String> {
        let dictionary_len = self.dictionary_len();
        if index < dictionary_len {
            return self.wordlist.get(index as usize).map(str::to_string);
        }
        let index = index - dictionary_len;
        (index < self.numeric_len()).then(|| self.numeric.render(index))
    }

    /// A fresh iterator over the whole sequence.
    pub fn iter(&self) -> Candidates<'_> {
        Candidates {
            plan: self,
            next: 0,
            len: self.len(),
        }
    }
}

impl<'a> IntoIterator for &'a CandidatePlan {
    type Item = String;
    type IntoIter = Candidates<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by [`CandidatePlan::iter`].
#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    plan: &'a CandidatePlan,
    next: u64,
    len: u64,
}

impl Iterator for Candidates<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.next >= self.len {
            return None;
        }
        let candidate = self.plan.get(self.next);
        self.next += 1;
        candidate
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.len - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl FusedIterator for Candidates<'_> {}
