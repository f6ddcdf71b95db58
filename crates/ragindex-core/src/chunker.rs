//! Segmentation of document bodies into retrievable spans.
//!
//! Both strategies are exposed as lazy iterators over borrowed input. The
//! iterators are `Clone`, so a sequence can be restarted from any point
//! without re-reading the body.

use crate::config::ChunkingSettings;
use crate::error::Error;
use crate::types::ChunkStrategy;

/// Length as counted for every chunking threshold (Unicode scalar values).
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[derive(Debug, Clone)]
pub struct Chunker {
    settings: ChunkingSettings,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { settings: ChunkingSettings::default() }
    }
}

impl Chunker {
    pub fn new(settings: ChunkingSettings) -> Result<Self, Error> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &ChunkingSettings {
        &self.settings
    }

    /// Split `body` under `strategy`. Short fragments are *not* filtered here;
    /// see [`Chunker::is_retrievable`].
    pub fn segment<'a>(&self, body: &'a str, strategy: ChunkStrategy) -> Segments<'a> {
        match strategy {
            ChunkStrategy::Fixed => Segments::Fixed(FixedWindows::new(body, self.settings.window, self.settings.overlap)),
            ChunkStrategy::Sentence => Segments::Sentence(SentenceWindows::new(
                body,
                self.settings.target_chars,
                self.settings.overlap_sentences,
                self.settings.min_sentence_chars,
            )),
        }
    }

    /// Whether a segment is long enough to be indexed.
    pub fn is_retrievable(&self, text: &str) -> bool {
        char_len(text) > self.settings.min_chunk_chars
    }
}

#[derive(Debug, Clone)]
pub enum Segments<'a> {
    Fixed(FixedWindows<'a>),
    Sentence(SentenceWindows<'a>),
}

impl Iterator for Segments<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match self {
            Segments::Fixed(it) => it.next(),
            Segments::Sentence(it) => it.next(),
        }
    }
}

/// Word windows of `window` words whose start advances by `window - overlap`.
#[derive(Debug, Clone)]
pub struct FixedWindows<'a> {
    words: Vec<&'a str>,
    window: usize,
    step: usize,
    start: usize,
    done: bool,
}

impl<'a> FixedWindows<'a> {
    /// `overlap < window` is enforced by [`ChunkingSettings::validate`]; a
    /// degenerate pair still terminates because the step is at least one word.
    pub fn new(text: &'a str, window: usize, overlap: usize) -> Self {
        let window = window.max(1);
        Self {
            words: text.split_whitespace().collect(),
            window,
            step: window.saturating_sub(overlap).max(1),
            start: 0,
            done: false,
        }
    }
}

impl Iterator for FixedWindows<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done || self.start >= self.words.len() {
            return None;
        }
        let end = (self.start + self.window).min(self.words.len());
        let chunk = self.words[self.start..end].join(" ");
        if end == self.words.len() {
            self.done = true;
        } else {
            self.start += self.step;
        }
        Some(chunk)
    }
}

/// Split on `.`, `!` or `?` followed by whitespace. The terminator stays with
/// its sentence; the whitespace run is consumed.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            out.push(&text[start..i]);
            while chars.peek().is_some_and(|&(_, n)| n.is_whitespace()) {
                chars.next();
            }
            start = chars.peek().map_or(text.len(), |&(j, _)| j);
            prev = None;
            continue;
        }
        prev = Some(c);
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Sentence accumulator emitting a chunk whenever the summed sentence length
/// reaches `target_chars`, seeding the next chunk with the last
/// `overlap_sentences` sentences of the one just emitted.
#[derive(Debug, Clone)]
pub struct SentenceWindows<'a> {
    sentences: Vec<&'a str>,
    next: usize,
    tail: Vec<&'a str>,
    target_chars: usize,
    overlap_sentences: usize,
}

impl<'a> SentenceWindows<'a> {
    pub fn new(text: &'a str, target_chars: usize, overlap_sentences: usize, min_sentence_chars: usize) -> Self {
        let sentences = split_sentences(text)
            .into_iter()
            .map(str::trim)
            .filter(|s| char_len(s) > min_sentence_chars)
            .collect();
        Self { sentences, next: 0, tail: Vec::new(), target_chars, overlap_sentences }
    }
}

impl Iterator for SentenceWindows<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.next >= self.sentences.len() {
            return None;
        }
        let mut current = std::mem::take(&mut self.tail);
        let mut total: usize = current.iter().map(|s| char_len(s)).sum();
        while let Some(&sentence) = self.sentences.get(self.next) {
            self.next += 1;
            current.push(sentence);
            total += char_len(sentence);
            if total >= self.target_chars {
                let keep = self.overlap_sentences.min(current.len());
                self.tail = current[current.len() - keep..].to_vec();
                return Some(current.join(" "));
            }
        }
        // Input exhausted below target: the remainder is the final chunk.
        Some(current.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    /// A sentence of exactly `len` characters, terminated by a period.
    fn sentence(i: usize, len: usize) -> String {
        let mut s = format!("Sentence {i:03} mentions ");
        while char_len(&s) < len - 1 {
            s.push('r');
        }
        s.push('.');
        s
    }

    #[test]
    fn fixed_windows_cover_every_token_with_overlap() {
        let text = words(1000);
        let chunks: Vec<String> = FixedWindows::new(&text, 400, 80).collect();
        // starts at 0, 320, 640; the third window reaches the end.
        assert_eq!(chunks.len(), 3);

        let mut stitched: Vec<&str> = chunks[0].split(' ').collect();
        for c in &chunks[1..] {
            stitched.extend(c.split(' ').skip(80));
        }
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(stitched, original);
    }

    #[test]
    fn fixed_windows_short_body_is_one_chunk() {
        let text = words(10);
        let chunks: Vec<String> = FixedWindows::new(&text, 400, 80).collect();
        assert_eq!(chunks, vec![text.clone()]);
        assert_eq!(FixedWindows::new("   ", 400, 80).count(), 0);
    }

    #[test]
    fn fixed_windows_exact_fit_does_not_emit_tail_duplicate() {
        let text = words(400);
        assert_eq!(FixedWindows::new(&text, 400, 80).count(), 1);
        let text = words(720);
        // 0..400, 320..720
        assert_eq!(FixedWindows::new(&text, 400, 80).count(), 2);
    }

    #[test]
    fn fixed_windows_are_restartable() {
        let text = words(900);
        let it = FixedWindows::new(&text, 400, 80);
        let first: Vec<String> = it.clone().collect();
        let second: Vec<String> = it.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn splits_sentences_on_terminal_punctuation_and_whitespace() {
        let s = split_sentences("One two. Three four!  Five?\nSix 3.5 seven");
        assert_eq!(s, vec!["One two.", "Three four!", "Five?", "Six 3.5 seven"]);
    }

    #[test]
    fn short_sentences_are_dropped() {
        let body = "Tiny one. This sentence is long enough to keep.";
        let chunks: Vec<String> = SentenceWindows::new(body, 1200, 2, 20).collect();
        assert_eq!(chunks, vec!["This sentence is long enough to keep.".to_string()]);
    }

    #[test]
    fn sentence_chunks_never_split_sentences() {
        let sentences: Vec<String> = (0..40).map(|i| sentence(i, 90)).collect();
        let body = sentences.join(" ");
        let chunks: Vec<String> = SentenceWindows::new(&body, 1200, 2, 20).collect();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            let parts = split_sentences(chunk);
            for part in parts {
                assert!(sentences.iter().any(|s| s == part), "fragment {part:?} is not a whole sentence");
            }
        }
    }

    #[test]
    fn sentence_chunks_carry_last_two_sentences_forward() {
        let sentences: Vec<String> = (0..30).map(|i| sentence(i, 100)).collect();
        let body = sentences.join(" ");
        let chunks: Vec<String> = SentenceWindows::new(&body, 1200, 2, 20).collect();
        for pair in chunks.windows(2) {
            let prev = split_sentences(&pair[0]);
            let next = split_sentences(&pair[1]);
            assert_eq!(&prev[prev.len() - 2..], &next[..2]);
        }
        // first chunk closes once 12 sentences of 100 chars reach the target
        assert_eq!(split_sentences(&chunks[0]).len(), 12);
    }

    #[test]
    fn remainder_below_target_is_emitted() {
        let body = format!("{} {}", sentence(0, 60), sentence(1, 60));
        let chunks: Vec<String> = SentenceWindows::new(&body, 1200, 2, 20).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(split_sentences(&chunks[0]).len(), 2);
    }

    #[test]
    fn no_trailing_chunk_made_only_of_carried_sentences() {
        let sentences: Vec<String> = (0..12).map(|i| sentence(i, 100)).collect();
        let body = sentences.join(" ");
        let chunks: Vec<String> = SentenceWindows::new(&body, 1200, 2, 20).collect();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn chunker_filters_by_min_chunk_length() {
        let chunker = Chunker::default();
        assert!(!chunker.is_retrievable(&"x".repeat(100)));
        assert!(chunker.is_retrievable(&"x".repeat(101)));
    }

    #[test]
    fn chunker_rejects_overlap_not_smaller_than_window() {
        let settings = ChunkingSettings { window: 10, overlap: 10, ..ChunkingSettings::default() };
        assert!(Chunker::new(settings).is_err());
    }
}
