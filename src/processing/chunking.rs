//! Sentence-aware chunking with bounded overlap.
//!
//! Text is split into sentences first, then each sentence is normalized
//! (case-folded, punctuation and digits stripped, whitespace collapsed).
//! Sentences accumulate greedily into chunks by word count; when a chunk
//! closes, the next one is seeded with the trailing sentences of the previous
//! chunk up to the overlap budget. Sentences are never split: one sentence
//! longer than the whole budget becomes its own chunk.

use regex::Regex;
use std::sync::OnceLock;

use super::types::ChunkingError;

fn sentence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^.!?]*[.!?]+|[^.!?]+$").expect("valid sentence pattern"))
}

fn non_word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\w\s]+").expect("valid punctuation pattern"))
}

fn digit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").expect("valid digit pattern"))
}

/// Split raw text into sentence spans on terminator boundaries.
fn split_sentences(text: &str) -> Vec<&str> {
    sentence_pattern()
        .find_iter(text)
        .map(|span| span.as_str().trim())
        .filter(|span| !span.is_empty())
        .collect()
}

/// Normalize one sentence: case-fold, strip punctuation and digits, collapse
/// whitespace. Returns `None` when nothing survives.
fn normalize_sentence(sentence: &str) -> Option<String> {
    let lowered = sentence.to_lowercase();
    let without_punct = non_word_pattern().replace_all(&lowered, " ");
    let without_digits = digit_pattern().replace_all(&without_punct, "");
    let collapsed = without_digits.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Chunk text into overlapping word-bounded segments along sentence boundaries.
///
/// Pure function of the input text and the three budgets. Emission stops once
/// `max_chunks` chunks exist, even if sentences remain.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    max_chunks: usize,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() || max_chunks == 0 {
        return Ok(Vec::new());
    }

    let sentences: Vec<(String, usize)> = split_sentences(text)
        .into_iter()
        .filter_map(normalize_sentence)
        .map(|sentence| {
            let words = sentence.split_whitespace().count();
            (sentence, words)
        })
        .collect();

    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<(String, usize)> = Vec::new();
    let mut current_words = 0usize;

    for (sentence, words) in sentences {
        if current_words + words > chunk_size && !current.is_empty() {
            chunks.push(join_sentences(&current));
            if chunks.len() == max_chunks {
                return Ok(chunks);
            }

            let (mut seed, mut seed_words) = overlap_tail(&current, overlap);
            // The seed must leave room for the incoming sentence; shrink it
            // from the front, down to nothing for an oversized sentence.
            while !seed.is_empty() && seed_words + words > chunk_size {
                let (_, dropped) = seed.remove(0);
                seed_words -= dropped;
            }
            current = seed;
            current_words = seed_words;
        }

        current.push((sentence, words));
        current_words += words;
    }

    if !current.is_empty() && chunks.len() < max_chunks {
        chunks.push(join_sentences(&current));
    }

    Ok(chunks)
}

/// Trailing sentences of a closed chunk whose cumulative word count stays
/// within the overlap budget, walking backward from the end.
fn overlap_tail(sentences: &[(String, usize)], overlap: usize) -> (Vec<(String, usize)>, usize) {
    let mut tail: Vec<(String, usize)> = Vec::new();
    let mut tail_words = 0usize;

    for (sentence, words) in sentences.iter().rev() {
        if tail_words + words > overlap {
            break;
        }
        tail.push((sentence.clone(), *words));
        tail_words += words;
    }

    tail.reverse();
    (tail, tail_words)
}

fn join_sentences(sentences: &[(String, usize)]) -> String {
    sentences
        .iter()
        .map(|(sentence, _)| sentence.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
