//! Document Processor
//!
//! Turns raw document text into overlapping, sentence-bounded chunks ready for
//! embedding, and derives lightweight metadata (title, counts, keywords).
//!
//! A "token" here is a whitespace-delimited word. Chunks hold at most
//! `chunk_size` tokens unless a single sentence is longer than that on its
//! own, and each chunk after the first starts with up to `chunk_overlap`
//! tokens copied from the end of the previous chunk.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChunkMetadata, DocumentMetadata};

pub const DEFAULT_CHUNK_SIZE: usize = 400;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Sentences of this many characters or fewer are treated as noise.
const MIN_SENTENCE_CHARS: usize = 10;
/// Unterminated fragments longer than this are kept (headers, list items).
const LONG_FRAGMENT_CHARS: usize = 50;
const MAX_KEYWORDS: usize = 10;
const MIN_KEYWORD_CHARS: usize = 3;
const ALLOWED_PUNCTUATION: &str = ".,!?;:()-\"'";

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// One chunk produced by [`DocumentProcessor::process_document`], still
/// lacking an embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Byte offset of the first token in the cleaned text.
    pub start_index: usize,
    /// Byte offset just past the last token in the cleaned text.
    pub end_index: usize,
    pub token_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMetadata {
    pub title: String,
    pub filename: String,
    pub token_count: usize,
    pub sentence_count: usize,
    pub character_count: usize,
    pub keywords: Vec<String>,
    pub language: String,
    pub processed_at: DateTime<Utc>,
}

type Span = (usize, usize);

#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(ProcessorOptions::default())
    }
}

impl DocumentProcessor {
    /// A zero `chunk_size` falls back to the default; the overlap is kept
    /// strictly below the chunk size.
    pub fn new(options: ProcessorOptions) -> Self {
        let chunk_size = if options.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            options.chunk_size
        };

        Self {
            chunk_size,
            chunk_overlap: options.chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Clean and chunk a document. Every chunk carries the document metadata
    /// plus its own `chunkIndex`/`totalChunks`.
    pub fn process_document(&self, content: &str, metadata: &DocumentMetadata) -> Vec<ProcessedChunk> {
        let cleaned = self.clean_text(content);
        let windows = self.create_chunks(&cleaned);
        let total_chunks = windows.len();
        let base = metadata.to_map();

        windows
            .into_iter()
            .enumerate()
            .map(|(chunk_index, window)| ProcessedChunk {
                content: window.content,
                metadata: ChunkMetadata {
                    chunk_index,
                    total_chunks,
                    extra: base.clone(),
                },
                start_index: window.start,
                end_index: window.end,
                token_count: window.token_count,
            })
            .collect()
    }

    /// Collapse whitespace runs to single spaces and drop every character
    /// outside `[A-Za-z0-9_]` and basic punctuation.
    pub fn clean_text(&self, text: &str) -> String {
        let filtered: String = text
            .chars()
            .filter(|c| {
                c.is_ascii_alphanumeric()
                    || *c == '_'
                    || c.is_whitespace()
                    || ALLOWED_PUNCTUATION.contains(*c)
            })
            .collect();

        filtered.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn split_into_sentences(&self, text: &str) -> Vec<String> {
        sentence_spans(text)
            .into_iter()
            .map(|(start, end)| text[start..end].to_string())
            .collect()
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    pub fn extract_metadata(&self, content: &str, filename: &str) -> ExtractedMetadata {
        let title = content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .or_else(|| {
                let stem = strip_extension(filename);
                (!stem.is_empty()).then(|| stem.to_string())
            })
            .unwrap_or_else(|| "Untitled".to_string());

        let mut keywords = self.extract_keywords(content);
        keywords.truncate(MAX_KEYWORDS);

        ExtractedMetadata {
            title,
            filename: filename.to_string(),
            token_count: self.count_tokens(content),
            sentence_count: self.split_into_sentences(content).len(),
            character_count: content.chars().count(),
            keywords,
            language: "en".to_string(),
            processed_at: Utc::now(),
        }
    }

    /// Alphabetic, non-stop-word terms ordered by descending frequency; ties
    /// keep first-seen order.
    pub fn extract_keywords(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut counts: Vec<(&str, usize)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        let terms = lowered
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|token| token.len() >= MIN_KEYWORD_CHARS)
            .filter(|token| token.chars().all(|c| c.is_ascii_alphabetic()))
            .filter(|token| !STOP_WORDS.contains(token));

        for term in terms {
            match positions.get(term) {
                Some(&pos) => counts[pos].1 += 1,
                None => {
                    positions.insert(term, counts.len());
                    counts.push((term, 1));
                }
            }
        }

        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.into_iter().map(|(term, _)| term.to_string()).collect()
    }

    fn create_chunks(&self, text: &str) -> Vec<Window> {
        let mut windows = Vec::new();
        let mut current: Vec<Span> = Vec::new();

        for (start, end) in sentence_spans(text) {
            let tokens = token_spans(&text[start..end], start);
            if tokens.is_empty() {
                continue;
            }

            if !current.is_empty() && current.len() + tokens.len() > self.chunk_size {
                windows.push(Window::assemble(text, &current));

                // Overlap never pushes the next chunk past the budget.
                let room = self.chunk_size.saturating_sub(tokens.len());
                let keep = self.chunk_overlap.min(current.len()).min(room);
                current.drain(..current.len() - keep);
            }

            current.extend(tokens);
        }

        if !current.is_empty() {
            windows.push(Window::assemble(text, &current));
        }

        windows
    }
}

struct Window {
    content: String,
    start: usize,
    end: usize,
    token_count: usize,
}

impl Window {
    fn assemble(text: &str, tokens: &[Span]) -> Self {
        let content = tokens
            .iter()
            .map(|&(start, end)| &text[start..end])
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            content,
            start: tokens.first().map_or(0, |t| t.0),
            end: tokens.last().map_or(0, |t| t.1),
            token_count: tokens.len(),
        }
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Sentence byte ranges after trimming and noise filtering.
fn sentence_spans(text: &str) -> Vec<Span> {
    let mut raw = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }

        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if is_terminal(next) || matches!(next, '"' | '\'' | ')') {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let at_boundary = chars.peek().map_or(true, |&(_, next)| next.is_whitespace());
        if at_boundary {
            raw.push((start, end));
            start = end;
        }
    }
    if start < text.len() {
        raw.push((start, text.len()));
    }

    raw.into_iter()
        .filter_map(|span| trim_span(text, span))
        .filter(|&(start, end)| {
            let sentence = &text[start..end];
            let length = sentence.chars().count();
            length > MIN_SENTENCE_CHARS
                && (sentence.ends_with(is_terminal) || length > LONG_FRAGMENT_CHARS)
        })
        .collect()
}

fn trim_span(text: &str, (start, end): Span) -> Option<Span> {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lead = slice.len() - slice.trim_start().len();
    Some((start + lead, start + lead + trimmed.len()))
}

/// Whitespace-delimited word ranges, offset by `base`.
fn token_spans(text: &str, base: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((base + s, base + i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((base + s, base + text.len()));
    }

    spans
}

fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(dot) if dot + 1 < filename.len() && !filename[dot + 1..].contains('/') => &filename[..dot],
        _ => filename,
    }
}
