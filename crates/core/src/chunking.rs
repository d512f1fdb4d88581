use crate::error::IngestError;
use crate::models::TextChunk;
use crate::normalize::normalize_text;
use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Heading marker lines: `# ...`, `## ...`, etc.
const HEADING_PATTERN: &str = r"(?m)^#+\s+(.+)$";

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
    /// Minimum size the splitting heuristics aim for. Biases boundary
    /// selection only; a section smaller than this is still emitted.
    pub min_chunk_size: usize,
    /// Hard ceiling on any chunk's length.
    pub max_chunk_size: usize,
    pub split_by_headings: bool,
    pub detect_language: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            max_chunk_size: 2_000,
            split_by_headings: true,
            detect_language: true,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.min_chunk_size > self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "min_chunk_size {} exceeds chunk_size {}",
                self.min_chunk_size, self.chunk_size
            )));
        }
        if self.max_chunk_size < self.chunk_size + self.chunk_overlap {
            return Err(IngestError::InvalidChunkConfig(format!(
                "max_chunk_size {} is below chunk_size + chunk_overlap = {}",
                self.max_chunk_size,
                self.chunk_size + self.chunk_overlap
            )));
        }
        Ok(())
    }

    /// Largest span a single chunk may occupy. Also bounds the forward scan
    /// for a sentence terminator, so the length invariant holds even when
    /// the next terminator is far away.
    fn window(&self) -> usize {
        self.chunk_size + self.chunk_overlap
    }
}

#[derive(Debug, Clone)]
struct Heading {
    text: String,
    /// Character offset of the heading line in the normalized text.
    start: usize,
}

/// Splits normalized text into an ordered list of bounded, overlapping
/// chunks. `chunk_index` starts at zero; use [`chunk_text_from`] when
/// continuing a document across pages.
pub fn chunk_text(
    text: &str,
    document_id: &str,
    config: &ChunkingConfig,
    metadata: Option<&Map<String, Value>>,
) -> Result<Vec<TextChunk>, IngestError> {
    chunk_text_from(text, document_id, config, metadata, 0, None)
}

/// Like [`chunk_text`], but starts indexing at `start_index` and stamps an
/// optional page number, so a document processed page by page keeps one
/// strictly increasing index sequence.
pub fn chunk_text_from(
    text: &str,
    document_id: &str,
    config: &ChunkingConfig,
    metadata: Option<&Map<String, Value>>,
    start_index: usize,
    page_number: Option<u32>,
) -> Result<Vec<TextChunk>, IngestError> {
    config.validate()?;

    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = normalized.chars().collect();
    let headings = if config.split_by_headings {
        extract_headings(&normalized)?
    } else {
        Vec::new()
    };

    let language = if config.detect_language {
        detect_language(&normalized)
    } else {
        None
    };

    let spans = if config.split_by_headings {
        split_sections(&chars, config)
    } else {
        split_by_length(&chars, 0, chars.len(), config)
    };

    let mut chunks = Vec::new();
    let mut cursor = start_index;

    for (start, end) in spans {
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }

        let mut chunk_metadata = metadata.cloned().unwrap_or_default();
        chunk_metadata.insert("char_start".into(), Value::from(start));
        chunk_metadata.insert("char_end".into(), Value::from(end));

        chunks.push(TextChunk {
            chunk_id: make_chunk_id(document_id, page_number, cursor, piece),
            document_id: document_id.to_string(),
            chunk_index: cursor,
            text: piece.to_string(),
            page_number,
            section: nearest_heading(&headings, start),
            language: language.clone(),
            metadata: chunk_metadata,
            embedding: None,
        });
        cursor += 1;
    }

    Ok(chunks)
}

fn extract_headings(text: &str) -> Result<Vec<Heading>, IngestError> {
    let heading_re = Regex::new(HEADING_PATTERN)?;
    let mut headings = Vec::new();

    for capture in heading_re.captures_iter(text) {
        let whole = match capture.get(0) {
            Some(m) => m,
            None => continue,
        };
        let title = capture
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }
        headings.push(Heading {
            text: title,
            start: text[..whole.start()].chars().count(),
        });
    }

    Ok(headings)
}

/// Nearest preceding heading: the heading with the greatest start offset
/// that does not exceed the chunk's start offset.
fn nearest_heading(headings: &[Heading], chunk_start: usize) -> Option<String> {
    headings
        .iter()
        .rev()
        .find(|heading| heading.start <= chunk_start)
        .map(|heading| heading.text.clone())
}

/// Paragraph-level sections: a section that fits within one window is kept
/// whole (even when below the minimum size), anything larger is split by
/// length.
fn split_sections(chars: &[char], config: &ChunkingConfig) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();

    for (start, end) in paragraph_spans(chars) {
        if end - start <= config.window() {
            spans.push((start, end));
        } else {
            spans.extend(split_by_length(chars, start, end, config));
        }
    }

    spans
}

fn paragraph_spans(chars: &[char]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\n' {
            if i > start {
                spans.push((start, i));
            }
            while i < chars.len() && chars[i] == '\n' {
                i += 1;
            }
            start = i;
        } else {
            i += 1;
        }
    }
    if start < chars.len() {
        spans.push((start, chars.len()));
    }

    spans
}

/// Length-based splitting with boundary snapping: prefer the nearest
/// sentence terminator after the proposed cut, fall back to the nearest
/// preceding word boundary, and finally cut at the raw offset. The next
/// chunk starts `chunk_overlap` characters before the previous end; when
/// that would not advance, the start is forced to the previous end so the
/// loop always makes progress.
fn split_by_length(
    chars: &[char],
    base: usize,
    limit: usize,
    config: &ChunkingConfig,
) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = base;

    while start < limit {
        let mut end = (start + config.chunk_size).min(limit);

        if end < limit {
            let cap = (start + config.window()).min(limit);
            let mut cut = find_sentence_boundary(chars, end, cap)
                .filter(|boundary| *boundary > start + config.min_chunk_size);
            if cut.is_none() {
                cut = last_word_boundary(chars, start, end)
                    .filter(|boundary| *boundary > start + config.min_chunk_size);
            }
            if let Some(boundary) = cut {
                end = boundary;
            }
        }

        spans.push((start, end));

        let next = end.saturating_sub(config.chunk_overlap);
        start = if next <= start { end } else { next };
    }

    spans
}

/// Earliest sentence terminator at or after `from`, bounded by `cap`.
/// Terminators are `". "`, `"! "`, `"? "`, and newline; the returned offset
/// is just past the terminator.
fn find_sentence_boundary(chars: &[char], from: usize, cap: usize) -> Option<usize> {
    for i in from..cap {
        if chars[i] == '\n' {
            return Some(i + 1);
        }
        if matches!(chars[i], '.' | '!' | '?')
            && chars.get(i + 1).is_some_and(|next| *next == ' ')
            && i + 2 <= cap
        {
            return Some(i + 2);
        }
    }
    None
}

fn last_word_boundary(chars: &[char], start: usize, end: usize) -> Option<usize> {
    (start..end).rev().find(|i| chars[*i] == ' ')
}

fn detect_language(text: &str) -> Option<String> {
    match whatlang::detect(text) {
        Some(info) => Some(info.lang().code().to_string()),
        None => {
            warn!("language detection failed, leaving language unset");
            None
        }
    }
}

fn make_chunk_id(document_id: &str, page: Option<u32>, index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(page.unwrap_or(0).to_le_bytes());
    hasher.update((index as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_config() -> ChunkingConfig {
        ChunkingConfig {
            split_by_headings: false,
            detect_language: false,
            ..ChunkingConfig::default()
        }
    }

    fn span_of(chunk: &TextChunk) -> (usize, usize) {
        let start = chunk.metadata["char_start"].as_u64().unwrap() as usize;
        let end = chunk.metadata["char_end"].as_u64().unwrap() as usize;
        (start, end)
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunks = chunk_text("", "doc-1", &ChunkingConfig::default(), None).unwrap();
        assert!(chunks.is_empty());

        let blank = chunk_text("   \n\n \t ", "doc-1", &ChunkingConfig::default(), None).unwrap();
        assert!(blank.is_empty());
    }

    #[test]
    fn twenty_five_hundred_chars_make_exactly_three_chunks() {
        // No spaces or terminators, so every cut lands on the raw offset
        // and the arithmetic is exact.
        let text = "a".repeat(2_500);
        let chunks = chunk_text(&text, "doc-1", &plain_config(), None).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        let (s0, e0) = span_of(&chunks[0]);
        let (s1, e1) = span_of(&chunks[1]);
        let (s2, e2) = span_of(&chunks[2]);
        assert_eq!((s0, e0), (0, 1_000));
        assert_eq!(s1, e0 - 200);
        assert_eq!(e1, 1_800);
        assert_eq!(s2, e1 - 200);
        assert_eq!(e2, 2_500);
    }

    #[test]
    fn chunk_lengths_stay_within_the_window() {
        let sentence = "The pump housing must be inspected for cracks before use. ";
        let text = sentence.repeat(60);
        let config = plain_config();
        let chunks = chunk_text(&text, "doc-1", &config, None).unwrap();

        assert!(chunks.len() > 1);
        for (position, chunk) in chunks.iter().enumerate() {
            let (start, end) = span_of(chunk);
            assert!(end - start <= config.chunk_size + config.chunk_overlap);
            if position + 1 < chunks.len() {
                assert!(end - start >= config.min_chunk_size);
            }
        }
    }

    #[test]
    fn cuts_snap_forward_to_a_sentence_terminator() {
        let config = ChunkingConfig {
            chunk_size: 30,
            chunk_overlap: 20,
            min_chunk_size: 5,
            max_chunk_size: 50,
            split_by_headings: false,
            detect_language: false,
        };
        // Terminator at offset 35, past the proposed cut at 30 but inside
        // the 50-character window.
        let text = format!("{}. {}", "a".repeat(35), "b".repeat(40));
        let chunks = chunk_text(&text, "doc-1", &config, None).unwrap();

        assert!(chunks.len() > 1);
        let (start, end) = span_of(&chunks[0]);
        assert_eq!((start, end), (0, 37));
        assert!(chunks[0].text.ends_with('.'));
    }

    #[test]
    fn cuts_fall_back_to_the_preceding_word_boundary() {
        let config = ChunkingConfig {
            chunk_size: 30,
            chunk_overlap: 10,
            min_chunk_size: 5,
            max_chunk_size: 60,
            split_by_headings: false,
            detect_language: false,
        };
        // No sentence terminator anywhere; the only space sits at offset 20.
        let text = format!("{} {}", "a".repeat(20), "b".repeat(60));
        let chunks = chunk_text(&text, "doc-1", &config, None).unwrap();

        let (start, end) = span_of(&chunks[0]);
        assert_eq!((start, end), (0, 20));
        assert_eq!(chunks[0].text, "a".repeat(20));
    }

    #[test]
    fn coverage_has_no_gaps() {
        let text = "Alpha beta gamma. ".repeat(200);
        let normalized = normalize_text(&text);
        let total = normalized.chars().count();
        let chunks = chunk_text(&text, "doc-1", &plain_config(), None).unwrap();

        let spans: Vec<(usize, usize)> = chunks.iter().map(span_of).collect();
        let normalized_chars: Vec<char> = normalized.chars().collect();
        for (position, c) in normalized_chars.iter().enumerate().take(total) {
            if c.is_whitespace() {
                continue;
            }
            assert!(
                spans.iter().any(|(s, e)| position >= *s && position < *e),
                "character at {position} not covered by any chunk"
            );
        }
    }

    #[test]
    fn section_below_minimum_is_still_emitted() {
        let chunks = chunk_text("tiny", "doc-1", &ChunkingConfig::default(), None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "tiny");
    }

    #[test]
    fn headings_become_sections_for_following_chunks() {
        let text = "# Alpha\n\nfirst paragraph body\n\n# Beta\n\nsecond paragraph body";
        let config = ChunkingConfig {
            detect_language: false,
            ..ChunkingConfig::default()
        };
        let chunks = chunk_text(text, "doc-1", &config, None).unwrap();

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[1].text, "first paragraph body");
        assert_eq!(chunks[1].section.as_deref(), Some("Alpha"));
        assert_eq!(chunks[3].text, "second paragraph body");
        assert_eq!(chunks[3].section.as_deref(), Some("Beta"));
    }

    #[test]
    fn text_before_any_heading_has_no_section() {
        let text = "leading paragraph\n\n# Later\n\nafter";
        let config = ChunkingConfig {
            detect_language: false,
            ..ChunkingConfig::default()
        };
        let chunks = chunk_text(text, "doc-1", &config, None).unwrap();
        assert_eq!(chunks[0].section, None);
    }

    #[test]
    fn language_is_stamped_on_every_chunk() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(30);
        let chunks = chunk_text(&text, "doc-1", &ChunkingConfig::default(), None).unwrap();
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert_eq!(chunk.language.as_deref(), Some("eng"));
        }
    }

    #[test]
    fn cursor_continues_across_pages() {
        let config = plain_config();
        let first = chunk_text_from("page one text", "doc-1", &config, None, 0, Some(1)).unwrap();
        let next_index = first.last().map(|c| c.chunk_index + 1).unwrap_or(0);
        let second =
            chunk_text_from("page two text", "doc-1", &config, None, next_index, Some(2)).unwrap();

        assert_eq!(first[0].chunk_index, 0);
        assert_eq!(second[0].chunk_index, first.len());
        assert_eq!(second[0].page_number, Some(2));
    }

    #[test]
    fn degenerate_config_still_terminates() {
        let config = ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 8,
            min_chunk_size: 1,
            max_chunk_size: 50,
            split_by_headings: false,
            detect_language: false,
        };
        let text = "a b c d e f g h i j k l m n o p q r s t u v w x y z";
        let chunks = chunk_text(text, "doc-1", &config, None).unwrap();

        assert!(!chunks.is_empty());
        let indexes: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, (0..chunks.len()).collect::<Vec<_>>());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..ChunkingConfig::default()
        };
        assert!(matches!(
            chunk_text("text", "doc-1", &config, None),
            Err(IngestError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn caller_metadata_is_carried_on_each_chunk() {
        let mut metadata = Map::new();
        metadata.insert("source".into(), Value::from("upload"));
        let chunks =
            chunk_text("some text", "doc-1", &ChunkingConfig::default(), Some(&metadata)).unwrap();
        assert_eq!(chunks[0].metadata["source"], Value::from("upload"));
    }

    #[test]
    fn chunk_ids_are_deterministic() {
        let config = plain_config();
        let first = chunk_text("stable text", "doc-1", &config, None).unwrap();
        let second = chunk_text("stable text", "doc-1", &config, None).unwrap();
        assert_eq!(first[0].chunk_id, second[0].chunk_id);
    }
}
