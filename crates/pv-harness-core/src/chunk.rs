//! Paragraph-aware, word-windowed text chunker.
//!
//! Splits extracted document text into [`Fragment`]s small enough that
//! several fit in one prompt, yet large enough to score on their own.
//!
//! # Algorithm
//!
//! 1. Normalize `\r\n` to `\n` and split on blank lines (`\n\n`) when the
//!    source preserves paragraphs; otherwise treat the text as one paragraph.
//! 2. Pack consecutive paragraphs into one fragment while the running word
//!    count stays within `window_words`.
//! 3. A paragraph longer than `window_words` is flushed on its own as a
//!    series of fixed word windows that advance by
//!    `window_words - overlap_words`.
//! 4. Whitespace-only paragraphs are dropped.
//!
//! Each fragment records how many of its leading words repeat the previous
//! fragment, so concatenating fragments minus those words reproduces the
//! source text up to whitespace collapsing.
//!
//! # Example
//!
//! ```rust
//! use pv_harness_core::chunk::Chunker;
//!
//! let chunker = Chunker::new(100, 0);
//! let parts = chunker.split("Primer párrafo.\n\nSegundo párrafo.");
//! assert_eq!(parts, vec!["Primer párrafo.\n\nSegundo párrafo."]);
//! ```

use crate::models::{Document, Fragment, FragmentId};

/// Default fragment size in words.
pub const DEFAULT_WINDOW_WORDS: usize = 100;

/// Splits documents into fragments. Deterministic for identical input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    window_words: usize,
    overlap_words: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_WORDS, 0)
    }
}

struct Piece {
    text: String,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker. `window_words` is raised to at least 1 and
    /// `overlap_words` is capped below the window.
    pub fn new(window_words: usize, overlap_words: usize) -> Self {
        let window_words = window_words.max(1);
        Self {
            window_words,
            overlap_words: overlap_words.min(window_words - 1),
        }
    }

    pub fn window_words(&self) -> usize {
        self.window_words
    }

    pub fn overlap_words(&self) -> usize {
        self.overlap_words
    }

    /// Split `text` into fragment strings, in source order.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.pieces(text).into_iter().map(|p| p.text).collect()
    }

    /// Derive the fragments of a document.
    pub fn fragments(&self, doc: &Document) -> Vec<Fragment> {
        self.pieces(&doc.text)
            .into_iter()
            .enumerate()
            .map(|(ordinal, piece)| {
                Fragment::new(FragmentId::new(&doc.id, ordinal), piece.text, piece.overlap)
            })
            .collect()
    }

    fn pieces(&self, text: &str) -> Vec<Piece> {
        let normalized = text.replace("\r\n", "\n");
        let mut pieces = Vec::new();
        let mut buf = String::new();
        let mut buf_words = 0usize;

        for para in normalized.split("\n\n") {
            let words: Vec<&str> = para.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }

            if buf_words + words.len() > self.window_words && !buf.is_empty() {
                pieces.push(Piece {
                    text: std::mem::take(&mut buf),
                    overlap: 0,
                });
                buf_words = 0;
            }

            if words.len() > self.window_words {
                self.window(&words, &mut pieces);
                continue;
            }

            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(para.trim());
            buf_words += words.len();
        }

        if !buf.is_empty() {
            pieces.push(Piece {
                text: buf,
                overlap: 0,
            });
        }

        pieces
    }

    fn window(&self, words: &[&str], out: &mut Vec<Piece>) {
        let step = self.window_words - self.overlap_words;
        let mut start = 0usize;
        loop {
            let end = (start + self.window_words).min(words.len());
            out.push(Piece {
                text: words[start..end].join(" "),
                overlap: if start == 0 { 0 } else { self.overlap_words },
            });
            if end == words.len() {
                break;
            }
            start += step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::collapse_whitespace;

    fn reconstruct(fragments: &[Fragment]) -> String {
        let words: Vec<&str> = fragments
            .iter()
            .flat_map(|f| f.text.split_whitespace().skip(f.overlap_words))
            .collect();
        words.join(" ")
    }

    fn numbered_words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_small_text_single_fragment() {
        let parts = Chunker::default().split("Los paneles solares convierten la luz.");
        assert_eq!(parts, vec!["Los paneles solares convierten la luz."]);
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        assert!(Chunker::default().split("").is_empty());
        assert!(Chunker::default().split(" \n\n \t \n\n").is_empty());
    }

    #[test]
    fn test_fixed_window_without_paragraphs() {
        let text = numbered_words(250);
        let parts = Chunker::new(100, 0).split(&text);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].split_whitespace().count(), 100);
        assert_eq!(parts[2].split_whitespace().count(), 50);
        assert!(parts[1].starts_with("w100 "));
    }

    #[test]
    fn test_overlap_repeats_words() {
        let text = numbered_words(150);
        let chunker = Chunker::new(100, 20);
        let doc = Document::new("a.pdf", text.clone());
        let frags = chunker.fragments(&doc);
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].overlap_words, 0);
        assert_eq!(frags[1].overlap_words, 20);
        assert!(frags[1].text.starts_with("w80 "));
        assert_eq!(reconstruct(&frags), collapse_whitespace(&text));
    }

    #[test]
    fn test_paragraphs_packed_until_window() {
        let text = "Uno dos tres.\n\nCuatro cinco.\n\nSeis siete ocho nueve.";
        let parts = Chunker::new(5, 0).split(text);
        assert_eq!(parts, vec!["Uno dos tres.\n\nCuatro cinco.", "Seis siete ocho nueve."]);
    }

    #[test]
    fn test_reconstruction_with_mixed_paragraphs() {
        let long = numbered_words(230);
        let text = format!("Intro corta.\r\n\r\n{}\n\n\n\nFinal  del   texto.", long);
        for overlap in [0, 7, 40] {
            let doc = Document::new("mix.pdf", text.clone());
            let frags = Chunker::new(50, overlap).fragments(&doc);
            assert_eq!(reconstruct(&frags), collapse_whitespace(&text), "overlap {}", overlap);
        }
    }

    #[test]
    fn test_ordinals_contiguous() {
        let doc = Document::new("d.pdf", numbered_words(1000));
        let frags = Chunker::new(64, 8).fragments(&doc);
        for (i, f) in frags.iter().enumerate() {
            assert_eq!(f.id.ordinal, i);
            assert_eq!(f.id.document, "d.pdf");
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alfa\n\nBeta gamma\n\nDelta épsilon zeta eta theta";
        let c = Chunker::new(3, 1);
        assert_eq!(c.split(text), c.split(text));
    }

    #[test]
    fn test_overlap_capped_below_window() {
        let c = Chunker::new(10, 50);
        assert_eq!(c.overlap_words(), 9);
        let c = Chunker::new(0, 0);
        assert_eq!(c.window_words(), 1);
    }
}
