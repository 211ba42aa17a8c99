//! Character-based text splitting
//!
//! Sizes are measured in grapheme clusters so a split never lands inside a
//! multi-byte character.

use unicode_segmentation::UnicodeSegmentation;

/// Number of characters in `text`
pub fn char_len(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Split `text` into consecutive pieces of at most `size` characters
///
/// The last piece may be shorter. Empty input yields no pieces.
pub fn split_chunks(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for grapheme in text.graphemes(true) {
        current.push_str(grapheme);
        count += 1;
        if count == size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// The first `size` characters of `text`
pub fn prefix(text: &str, size: usize) -> &str {
    match text.grapheme_indices(true).nth(size) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}
