//! Sentence-boundary query chunker.
//!
//! Splits free-form query text into chunks of at most `max_len` characters so
//! each chunk fits comfortably in the text encoder's context. Splitting occurs
//! on sentence-terminating punctuation (ASCII and full-width) to keep each
//! chunk semantically whole.
//!
//! # Algorithm
//!
//! 1. Split the text on `. ! ? ;` and their full-width forms `。！？；．`.
//! 2. Trim each candidate sentence and drop empty ones.
//! 3. Accumulate sentences into a buffer, each followed by [`CHUNK_TERMINATOR`].
//! 4. When adding the next sentence would push the buffer past `max_len`
//!    characters, flush the buffer as a chunk and start a new one.
//! 5. Flush whatever remains.
//!
//! A sentence longer than `max_len` is emitted whole rather than cut
//! mid-sentence. Lengths are counted in `char`s, not bytes, so CJK text is
//! budgeted the same way as ASCII.
//!
//! # Example
//!
//! ```rust
//! use framesift_core::chunk::segment;
//!
//! let chunks = segment("A cat sleeps. A dog barks!", 60);
//! assert_eq!(chunks, vec!["A cat sleeps。A dog barks。"]);
//! ```

/// Mark appended to every sentence placed in a chunk.
pub const CHUNK_TERMINATOR: char = '。';

/// Punctuation that ends a sentence.
pub const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', ';', '。', '！', '？', '；', '．'];

/// Returns true if `c` ends a sentence.
pub fn is_sentence_terminator(c: char) -> bool {
    SENTENCE_TERMINATORS.contains(&c)
}

/// Split `text` into ordered chunks of at most `max_len` characters.
///
/// # Guarantees
///
/// - Non-empty output whenever `text` has a non-whitespace character.
/// - Chunk order matches source order.
/// - A chunk exceeds `max_len` only when it holds a single sentence that is
///   itself longer than `max_len`.
pub fn segment(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;

    for sentence in text.split(is_sentence_terminator) {
        let trimmed = sentence.trim();
        if trimmed.is_empty() {
            continue;
        }

        let added = trimmed.chars().count() + 1;
        if buf_chars > 0 && buf_chars + added > max_len {
            chunks.push(std::mem::take(&mut buf));
            buf_chars = 0;
        }

        buf.push_str(trimmed);
        buf.push(CHUNK_TERMINATOR);
        buf_chars += added;
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }

    // Punctuation-only input ("?!") still has content worth embedding.
    if chunks.is_empty() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            chunks.push(format!("{}{}", trimmed, CHUNK_TERMINATOR));
        }
    }

    chunks
}
