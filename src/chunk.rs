//! Paragraph-aware chunker with overlap.
//!
//! Document text is split on blank lines, paragraphs are packed greedily
//! into chunks of at most `chunk_size` tokens, and each new chunk is
//! seeded with the last `overlap` tokens of the previous one so that a
//! sentence cut at a boundary is still retrievable from either side.
//!
//! Token counts are approximated as four characters per token.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Document};

const CHARS_PER_TOKEN: usize = 4;

/// Split a document into contiguous chunks, indexed from 0.
///
/// Whitespace-only text produces no chunks.
pub fn chunk_document(doc: &Document, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    chunk_text(&doc.text, chunk_size, overlap)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: doc.id.clone(),
            file_name: doc.file_name.clone(),
            index,
            hash: sha256_hex(&text),
            text,
        })
        .collect()
}

/// Split raw text into chunk strings.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let max_chars = chunk_size.max(1) * CHARS_PER_TOKEN;
    let overlap_chars = overlap.min(chunk_size.saturating_sub(1)) * CHARS_PER_TOKEN;

    let mut pieces = Vec::new();
    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        if para.len() <= max_chars {
            pieces.push(para);
        } else {
            pieces.extend(hard_split(para, max_chars));
        }
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        if !current.is_empty() && current.len() + 2 + piece.len() > max_chars {
            let tail = overlap_tail(&current, overlap_chars).to_string();
            chunks.push(std::mem::take(&mut current));
            if !tail.is_empty() && tail.len() + 1 + piece.len() <= max_chars {
                current.push_str(&tail);
                current.push(' ');
            }
            current.push_str(piece);
            continue;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(piece);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split an oversized paragraph at whitespace, never inside a character.
fn hard_split(mut text: &str, max_chars: usize) -> Vec<&str> {
    let mut out = Vec::new();
    while text.len() > max_chars {
        let limit = floor_char_boundary(text, max_chars);
        let cut = text[..limit]
            .rfind(char::is_whitespace)
            .filter(|&pos| pos > 0)
            .unwrap_or(limit);
        let cut = if cut == 0 {
            text.char_indices().nth(1).map(|(i, _)| i).unwrap_or(text.len())
        } else {
            cut
        };
        let piece = text[..cut].trim();
        if !piece.is_empty() {
            out.push(piece);
        }
        text = text[cut..].trim_start();
    }
    if !text.is_empty() {
        out.push(text);
    }
    out
}

/// Last `max_chars` bytes of `text`, starting at a word boundary.
fn overlap_tail(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    if text.len() <= max_chars {
        return text;
    }
    let mut start = text.len() - max_chars;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    let tail = &text[start..];
    match tail.find(char::is_whitespace) {
        Some(pos) => tail[pos..].trim_start(),
        None => tail,
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

pub(crate) fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
