//! Chunk model — splitting a file into randomly-sized pieces and deriving
//! the reassembled output path.
//!
//! Chunks partition the text in order: concatenating them (before reversal)
//! reconstitutes the original content exactly. Lengths are drawn uniformly
//! from `[lmin, lmax]` *characters*; only the final chunk may be shorter.

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::wire::MAX_PAYLOAD;

/// Errors from chunk splitting.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid chunk bounds: need 1 <= lmin <= lmax, got lmin={lmin} lmax={lmax}")]
    BadBounds { lmin: usize, lmax: usize },

    #[error("lmax={0} characters can exceed the {}-byte frame limit", MAX_PAYLOAD)]
    BoundTooLarge(usize),
}

/// Split `content` into chunks of `lmin..=lmax` characters each, the final
/// chunk possibly shorter. The `rng` is injected so tests can seed it.
pub fn split_chunks(
    content: &str,
    lmin: usize,
    lmax: usize,
    rng: &mut impl Rng,
) -> Result<Vec<String>, ChunkError> {
    if lmin < 1 || lmin > lmax {
        return Err(ChunkError::BadBounds { lmin, lmax });
    }
    // Character counts bound the encoded byte length only for ASCII; the
    // per-frame byte cap is still enforced at send time. Reject bounds that
    // could never fit even as ASCII.
    if lmax > MAX_PAYLOAD {
        return Err(ChunkError::BoundTooLarge(lmax));
    }

    let mut chunks = Vec::new();
    let mut rest = content;
    while !rest.is_empty() {
        let want = rng.gen_range(lmin..=lmax);
        let cut = rest
            .char_indices()
            .nth(want)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(cut);
        chunks.push(head.to_string());
        rest = tail;
    }
    Ok(chunks)
}

/// Output path for the reassembled reversed text:
/// same directory, `<base name>_reversed.txt`.
pub fn reversed_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}_reversed.txt"))
}
