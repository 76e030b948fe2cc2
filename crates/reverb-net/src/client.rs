//! Client transfer driver — one INIT/AGRE handshake, then a strictly
//! synchronous REQ_/ANS_ exchange per chunk. Never more than one request
//! is outstanding.

use tokio::io::{AsyncRead, AsyncWrite};

use reverb_core::wire::{self, Tag, WireError, MAX_CHUNKS, MAX_PAYLOAD};

/// Errors that abort a transfer. On any of these the caller must not write
/// an output file.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("file splits into {0} chunks, but the 4-digit INIT field caps a transfer at {}", MAX_CHUNKS)]
    TooManyChunks(usize),

    #[error("chunk {index} encodes to {bytes} bytes, but a frame carries at most {}", MAX_PAYLOAD)]
    ChunkTooLarge { index: usize, bytes: usize },

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Drive a complete transfer over an established stream.
///
/// `on_answer` is called with each reversed chunk as it arrives, numbered
/// from 1; the concatenation in request order is returned at the end.
pub async fn run_transfer<S, F>(
    stream: &mut S,
    chunks: &[String],
    mut on_answer: F,
) -> Result<String, TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(usize, &str),
{
    if chunks.len() > MAX_CHUNKS {
        return Err(TransferError::TooManyChunks(chunks.len()));
    }
    for (i, chunk) in chunks.iter().enumerate() {
        if chunk.len() > MAX_PAYLOAD {
            return Err(TransferError::ChunkTooLarge {
                index: i + 1,
                bytes: chunk.len(),
            });
        }
    }

    // Handshake. Anything but a bare AGRE is fatal.
    wire::write_count(stream, Tag::Init, chunks.len()).await?;
    wire::expect_tag(stream, Tag::Agree).await?;

    let mut assembled = String::new();
    for (index, chunk) in chunks.iter().enumerate() {
        wire::write_frame(stream, Tag::Request, chunk.as_bytes()).await?;

        wire::expect_tag(stream, Tag::Answer).await?;
        let len = wire::read_len(stream).await?;
        let payload = wire::read_payload(stream, len).await?;
        let text = std::str::from_utf8(&payload).map_err(WireError::from)?;

        on_answer(index + 1, text);
        assembled.push_str(text);
    }

    Ok(assembled)
}
