//! Reverb wire format — on-wire framing for the chunk-reversal protocol.
//!
//! These definitions ARE the protocol. A frame is a 4-byte ASCII command
//! tag, optionally followed by a 4-digit zero-padded decimal length field
//! and exactly that many payload bytes. There are no checksums and no
//! version field; changing anything here is a breaking change.
//!
//! Payloads are UTF-8. The length field counts *encoded bytes*, not
//! characters — reversal operates on characters, which keeps multi-byte
//! sequences intact and leaves the encoded byte length unchanged, so a
//! request and its answer always carry equal length fields.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Every command tag is exactly this many bytes.
pub const TAG_LEN: usize = 4;

/// Every length field is exactly this many ASCII decimal digits.
pub const LEN_DIGITS: usize = 4;

/// Maximum payload bytes per frame — the largest value a 4-digit field holds.
pub const MAX_PAYLOAD: usize = 9999;

/// Maximum chunks per transfer — the INIT count shares the 4-digit format.
pub const MAX_CHUNKS: usize = 9999;

/// Default server port.
pub const DEFAULT_PORT: u16 = 12345;

// ── Command tags ──────────────────────────────────────────────────────────────

/// The four protocol commands.
///
/// `Init`/`Agree` form the session handshake; `Request`/`Answer` carry one
/// chunk and its reversal. There is no goodbye command — closing the TCP
/// connection ends the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// `INIT` + 4-digit chunk count. Client declares how many requests follow.
    Init,
    /// `AGRE`, bare tag. Server accepts the session.
    Agree,
    /// `REQ_` + 4-digit length + payload. Client submits one chunk.
    Request,
    /// `ANS_` + 4-digit length + payload. Server returns the reversed chunk.
    Answer,
}

impl Tag {
    /// The tag's wire representation.
    pub fn as_bytes(self) -> &'static [u8; TAG_LEN] {
        match self {
            Tag::Init => b"INIT",
            Tag::Agree => b"AGRE",
            Tag::Request => b"REQ_",
            Tag::Answer => b"ANS_",
        }
    }
}

impl TryFrom<[u8; TAG_LEN]> for Tag {
    type Error = WireError;

    fn try_from(raw: [u8; TAG_LEN]) -> Result<Self, Self::Error> {
        match &raw {
            b"INIT" => Ok(Tag::Init),
            b"AGRE" => Ok(Tag::Agree),
            b"REQ_" => Ok(Tag::Request),
            b"ANS_" => Ok(Tag::Answer),
            _ => Err(WireError::UnknownTag(raw)),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(std::str::from_utf8(self.as_bytes()).unwrap_or("????"))
    }
}

// ── Length fields ─────────────────────────────────────────────────────────────

/// Encode a value as a 4-digit zero-padded decimal field.
pub fn encode_len(value: usize) -> Result<[u8; LEN_DIGITS], WireError> {
    if value > MAX_PAYLOAD {
        return Err(WireError::FieldTooLarge(value));
    }
    let mut digits = [b'0'; LEN_DIGITS];
    let mut rest = value;
    for slot in digits.iter_mut().rev() {
        *slot = b'0' + (rest % 10) as u8;
        rest /= 10;
    }
    Ok(digits)
}

/// Parse a 4-digit decimal field. Anything but ASCII digits is rejected —
/// a malformed length must close the connection, never panic.
pub fn parse_len(digits: &[u8; LEN_DIGITS]) -> Result<usize, WireError> {
    let mut value = 0usize;
    for &d in digits {
        if !d.is_ascii_digit() {
            return Err(WireError::BadLength(*digits));
        }
        value = value * 10 + (d - b'0') as usize;
    }
    Ok(value)
}

// ── Reversal ──────────────────────────────────────────────────────────────────

/// Character-level reversal — the server's per-chunk transform.
///
/// An involution: applying it twice restores the input. Reversing
/// characters rather than bytes keeps multi-byte UTF-8 sequences valid.
pub fn reverse_chunk(s: &str) -> String {
    s.chars().rev().collect()
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise while framing or parsing wire data.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unknown command tag {:?}", String::from_utf8_lossy(.0))]
    UnknownTag([u8; TAG_LEN]),

    #[error("length field is not 4 decimal digits: {:?}", String::from_utf8_lossy(.0))]
    BadLength([u8; LEN_DIGITS]),

    #[error("value {0} does not fit a 4-digit field (max {})", MAX_PAYLOAD)]
    FieldTooLarge(usize),

    #[error("peer closed the stream mid-{0}")]
    Truncated(&'static str),

    #[error("expected {expected}, got {got}")]
    UnexpectedTag { expected: Tag, got: Tag },

    #[error("payload is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A short read inside a frame is a protocol error, not an EOF.
fn eof_as(err: std::io::Error, what: &'static str) -> WireError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        WireError::Truncated(what)
    } else {
        WireError::Io(err)
    }
}

// ── Frame I/O ─────────────────────────────────────────────────────────────────

/// Read the next command tag.
///
/// Returns `Ok(None)` on a clean close at a frame boundary. A close after
/// one to three tag bytes is a truncation error — the peer went away
/// mid-frame.
pub async fn read_tag<R>(reader: &mut R) -> Result<Option<Tag>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; TAG_LEN];
    let n = reader.read(&mut raw).await?;
    if n == 0 {
        return Ok(None);
    }
    if n < TAG_LEN {
        reader
            .read_exact(&mut raw[n..])
            .await
            .map_err(|e| eof_as(e, "command tag"))?;
    }
    Ok(Some(Tag::try_from(raw)?))
}

/// Read a tag and require a specific one. Any other reply — known or not —
/// is fatal to the exchange.
pub async fn expect_tag<R>(reader: &mut R, expected: Tag) -> Result<(), WireError>
where
    R: AsyncRead + Unpin,
{
    match read_tag(reader).await? {
        Some(tag) if tag == expected => Ok(()),
        Some(got) => Err(WireError::UnexpectedTag { expected, got }),
        None => Err(WireError::Truncated("reply tag")),
    }
}

/// Read and parse a 4-digit length (or count) field.
pub async fn read_len<R>(reader: &mut R) -> Result<usize, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut digits = [0u8; LEN_DIGITS];
    reader
        .read_exact(&mut digits)
        .await
        .map_err(|e| eof_as(e, "length field"))?;
    parse_len(&digits)
}

/// Read exactly `len` payload bytes.
///
/// Accumulation across partial socket reads is handled by `read_exact`;
/// a close before `len` bytes arrive surfaces as a truncation error rather
/// than a silently short buffer.
pub async fn read_payload<R>(reader: &mut R, len: usize) -> Result<Bytes, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| eof_as(e, "payload"))?;
    Ok(Bytes::from(buf))
}

/// Write a bare tag frame (`AGRE`).
pub async fn write_tag<W>(writer: &mut W, tag: Tag) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(tag.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Write a tag followed by a 4-digit count field (`INIT`).
pub async fn write_count<W>(writer: &mut W, tag: Tag, count: usize) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let digits = encode_len(count)?;
    writer.write_all(tag.as_bytes()).await?;
    writer.write_all(&digits).await?;
    writer.flush().await?;
    Ok(())
}

/// Write a full frame: tag, 4-digit byte length of `payload`, payload.
pub async fn write_frame<W>(writer: &mut W, tag: Tag, payload: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let digits = encode_len(payload.len())?;
    writer.write_all(tag.as_bytes()).await?;
    writer.write_all(&digits).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
