//! Length-prefixed frame codec
//!
//! Every socket in the pipeline carries frames of the form
//! `[u32 big-endian length][UTF-8 payload]`. There is no version byte,
//! checksum or escaping; the receiver trusts the prefix.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// Size of the length prefix in bytes
pub const PREFIX_LEN: usize = 4;

/// Default receive limit applied by the services (16 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Encode `text` as a single frame
///
/// # Errors
///
/// Returns error if the payload does not fit a 32-bit length prefix
pub fn encode(text: &str) -> Result<Vec<u8>> {
    let payload = text.as_bytes();
    let len = u32::try_from(payload.len()).map_err(|_| Error::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Read one frame from `reader`
///
/// Loops over short reads until the prefix and the full payload are
/// available. Returns `Ok(None)` when the stream closes before a complete
/// frame arrives, including a close in the middle of a frame.
///
/// # Errors
///
/// Returns error on a transport failure, a prefix larger than `max_len`,
/// or a payload that is not valid UTF-8
pub async fn read_frame<R>(reader: &mut R, max_len: Option<usize>) -> Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; PREFIX_LEN];
    if !read_full(reader, &mut prefix).await? {
        return Ok(None);
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if let Some(max) = max_len {
        if len > max {
            return Err(Error::FrameTooLarge { len, max });
        }
    }

    let mut payload = vec![0u8; len];
    if !read_full(reader, &mut payload).await? {
        tracing::debug!(expected = len, "stream closed mid-frame");
        return Ok(None);
    }

    String::from_utf8(payload)
        .map(Some)
        .map_err(|e| Error::Protocol(format!("frame payload is not UTF-8: {e}")))
}

/// Encode `text` and write it to `writer` in one call
///
/// # Errors
///
/// Returns error if encoding or the write fails
pub async fn write_frame<W>(writer: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(text)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Fill `buf` completely; `false` means the peer closed first
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<bool>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}
