//! Chunked playback of a byte source under the send gate.

use std::path::Path;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use ariwire_core::error::{AriWireError, Result};
use ariwire_core::protocol::media::MediaCommand;

use crate::media::gate::SendGate;
use crate::media::verify::AudioLog;
use crate::transport::Outbound;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub frames: usize,
    pub bytes: usize,
}

/// Stream `source` as binary frames of `chunk` bytes (the last may be
/// shorter), framed by `START_MEDIA_BUFFERING` / `STOP_MEDIA_BUFFERING name`.
///
/// The gate is taken per chunk, so an XOFF lands between chunks.
pub async fn play<R>(
    mut source: R,
    name: &str,
    out: &Outbound,
    gate: &SendGate,
    chunk: usize,
    mirror: Option<&AudioLog>,
) -> Result<PlaybackReport>
where
    R: AsyncRead + Unpin,
{
    if chunk == 0 {
        return Err(AriWireError::BadRequest("playback chunk size must be positive".into()));
    }

    out.text(MediaCommand::StartBuffering.to_string()).await?;

    let mut report = PlaybackReport::default();
    loop {
        let data = read_chunk(&mut source, chunk).await?;
        if data.is_empty() {
            break;
        }

        let _permit = gate.acquire().await?;
        if let Some(log) = mirror {
            log.append(&data);
        }
        report.frames += 1;
        report.bytes += data.len();
        out.binary(data).await?;
    }

    out.text(MediaCommand::StopBuffering(name.to_string()).to_string())
        .await?;
    tracing::debug!(%name, frames = report.frames, bytes = report.bytes, "playback finished");
    Ok(report)
}

/// `play` over a file; the buffering name is the file name.
pub async fn play_file(
    path: &Path,
    out: &Outbound,
    gate: &SendGate,
    chunk: usize,
    mirror: Option<&AudioLog>,
) -> Result<PlaybackReport> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| AriWireError::BadRequest(format!("open {}: {e}", path.display())))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    play(file, &name, out, gate, chunk, mirror).await
}

/// Read up to `chunk` bytes; short only at end of input.
async fn read_chunk<R>(source: &mut R, chunk: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::zeroed(chunk);
    let mut filled = 0;
    while filled < chunk {
        let n = source
            .read(&mut buf[filled..])
            .await
            .map_err(|e| AriWireError::Internal(format!("playback read: {e}")))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf.freeze())
}
