//! Native messaging wire format: a 32-bit length in native byte order
//! followed by that many bytes of UTF-8 JSON.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::TransportError;

/// Largest message a native host may send back (browsers enforce 1 MiB).
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message)?;
    let len = u32::try_from(body.len()).map_err(|_| TransportError::TooLarge(body.len()))?;
    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message. `Ok(None)` means the peer closed the stream before a
/// length prefix arrived.
pub async fn read_message<R>(reader: &mut R, limit: usize) -> Result<Option<Value>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_ne_bytes(prefix) as usize;
    if len > limit {
        return Err(TransportError::TooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::Disconnected
        } else {
            e.into()
        }
    })?;
    Ok(Some(serde_json::from_slice(&body)?))
}
