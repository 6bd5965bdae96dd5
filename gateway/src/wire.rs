//! 2-byte big-endian length-prefixed JSON framing (SPEC_FULL.md §6.1), used
//! for both client submissions and node confirmations on the gateway's
//! single listen port. Same framing as `forge-node::wire`, kept as an
//! independent copy since the gateway has no runtime dependency on the node
//! crate (grounded on `original_source/blockchain/gateway_server.py`'s
//! `_send_json`/`_recv_json`).

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{GatewayError, Result};

pub const MAX_FRAME_BYTES: usize = 65_535;

pub async fn read_framed<R: AsyncReadExt + Unpin>(stream: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            GatewayError::ShortRead
        } else {
            GatewayError::Io(e)
        }
    })?;
    let len = u16::from_be_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            GatewayError::ShortRead
        } else {
            GatewayError::Io(e)
        }
    })?;
    Ok(payload)
}

pub async fn write_framed<W: AsyncWriteExt + Unpin>(stream: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(GatewayError::FrameTooLarge(payload.len()));
    }
    let len = payload.len() as u16;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}
