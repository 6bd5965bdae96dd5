//! 2-byte big-endian length-prefixed JSON framing (SPEC_FULL.md §6.1).
//!
//! Used by the node listener and inter-node gossip (`ping`, `node_discovery`,
//! `NEW_TRANSACTION`, `new_block`, `STOP_MINING`). The outbound block
//! confirmation to the gateway is newline-delimited instead (§6.2) and is
//! written directly in `node.rs`, not through this module. Shared (by
//! source, not by crate dependency — `forge-gateway` re-implements the same
//! framing over its own stream types) with the gateway's client-facing port.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{NodeError, Result};

pub const MAX_FRAME_BYTES: usize = 65_535;

pub async fn read_framed<R: AsyncReadExt + Unpin>(stream: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            NodeError::ShortRead
        } else {
            NodeError::Io(e)
        }
    })?;
    let len = u16::from_be_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            NodeError::ShortRead
        } else {
            NodeError::Io(e)
        }
    })?;
    Ok(payload)
}

pub async fn write_framed<W: AsyncWriteExt + Unpin>(stream: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(NodeError::FrameTooLarge(payload.len()));
    }
    let len = payload.len() as u16;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}
