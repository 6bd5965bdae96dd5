//! 2-byte big-endian length-prefixed framing (SPEC_FULL.md §6.1/§6.3), used
//! over the TLS-wrapped client protocol stream. Same framing as
//! `forge-node::wire`/`forge-gateway::wire`, kept as an independent copy
//! since the app server has no runtime dependency on either crate.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{PipelineError, Result};

pub const MAX_FRAME_BYTES: usize = 65_535;

pub async fn read_framed<R: AsyncReadExt + Unpin>(stream: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            PipelineError::ShortRead
        } else {
            PipelineError::Io(e)
        }
    })?;
    let len = u16::from_be_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            PipelineError::ShortRead
        } else {
            PipelineError::Io(e)
        }
    })?;
    Ok(payload)
}

pub async fn write_framed<W: AsyncWriteExt + Unpin>(stream: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(PipelineError::FrameTooLarge(payload.len()));
    }
    let len = payload.len() as u16;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trips_a_frame() {
        let (mut a, mut b) = duplex(1024);
        write_framed(&mut a, b"BUY|deer|alice|25.0").await.unwrap();
        let got = read_framed(&mut b).await.unwrap();
        assert_eq!(got, b"BUY|deer|alice|25.0");
    }
}
