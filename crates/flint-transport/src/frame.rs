//! 长度前缀帧编解码。
//!
//! 帧格式为 `[长度:4 字节大端][负载]`。该格式只服务于“把字节流切成完整
//! 消息”这一个目的，不承载类型或路由信息；上层消息语义由套接字模式决定。

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// 单帧负载长度上限。超限的写入以 `InvalidInput` 拒绝，读到超限头部视为
/// 流已损坏，以 `InvalidData` 终止。
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// 将一条消息编码为帧并完整写入。
pub async fn write_frame<W>(writer: &mut W, payload: &Bytes) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "frame payload exceeds MAX_FRAME_LEN",
        ));
    }
    let header = (payload.len() as u32).to_be_bytes();
    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// 读取一个完整帧。
///
/// 对端在帧边界干净关闭时返回 `Ok(None)`；头部声明的长度超过
/// [`MAX_FRAME_LEN`] 或负载中途断流时返回错误。
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame header exceeds MAX_FRAME_LEN",
        ));
    }

    let mut payload = BytesMut::zeroed(len);
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload.freeze()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_roundtrip_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(256);
        let payload = Bytes::from_static(b"ABC");
        write_frame(&mut a, &payload).await.expect("write");

        let read = read_frame(&mut b).await.expect("read");
        assert_eq!(read, Some(payload));
    }

    #[tokio::test]
    async fn empty_payload_is_a_valid_frame() {
        let (mut a, mut b) = tokio::io::duplex(16);
        write_frame(&mut a, &Bytes::new()).await.expect("write");
        let read = read_frame(&mut b).await.expect("read");
        assert_eq!(read, Some(Bytes::new()));
    }

    #[tokio::test]
    async fn clean_close_reads_as_none() {
        let (a, mut b) = tokio::io::duplex(16);
        drop(a);
        let read = read_frame(&mut b).await.expect("read");
        assert_eq!(read, None);
    }

    #[tokio::test]
    async fn oversized_header_is_invalid_data() {
        let (mut a, mut b) = tokio::io::duplex(16);
        let bogus = (MAX_FRAME_LEN as u32 + 1).to_be_bytes();
        tokio::io::AsyncWriteExt::write_all(&mut a, &bogus)
            .await
            .expect("write header");
        let err = read_frame(&mut b).await.expect_err("must reject");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
