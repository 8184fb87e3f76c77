//! 已建立的双向字节流及其读写半部。

use std::io;

use bytes::Bytes;
use flint_core::{Endpoint, Scheme, SocketError};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UnixStream, tcp, unix};

use crate::frame;

/// 一条已建立的传输连接。
///
/// 读写以帧为单位（见 [`frame`]）；需要在独立任务中分别驱动收发时，
/// 用 [`into_split`](Self::into_split) 拆成两个半部。
#[derive(Debug)]
pub enum TransportStream {
    /// TCP 连接。
    Tcp(TcpStream),
    /// Unix domain socket 连接。
    Ipc(UnixStream),
}

impl TransportStream {
    /// 向精确端点发起一次建连尝试。
    ///
    /// 通配符端点在此同步拒绝（`WildcardNotAllowed`）——通配符形式只在
    /// bind 侧有意义。本函数不重试；重试节奏由上层连接器掌握。
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, SocketError> {
        if endpoint.is_wildcard() {
            return Err(SocketError::wildcard_not_allowed(endpoint.canonical()));
        }
        match endpoint.scheme() {
            Scheme::Tcp => {
                let stream = TcpStream::connect(endpoint.body())
                    .await
                    .map_err(SocketError::Io)?;
                Ok(Self::Tcp(stream))
            }
            Scheme::Ipc => {
                let path = endpoint.ipc_path().ok_or_else(|| {
                    SocketError::invalid_address(endpoint.canonical(), "malformed ipc body")
                })?;
                let stream = UnixStream::connect(path).await.map_err(SocketError::Io)?;
                Ok(Self::Ipc(stream))
            }
        }
    }

    /// 发送一帧。
    pub async fn send_frame(&mut self, payload: &Bytes) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => frame::write_frame(stream, payload).await,
            Self::Ipc(stream) => frame::write_frame(stream, payload).await,
        }
    }

    /// 接收一帧；对端干净关闭返回 `None`。
    pub async fn recv_frame(&mut self) -> io::Result<Option<Bytes>> {
        match self {
            Self::Tcp(stream) => frame::read_frame(stream).await,
            Self::Ipc(stream) => frame::read_frame(stream).await,
        }
    }

    /// 拆成可分属两个任务的读半部与写半部。
    pub fn into_split(self) -> (StreamReader, StreamWriter) {
        match self {
            Self::Tcp(stream) => {
                let (r, w) = stream.into_split();
                (StreamReader::Tcp(r), StreamWriter::Tcp(w))
            }
            Self::Ipc(stream) => {
                let (r, w) = stream.into_split();
                (StreamReader::Ipc(r), StreamWriter::Ipc(w))
            }
        }
    }
}

/// 流的读半部，逐帧消费入站消息。
#[derive(Debug)]
pub enum StreamReader {
    /// TCP 读半部。
    Tcp(tcp::OwnedReadHalf),
    /// ipc 读半部。
    Ipc(unix::OwnedReadHalf),
}

impl StreamReader {
    /// 接收一帧；对端干净关闭返回 `None`。
    pub async fn recv_frame(&mut self) -> io::Result<Option<Bytes>> {
        match self {
            Self::Tcp(half) => frame::read_frame(half).await,
            Self::Ipc(half) => frame::read_frame(half).await,
        }
    }
}

/// 流的写半部，逐帧投递出站消息。Drop 时关闭写方向。
#[derive(Debug)]
pub enum StreamWriter {
    /// TCP 写半部。
    Tcp(tcp::OwnedWriteHalf),
    /// ipc 写半部。
    Ipc(unix::OwnedWriteHalf),
}

impl StreamWriter {
    /// 发送一帧。
    pub async fn send_frame(&mut self, payload: &Bytes) -> io::Result<()> {
        match self {
            Self::Tcp(half) => frame::write_frame(half, payload).await,
            Self::Ipc(half) => frame::write_frame(half, payload).await,
        }
    }

    /// 显式关闭写方向，向对端宣告不再有数据。
    pub async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(half) => half.shutdown().await,
            Self::Ipc(half) => half.shutdown().await,
        }
    }
}
