//! 被动监听：一次成功 bind 对应一个监听器实例。

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use flint_core::{Endpoint, Scheme, SocketError};
use tokio::net::{TcpListener, UnixListener};

use crate::stream::TransportStream;

/// ipc 通配符路径的进程内序号，保证同进程多次分配不重名。
static IPC_PATH_SEQ: AtomicU64 = AtomicU64::new(0);

/// 传输层监听器：一个实例独占一个具体绑定地址。
///
/// # 教案式说明
/// - **意图 (Why)**：把“通配符如何变成具体地址”收敛在 bind 这一个入口，
///   上层端点表只与解析后的具体地址字符串打交道；
/// - **契约 (What)**：
///   - [`bind`](Self::bind) 返回监听器与解析出的具体地址：精确地址原样
///     绑定（冲突报 `AddressInUse`），tcp 通配符经 0 端口绑定后读回系统
///     分配的端口，ipc 通配符使用新生成的唯一路径；
///   - [`accept`](Self::accept) 每次返回一条已完成连接的流，本身不含
///     循环——后台接受循环由上层任务驱动；
///   - Drop 即停止接受并释放地址，ipc 连带删除套接字文件；已接受的流
///     不受 Drop 影响。
/// - **取舍 (Trade-offs)**：解析出的地址以字符串返回而非结构化类型，
///   因为它的唯一去向是端点表键与 last-endpoint 查询，字符串即契约。
#[derive(Debug)]
pub enum TransportListener {
    /// TCP 监听。
    Tcp(TcpListener),
    /// Unix domain socket 监听，保留路径用于 Drop 清理。
    Ipc {
        /// 底层监听器。
        listener: UnixListener,
        /// 绑定的套接字文件路径。
        path: PathBuf,
    },
}

impl TransportListener {
    /// 绑定端点，返回监听器与解析出的具体地址。
    pub async fn bind(endpoint: &Endpoint) -> Result<(Self, String), SocketError> {
        match endpoint.scheme() {
            Scheme::Tcp => {
                let (host, port) = endpoint
                    .tcp_host_port()
                    .ok_or_else(|| {
                        SocketError::invalid_address(endpoint.canonical(), "malformed tcp body")
                    })?;
                let target = format!("{}:{}", host, port.unwrap_or(0));
                let listener = TcpListener::bind(&target)
                    .await
                    .map_err(|err| SocketError::map_bind_error(&endpoint.canonical(), err))?;
                let local = listener.local_addr().map_err(SocketError::Io)?;
                let resolved = format!("tcp://{local}");
                tracing::debug!(endpoint = %endpoint, %resolved, "tcp listener bound");
                Ok((Self::Tcp(listener), resolved))
            }
            Scheme::Ipc => {
                let path = match endpoint.ipc_path() {
                    Some(p) => PathBuf::from(p),
                    None => unique_ipc_path(),
                };
                let listener = UnixListener::bind(&path)
                    .map_err(|err| SocketError::map_bind_error(&endpoint.canonical(), err))?;
                let resolved = format!("ipc://{}", path.display());
                tracing::debug!(endpoint = %endpoint, %resolved, "ipc listener bound");
                Ok((Self::Ipc { listener, path }, resolved))
            }
        }
    }

    /// 接受一条入站连接。
    pub async fn accept(&self) -> io::Result<TransportStream> {
        match self {
            Self::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                tracing::debug!(%peer, "tcp connection accepted");
                Ok(TransportStream::Tcp(stream))
            }
            Self::Ipc { listener, .. } => {
                let (stream, _addr) = listener.accept().await?;
                tracing::debug!("ipc connection accepted");
                Ok(TransportStream::Ipc(stream))
            }
        }
    }
}

impl Drop for TransportListener {
    fn drop(&mut self) {
        if let Self::Ipc { path, .. } = self {
            // 套接字文件随监听器一同回收，残留文件会让下次精确绑定误报占用。
            let _ = std::fs::remove_file(&path);
        }
    }
}

/// 为 ipc 通配符生成全局唯一的临时套接字路径。
fn unique_ipc_path() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let seq = IPC_PATH_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("flint-{}-{seq}-{nanos:x}.sock", std::process::id()))
}
