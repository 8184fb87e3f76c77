//! 连接端点的后台重试循环与状态机。
//!
//! connect 的同步部分只做校验与注册；建连、失败吸收、断线重连全部在
//! 这里的循环内进行。瞬时建连失败从不回流到 connect 的调用方——它们
//! 进入重试态并按指数退避继续尝试，直到端点被显式拆除。

use flint_core::{Backoff, Endpoint, SocketConfig};
use flint_transport::TransportStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::command::Command;
use crate::context::ReleaseGuard;
use crate::endpoint_table::EndpointId;
use crate::pipe::Pipe;
use crate::session;

/// 连接器在任一时刻恰处其一的四个状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectorState {
    /// 正在发起一次建连尝试。
    Connecting,
    /// 握手完成，恰好拥有一条存活管道。
    Connected,
    /// 建连失败或对端断开，等待退避后重试。
    Retrying,
    /// 已被显式拆除。
    Closed,
}

impl ConnectorState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Retrying => "retrying",
            Self::Closed => "closed",
        }
    }
}

/// 为一个已注册的连接端点启动重试循环。
pub(crate) fn spawn_connect_loop(
    owner: EndpointId,
    endpoint: Endpoint,
    config: SocketConfig,
    cmd_tx: mpsc::Sender<Command>,
    guard: ReleaseGuard,
    stop_rx: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(connect_loop(owner, endpoint, config, cmd_tx, guard, stop_rx))
}

/// 重试循环本体：`connecting → connected → retrying → connecting …`，
/// 停止信号把任意状态带向 `closed`。
///
/// 握手成功即组建管道并以 `PipeAttached` 汇入核心，随后等待会话入口
/// 半部结束（对端断开或管道被核心摘除）；结束后退避重连。连接成功会
/// 复位退避节奏。
async fn connect_loop(
    owner: EndpointId,
    endpoint: Endpoint,
    config: SocketConfig,
    cmd_tx: mpsc::Sender<Command>,
    guard: ReleaseGuard,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut backoff = Backoff::new(&config.reconnect);
    let mut state = ConnectorState::Connecting;
    tracing::debug!(%owner, endpoint = %endpoint, state = state.as_str(), "connector started");
    'lifecycle: loop {
        let stream = tokio::select! {
            _ = &mut stop_rx => {
                state = ConnectorState::Closed;
                break 'lifecycle;
            }
            attempt = TransportStream::connect(&endpoint) => match attempt {
                Ok(stream) => stream,
                Err(err) => {
                    let delay = backoff.next_delay();
                    state = ConnectorState::Retrying;
                    tracing::warn!(
                        %owner,
                        endpoint = %endpoint,
                        %err,
                        failures = backoff.failures(),
                        ?delay,
                        state = state.as_str(),
                        "connect attempt failed"
                    );
                    tokio::select! {
                        _ = &mut stop_rx => {
                            state = ConnectorState::Closed;
                            break 'lifecycle;
                        }
                        _ = tokio::time::sleep(delay) => {
                            state = ConnectorState::Connecting;
                            tracing::debug!(%owner, state = state.as_str(), "backoff elapsed");
                            continue 'lifecycle;
                        }
                    }
                }
            }
        };

        backoff.reset();
        state = ConnectorState::Connected;
        let (pipe, ends) = Pipe::pair(owner, &config);
        let pipe_id = pipe.id();
        let mut ingress = session::spawn(stream, ends, pipe_id, cmd_tx.clone(), guard.clone());
        if cmd_tx.send(Command::PipeAttached { owner, pipe }).await.is_err() {
            state = ConnectorState::Closed;
            break 'lifecycle;
        }
        tracing::info!(%owner, endpoint = %endpoint, pipe = %pipe_id, state = state.as_str(), "connection established");

        tokio::select! {
            _ = &mut stop_rx => {
                state = ConnectorState::Closed;
                break 'lifecycle;
            }
            _ = &mut ingress => {
                state = ConnectorState::Retrying;
                tracing::info!(%owner, endpoint = %endpoint, state = state.as_str(), "connection lost");
            }
        }
    }
    tracing::debug!(%owner, endpoint = %endpoint, state = state.as_str(), "connector closed");
}
