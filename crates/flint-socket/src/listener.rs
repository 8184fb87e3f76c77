//! 监听端点的后台接受循环。
//!
//! bind 在核心任务内同步完成传输绑定与注册，随后由这里的循环承担
//! “接受对端”这件永不阻塞 bind 调用方的事：每完成一次握手就组建一条
//! 管道、派生会话任务，并以 `PipeAttached` 事件汇入核心。

use std::time::Duration;

use flint_core::SocketConfig;
use flint_transport::TransportListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::command::Command;
use crate::context::ReleaseGuard;
use crate::endpoint_table::EndpointId;
use crate::pipe::Pipe;
use crate::session;

/// 瞬时接受失败后的退让间隔，防止对致命错误热循环。
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// 为一个已绑定的监听器启动接受循环。
pub(crate) fn spawn_accept_loop(
    owner: EndpointId,
    listener: TransportListener,
    config: SocketConfig,
    cmd_tx: mpsc::Sender<Command>,
    guard: ReleaseGuard,
    stop_rx: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(accept_loop(owner, listener, config, cmd_tx, guard, stop_rx))
}

/// 接受循环本体。
///
/// 停止信号（unbind、套接字关闭）到达即退出；监听器随任务结束被丢弃，
/// 地址在此刻释放（ipc 连带清理套接字文件）——这是拆除的异步尾巴，
/// 上下文终止靠释放守卫等到它。已接受的管道不受监听器释放影响，
/// 由各自的会话独立拆除。
async fn accept_loop(
    owner: EndpointId,
    listener: TransportListener,
    config: SocketConfig,
    cmd_tx: mpsc::Sender<Command>,
    guard: ReleaseGuard,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            accepted = listener.accept() => match accepted {
                Ok(stream) => {
                    let (pipe, ends) = Pipe::pair(owner, &config);
                    let pipe_id = pipe.id();
                    session::spawn(stream, ends, pipe_id, cmd_tx.clone(), guard.clone());
                    if cmd_tx.send(Command::PipeAttached { owner, pipe }).await.is_err() {
                        // 核心任务已消失，套接字在关闭路上。
                        break;
                    }
                    tracing::info!(%owner, pipe = %pipe_id, "inbound connection accepted");
                }
                Err(err) => {
                    tracing::warn!(%owner, %err, "accept failed");
                    tokio::select! {
                        _ = &mut stop_rx => break,
                        _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                    }
                }
            }
        }
    }
    drop(listener);
    tracing::info!(%owner, "listener released");
}
