//! 连接会话：一条存活连接的入站/出站两个半部任务。
//!
//! 会话不持有套接字状态，只桥接传输流与管道通道：入口任务逐帧读入并
//! 写进入站队列，出口任务从出站队列取出并逐帧写出。管道被核心摘除时
//! 两个半部分别经由通道关闭感知并退出；对端断开则以 `PipeDetached`
//! 事件上报，由核心完成幂等摘除。

use bytes::Bytes;
use flint_transport::{StreamReader, StreamWriter, TransportStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::command::Command;
use crate::context::ReleaseGuard;
use crate::pipe::{PipeId, SessionEnds};

/// 为一条已建立的连接启动会话任务，返回入口半部的句柄。
///
/// 入口半部在对端断开或管道被摘除时结束，连接器以此感知连接丢失；
/// 出口半部独立运行，排空出站队列后关闭写方向退出。
pub(crate) fn spawn(
    stream: TransportStream,
    ends: SessionEnds,
    pipe: PipeId,
    cmd_tx: mpsc::Sender<Command>,
    guard: ReleaseGuard,
) -> JoinHandle<()> {
    let (reader, writer) = stream.into_split();
    let SessionEnds { in_tx, out_rx } = ends;
    tokio::spawn(egress(writer, out_rx, pipe, cmd_tx.clone(), guard.clone()));
    tokio::spawn(ingress(reader, in_tx, pipe, cmd_tx, guard))
}

/// 入站半部：传输帧 → 入站队列。
///
/// 入站队列满时 `send` 挂起，读取随之停止——接收侧高水位由此向对端
/// 施加背压。队列的接收端被核心丢弃（管道摘除）后挂起的 `send` 立即
/// 失败，任务退出。
async fn ingress(
    mut reader: StreamReader,
    in_tx: mpsc::Sender<Bytes>,
    pipe: PipeId,
    cmd_tx: mpsc::Sender<Command>,
    _guard: ReleaseGuard,
) {
    loop {
        tokio::select! {
            _ = in_tx.closed() => {
                tracing::debug!(%pipe, "pipe detached, ingress exits");
                break;
            }
            frame = reader.recv_frame() => match frame {
                Ok(Some(payload)) => {
                    if in_tx.send(payload).await.is_err() {
                        break;
                    }
                    let _ = cmd_tx.send(Command::PipeReadable { pipe }).await;
                }
                Ok(None) => {
                    tracing::debug!(%pipe, "peer closed");
                    break;
                }
                Err(err) => {
                    tracing::debug!(%pipe, %err, "read failed");
                    break;
                }
            }
        }
    }
    // 摘除是幂等的：管道可能已被核心先行移除。
    let _ = cmd_tx.send(Command::PipeDetached { pipe }).await;
}

/// 出站半部：出站队列 → 传输帧。
///
/// 队列关闭后 `recv` 先排空剩余消息再返回 `None`，此时关闭写方向向
/// 对端宣告结束。每消费一条消息上报一次 `PipeWritable`，唤醒因高水位
/// 挂起的发送者。
async fn egress(
    mut writer: StreamWriter,
    mut out_rx: mpsc::Receiver<Bytes>,
    pipe: PipeId,
    cmd_tx: mpsc::Sender<Command>,
    _guard: ReleaseGuard,
) {
    while let Some(payload) = out_rx.recv().await {
        if let Err(err) = writer.send_frame(&payload).await {
            tracing::debug!(%pipe, %err, "write failed");
            let _ = cmd_tx.send(Command::PipeDetached { pipe }).await;
            break;
        }
        let _ = cmd_tx.send(Command::PipeWritable { pipe }).await;
    }
    let _ = writer.shutdown().await;
}
