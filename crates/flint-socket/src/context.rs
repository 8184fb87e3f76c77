//! 进程级上下文：套接字的创建入口与终止时的后台释放排水。

use std::sync::Arc;

use flint_core::{SocketConfig, SocketError};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::command::Command;
use crate::core;
use crate::socket::{Socket, SocketKind};

/// 后台释放步骤的守卫。
///
/// 套接字核心任务、监听/连接循环与每条连接的会话半部各持有一个克隆；
/// 任务退出即守卫释放。通道只用其关闭语义，从不传递消息——全部守卫
/// 释放后接收端读到流结束，终止排水即完成。
#[derive(Debug, Clone)]
pub(crate) struct ReleaseGuard {
    _permit: mpsc::Sender<()>,
}

/// flint 的进程级上下文。
///
/// # 教案式说明
/// - **意图 (Why)**：把“还有哪些后台释放在途”收敛为一个可等待的排水
///   点。unbind/disconnect 的传输资源释放是异步尾巴，单个调用不等它；
///   唯一必须等的是整体终止——端口与套接字文件要在 [`terminate`]
///   返回前全部归还。
/// - **契约 (What)**：
///   - [`socket`](Self::socket) / [`socket_with_config`](Self::socket_with_config)
///     创建套接字并登记其命令邮箱；终止后再创建报 `Closed`；
///   - [`terminate`](Self::terminate) 先逐个关闭在册套接字（等待各核心
///     任务确认拆除完成），再阻塞等待所有释放守卫归还；重复调用是
///     无害的空操作；
///   - 上下文可克隆共享（内部 `Arc`），终止对全部克隆生效。
/// - **取舍 (Trade-offs)**：守卫以引用计数（mpsc 发送端克隆计数）建模
///   在途释放，无需逐任务登记句柄；代价是终止只能等“全部归零”，不能
///   按端点细分——整体终止语义恰好如此。
///
/// [`terminate`]: Self::terminate
#[derive(Debug, Clone)]
pub struct Context {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    /// 守卫原型；终止时取走并丢弃，使计数可以归零。
    guard: Mutex<Option<ReleaseGuard>>,
    /// 排水接收端；终止时取走并等待流结束。
    drain: Mutex<Option<mpsc::Receiver<()>>>,
    /// 在册套接字的命令邮箱。
    sockets: Mutex<Vec<mpsc::Sender<Command>>>,
}

impl Context {
    /// 创建一个新的上下文。
    pub fn new() -> Self {
        let (guard_tx, drain_rx) = mpsc::channel(1);
        Self {
            shared: Arc::new(Shared {
                guard: Mutex::new(Some(ReleaseGuard { _permit: guard_tx })),
                drain: Mutex::new(Some(drain_rx)),
                sockets: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 以默认配置创建套接字。
    pub fn socket(&self, kind: SocketKind) -> Result<Socket, SocketError> {
        self.socket_with_config(kind, SocketConfig::default())
    }

    /// 以指定配置创建套接字。
    ///
    /// 必须在 Tokio 运行时内调用（核心任务随即被派生）。上下文已终止时
    /// 报 `Closed`。
    pub fn socket_with_config(
        &self,
        kind: SocketKind,
        config: SocketConfig,
    ) -> Result<Socket, SocketError> {
        let guard = self
            .shared
            .guard
            .lock()
            .clone()
            .ok_or(SocketError::Closed)?;
        let cmd_tx = core::spawn(kind, config, guard);
        self.shared.sockets.lock().push(cmd_tx.clone());
        Ok(Socket::new(kind, cmd_tx))
    }

    /// 终止上下文：关闭全部套接字并等待所有后台释放步骤收尾。
    pub async fn terminate(&self) {
        let sockets: Vec<_> = {
            let mut guard = self.shared.sockets.lock();
            guard.drain(..).collect()
        };
        for cmd_tx in sockets {
            let (ack_tx, ack_rx) = oneshot::channel();
            if cmd_tx
                .send(Command::Close {
                    reply: Some(ack_tx),
                })
                .await
                .is_ok()
            {
                let _ = ack_rx.await;
            }
        }

        // 丢弃守卫原型后，计数归零的时刻即全部后台释放完成的时刻。
        drop(self.shared.guard.lock().take());
        let drain = self.shared.drain.lock().take();
        if let Some(mut drain) = drain {
            while drain.recv().await.is_some() {}
        }
        tracing::info!("context terminated");
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
