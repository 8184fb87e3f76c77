//! 公共套接字句柄。

use bytes::Bytes;
use flint_core::SocketError;
use tokio::sync::{mpsc, oneshot};

use crate::command::Command;

/// 套接字类型：决定消息的流向与分发策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// 扇出发送端：消息按轮转投给存活且未满的管道；不支持接收。
    Push,
    /// 公平接收端：跨管道公平排队地消费入站消息；不支持发送。
    Pull,
}

impl SocketKind {
    pub(crate) fn can_send(self) -> bool {
        matches!(self, Self::Push)
    }

    pub(crate) fn can_recv(self) -> bool {
        matches!(self, Self::Pull)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

/// 套接字的公共句柄：全部操作经命令邮箱汇入核心任务。
///
/// # 教案式说明
/// - **意图 (Why)**：句柄本身不含状态，只是核心任务的信使；操作携带
///   oneshot 回执往返一次，天然串行化到单写者。
/// - **契约 (What)**：
///   - [`bind`](Self::bind) / [`connect`](Self::connect) 成功后端点在册；
///     connect 立即返回，建连与重试在后台进行，瞬时失败不回流；
///   - [`unbind`](Self::unbind) / [`disconnect`](Self::disconnect) 按
///     字面量精确匹配拆除；返回成功时管道已摘除、表项已删除，传输
///     资源的释放仍可能在途；
///   - [`send`](Self::send) / [`recv`](Self::recv) 为阻塞语义（无可用
///     管道时挂起，套接字关闭以 `Closed` 失败）；
///     [`try_send`](Self::try_send) / [`try_recv`](Self::try_recv) 为
///     非阻塞语义（此刻不可行即报 `WouldBlock`，从不挂起）；
///   - 核心任务退出后任何操作报 `Closed`。
/// - **取舍 (Trade-offs)**：`try_*` 仍是 `async fn`——命令往返需要一次
///   调度，但语义上从不因流控而等待。
#[derive(Debug)]
pub struct Socket {
    kind: SocketKind,
    cmd_tx: mpsc::Sender<Command>,
}

impl Socket {
    pub(crate) fn new(kind: SocketKind, cmd_tx: mpsc::Sender<Command>) -> Self {
        Self { kind, cmd_tx }
    }

    /// 套接字类型。
    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// 绑定一个监听端点；通配符端点在此解析出具体地址。
    pub async fn bind(&self, endpoint: &str) -> Result<(), SocketError> {
        self.roundtrip(|reply| Command::Bind {
            endpoint: endpoint.to_owned(),
            reply,
        })
        .await
    }

    /// 注册一个连接端点并立即返回；建连在后台进行。
    pub async fn connect(&self, endpoint: &str) -> Result<(), SocketError> {
        self.roundtrip(|reply| Command::Connect {
            endpoint: endpoint.to_owned(),
            reply,
        })
        .await
    }

    /// 按字面量拆除一个监听端点。
    pub async fn unbind(&self, endpoint: &str) -> Result<(), SocketError> {
        self.roundtrip(|reply| Command::TermEndpoint {
            endpoint: endpoint.to_owned(),
            reply,
        })
        .await
    }

    /// 按字面量拆除一个连接端点。
    ///
    /// 与 [`unbind`](Self::unbind) 共享查找与拆除路径：二者只是调用方
    /// 意图的两个名字，表项按键匹配，不区分注册来源。
    pub async fn disconnect(&self, endpoint: &str) -> Result<(), SocketError> {
        self.unbind(endpoint).await
    }

    /// 阻塞发送：无存活且未满的管道时挂起，直到可投递或套接字关闭。
    pub async fn send(&self, payload: Bytes) -> Result<(), SocketError> {
        self.roundtrip(|reply| Command::Send {
            payload,
            block: true,
            reply,
        })
        .await
    }

    /// 非阻塞发送：此刻无可用管道即报 `WouldBlock`。
    pub async fn try_send(&self, payload: Bytes) -> Result<(), SocketError> {
        self.roundtrip(|reply| Command::Send {
            payload,
            block: false,
            reply,
        })
        .await
    }

    /// 阻塞接收：所有入站队列为空时挂起。
    pub async fn recv(&self) -> Result<Bytes, SocketError> {
        self.roundtrip(|reply| Command::Recv { block: true, reply })
            .await
    }

    /// 非阻塞接收：此刻无消息即报 `WouldBlock`。
    pub async fn try_recv(&self) -> Result<Bytes, SocketError> {
        self.roundtrip(|reply| Command::Recv { block: false, reply })
            .await
    }

    /// 查询最近一次 bind/connect 解析出的具体端点地址。
    ///
    /// 通配符绑定返回分配到的具体地址（可直接用于 unbind），精确端点
    /// 返回其规范形；从未成功 bind/connect 过则为 `None`。
    pub async fn last_endpoint(&self) -> Result<Option<String>, SocketError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::LastEndpoint { reply: reply_tx })
            .await
            .map_err(|_| SocketError::Closed)?;
        reply_rx.await.map_err(|_| SocketError::Closed)
    }

    /// 关闭套接字：拆除全部端点，挂起的收发以 `Closed` 失败。
    ///
    /// 幂等——重复关闭是无害的空操作。传输资源的后台释放由上下文
    /// 终止统一等待。
    pub async fn close(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Close {
                reply: Some(ack_tx),
            })
            .await
            .is_ok()
        {
            let _ = ack_rx.await;
        }
    }

    /// 一次命令往返：投递命令并等待回执。
    async fn roundtrip<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, SocketError>>) -> Command,
    ) -> Result<T, SocketError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SocketError::Closed)?;
        reply_rx.await.map_err(|_| SocketError::Closed)?
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        // 尽力通知核心任务关闭；邮箱已满或已关闭时由上下文终止兜底。
        let _ = self.cmd_tx.try_send(Command::Close { reply: None });
    }
}
