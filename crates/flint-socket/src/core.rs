//! 套接字核心任务：端点表与管道集的单写者。
//!
//! 公共 API 的每个操作、后台任务的每个事件都化作一条命令汇入本任务，
//! 逐条处理——不存在共享可变状态，也就不需要细粒度锁。bind 的传输绑定
//! 在命令处理内就地完成（它不依赖其它命令的推进），unbind/disconnect
//! 则只做同步的管道摘除与表项删除，把传输资源释放留给后台任务。

use std::collections::VecDeque;
use std::ops::ControlFlow;

use bytes::Bytes;
use flint_core::{Endpoint, ResolutionKind, SocketConfig, SocketError};
use flint_transport::TransportListener;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::command::Command;
use crate::connector;
use crate::context::ReleaseGuard;
use crate::endpoint_table::{EndpointEntry, EndpointId, EndpointTable, OwnerKind};
use crate::listener;
use crate::pipe::{Pipe, PipeId, PipeSet};
use crate::socket::SocketKind;

/// 命令邮箱容量。用户操作串行往返，占用极小；余量留给后台事件突发。
const COMMAND_MAILBOX: usize = 64;

/// 派生一个套接字核心任务，返回其命令邮箱。
pub(crate) fn spawn(
    kind: SocketKind,
    config: SocketConfig,
    guard: ReleaseGuard,
) -> mpsc::Sender<Command> {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_MAILBOX);
    let core = SocketCore {
        kind,
        config,
        cmd_tx: cmd_tx.clone(),
        table: EndpointTable::new(),
        pipes: PipeSet::new(),
        send_waiters: VecDeque::new(),
        recv_waiters: VecDeque::new(),
        last_endpoint: None,
        guard,
    };
    let span = tracing::info_span!("socket", kind = kind.as_str());
    tokio::spawn(core.run(cmd_rx).instrument(span));
    cmd_tx
}

/// 阻塞发送的挂起者：负载随等待者保管，唤醒时原样重投。
struct SendWaiter {
    payload: Bytes,
    reply: oneshot::Sender<Result<(), SocketError>>,
}

/// 阻塞接收的挂起者。
struct RecvWaiter {
    reply: oneshot::Sender<Result<Bytes, SocketError>>,
}

struct SocketCore {
    kind: SocketKind,
    config: SocketConfig,
    /// 自持一份邮箱发送端，分发给派生的后台任务。
    cmd_tx: mpsc::Sender<Command>,
    table: EndpointTable,
    pipes: PipeSet,
    send_waiters: VecDeque<SendWaiter>,
    recv_waiters: VecDeque<RecvWaiter>,
    /// 最近一次 bind/connect 解析出的具体地址。
    last_endpoint: Option<String>,
    /// 随任务退出归还，上下文终止以此排水；克隆分发给全部后台任务。
    guard: ReleaseGuard,
}

impl SocketCore {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        loop {
            // 邮箱关闭（全部句柄被丢弃）等价于关闭命令。
            let Some(cmd) = cmd_rx.recv().await else { break };
            if self.handle(cmd).await.is_break() {
                break;
            }
        }
        self.teardown_all();
    }

    async fn handle(&mut self, cmd: Command) -> ControlFlow<()> {
        match cmd {
            Command::Bind { endpoint, reply } => {
                let _ = reply.send(self.handle_bind(&endpoint).await);
            }
            Command::Connect { endpoint, reply } => {
                let _ = reply.send(self.handle_connect(&endpoint));
            }
            Command::TermEndpoint { endpoint, reply } => {
                let _ = reply.send(self.handle_term_endpoint(&endpoint));
            }
            Command::Send {
                payload,
                block,
                reply,
            } => self.handle_send(payload, block, reply),
            Command::Recv { block, reply } => self.handle_recv(block, reply),
            Command::LastEndpoint { reply } => {
                let _ = reply.send(self.last_endpoint.clone());
            }
            Command::Close { reply } => {
                self.teardown_all();
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
                return ControlFlow::Break(());
            }
            Command::PipeAttached { owner, pipe } => self.handle_pipe_attached(owner, pipe),
            Command::PipeDetached { pipe } => self.handle_pipe_detached(pipe),
            Command::PipeWritable { .. } => self.drain_send_waiters(),
            Command::PipeReadable { .. } => self.drain_recv_waiters(),
        }
        ControlFlow::Continue(())
    }

    /// bind：解析、查重、传输绑定、注册、派生接受循环。
    ///
    /// 注册键的取法承载了通配符语义：精确绑定用调用方字面量，通配符
    /// 绑定只用解析出的具体地址。之后用通配符字面量做拆除查找必然
    /// 未命中（`NoSuchEndpoint`），用具体地址则命中。
    async fn handle_bind(&mut self, input: &str) -> Result<(), SocketError> {
        let endpoint = Endpoint::parse(input)?;
        // 精确端点先查重，保证失败无副作用（不触碰传输层）。
        if endpoint.kind() == ResolutionKind::Exact && self.table.contains(&endpoint.canonical()) {
            return Err(SocketError::addr_in_use(endpoint.canonical()));
        }

        let (transport, resolved) = TransportListener::bind(&endpoint).await?;
        let key = match endpoint.kind() {
            ResolutionKind::Exact => endpoint.canonical(),
            ResolutionKind::Wildcard => resolved.clone(),
        };
        let id = self.table.allocate_id();
        let (stop_tx, stop_rx) = oneshot::channel();
        // 解析出的地址仍可能撞上既有注册（此前 connect 过同一地址）；
        // 注册失败时监听器随返回被丢弃，地址立即归还。
        self.table.register(
            key.clone(),
            EndpointEntry {
                id,
                kind: OwnerKind::Listener,
                resolved: resolved.clone(),
                stop: stop_tx,
            },
        )?;
        listener::spawn_accept_loop(
            id,
            transport,
            self.config.clone(),
            self.cmd_tx.clone(),
            self.guard.clone(),
            stop_rx,
        );
        self.last_endpoint = Some(resolved);
        tracing::info!(endpoint = %input, key = %key, owner = %id, "endpoint bound");
        Ok(())
    }

    /// connect：同步只做校验与注册，建连与重试交给连接器循环。
    fn handle_connect(&mut self, input: &str) -> Result<(), SocketError> {
        let endpoint = Endpoint::parse(input)?;
        if endpoint.is_wildcard() {
            return Err(SocketError::wildcard_not_allowed(endpoint.canonical()));
        }
        let key = endpoint.canonical();
        if self.table.contains(&key) {
            return Err(SocketError::addr_in_use(key));
        }
        let id = self.table.allocate_id();
        let (stop_tx, stop_rx) = oneshot::channel();
        self.table.register(
            key.clone(),
            EndpointEntry {
                id,
                kind: OwnerKind::Connector,
                resolved: key.clone(),
                stop: stop_tx,
            },
        )?;
        connector::spawn_connect_loop(
            id,
            endpoint,
            self.config.clone(),
            self.cmd_tx.clone(),
            self.guard.clone(),
            stop_rx,
        );
        self.last_endpoint = Some(key.clone());
        tracing::info!(endpoint = %key, owner = %id, "connector registered");
        Ok(())
    }

    /// unbind/disconnect 共用的拆除路径。
    ///
    /// (a) 同步摘除所有者名下全部管道——发送许可即刻改变；
    /// (b) 向后台任务发停止信号，传输资源在后台释放（异步尾巴）；
    /// (c) 删除表项。返回成功时 (a)(c) 已完成，(b) 可能仍在途，
    /// 立即重绑同一精确地址可能短暂看到 `AddressInUse`。
    fn handle_term_endpoint(&mut self, input: &str) -> Result<(), SocketError> {
        let endpoint = Endpoint::parse(input)?;
        let key = endpoint.canonical();
        let Some(entry) = self.table.remove(&key) else {
            return Err(SocketError::no_such_endpoint(key));
        };
        let removed = self.pipes.detach_owner(entry.id);
        let _ = entry.stop.send(());
        tracing::info!(
            endpoint = %key,
            resolved = %entry.resolved,
            owner = %entry.id,
            kind = entry.kind.as_str(),
            pipes = removed,
            "endpoint removed"
        );
        Ok(())
    }

    fn handle_send(
        &mut self,
        payload: Bytes,
        block: bool,
        reply: oneshot::Sender<Result<(), SocketError>>,
    ) {
        if !self.kind.can_send() {
            let _ = reply.send(Err(SocketError::OperationNotSupported));
            return;
        }
        // 已有排队者时不允许插队，维持消息顺序。
        if self.send_waiters.is_empty() {
            match self.pipes.try_send(payload) {
                Ok(()) => {
                    let _ = reply.send(Ok(()));
                }
                Err(payload) if block => {
                    self.send_waiters.push_back(SendWaiter { payload, reply });
                }
                Err(_) => {
                    let _ = reply.send(Err(SocketError::WouldBlock));
                }
            }
        } else if block {
            self.send_waiters.push_back(SendWaiter { payload, reply });
        } else {
            let _ = reply.send(Err(SocketError::WouldBlock));
        }
    }

    fn handle_recv(&mut self, block: bool, reply: oneshot::Sender<Result<Bytes, SocketError>>) {
        if !self.kind.can_recv() {
            let _ = reply.send(Err(SocketError::OperationNotSupported));
            return;
        }
        if self.recv_waiters.is_empty() {
            if let Some(payload) = self.pipes.try_recv() {
                let _ = reply.send(Ok(payload));
                return;
            }
        }
        if block {
            self.recv_waiters.push_back(RecvWaiter { reply });
        } else {
            let _ = reply.send(Err(SocketError::WouldBlock));
        }
    }

    fn handle_pipe_attached(&mut self, owner: EndpointId, pipe: Pipe) {
        if !self.table.contains_id(owner) {
            // 所有者已被拆除，挂接迟到：丢弃管道，会话随通道关闭退出。
            tracing::debug!(%owner, pipe = %pipe.id(), "late pipe attach dropped");
            return;
        }
        tracing::debug!(%owner, pipe = %pipe.id(), total = self.pipes.len() + 1, "pipe attached");
        self.pipes.attach(pipe);
        self.drain_send_waiters();
    }

    fn handle_pipe_detached(&mut self, pipe: PipeId) {
        if self.pipes.detach(pipe) {
            tracing::debug!(%pipe, remaining = self.pipes.len(), "pipe detached");
        }
    }

    /// 唤醒挂起的发送者：按先来后到重投，直到再次无可用管道。
    fn drain_send_waiters(&mut self) {
        if self.pipes.is_empty() {
            return;
        }
        loop {
            while self
                .send_waiters
                .front()
                .is_some_and(|w| w.reply.is_closed())
            {
                // 调用方已放弃等待（超时/取消），连同负载一起丢弃。
                self.send_waiters.pop_front();
            }
            let Some(SendWaiter { payload, reply }) = self.send_waiters.pop_front() else {
                break;
            };
            match self.pipes.try_send(payload) {
                Ok(()) => {
                    let _ = reply.send(Ok(()));
                }
                Err(payload) => {
                    self.send_waiters.push_front(SendWaiter { payload, reply });
                    break;
                }
            }
        }
    }

    /// 唤醒挂起的接收者：有等待者且有消息时逐个配对。
    fn drain_recv_waiters(&mut self) {
        loop {
            while self
                .recv_waiters
                .front()
                .is_some_and(|w| w.reply.is_closed())
            {
                self.recv_waiters.pop_front();
            }
            if self.recv_waiters.is_empty() {
                break;
            }
            let Some(payload) = self.pipes.try_recv() else {
                break;
            };
            if let Some(waiter) = self.recv_waiters.pop_front() {
                let _ = waiter.reply.send(Ok(payload));
            }
        }
    }

    /// 套接字整体关闭：拆除全部端点，挂起者以 `Closed` 失败。
    fn teardown_all(&mut self) {
        tracing::info!(
            endpoints = self.table.len(),
            pipes = self.pipes.len(),
            "socket closing"
        );
        let endpoints = self.table.drain();
        for entry in &endpoints {
            self.pipes.detach_owner(entry.id);
        }
        for entry in endpoints {
            let _ = entry.stop.send(());
        }
        self.pipes.clear();
        for waiter in self.send_waiters.drain(..) {
            let _ = waiter.reply.send(Err(SocketError::Closed));
        }
        for waiter in self.recv_waiters.drain(..) {
            let _ = waiter.reply.send(Err(SocketError::Closed));
        }
        tracing::info!("socket closed");
    }
}
