//! 管道与管道集：消息收发许可的权威来源。
//!
//! 一条管道对应一条存活的对端连接，由两条有界 mpsc 通道组成：出站通道
//! （核心任务 → 会话出口任务）容量即发送侧高水位，入站通道（会话入口
//! 任务 → 核心任务）容量即接收侧高水位。核心任务独占管道集；会话任务
//! 只持有自己的两个通道端，通道关闭即会话退出信号，无需额外的控制通道。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use flint_core::SocketConfig;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::endpoint_table::EndpointId;

/// 管道 id 的进程内序号。
static PIPE_ID_SEQ: AtomicU64 = AtomicU64::new(1);

/// 管道的进程内唯一标识，用于幂等摘除与日志关联。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PipeId(u64);

impl PipeId {
    fn next() -> Self {
        Self(PIPE_ID_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipe-{}", self.0)
    }
}

/// 会话侧持有的两个通道端。
///
/// 入站写端在管道被核心摘除后发送即失败（`closed()` 同时完成），入口
/// 任务据此退出；出站读端在摘除后先排空已入队的消息再返回 `None`，
/// 已被接受的出站消息因此不会在拆除时凭空丢失。
#[derive(Debug)]
pub(crate) struct SessionEnds {
    /// 入站消息写端，容量为接收侧高水位。
    pub(crate) in_tx: mpsc::Sender<Bytes>,
    /// 出站消息读端，容量为发送侧高水位。
    pub(crate) out_rx: mpsc::Receiver<Bytes>,
}

/// 核心任务持有的管道半部。
///
/// # 教案式说明
/// - **意图 (Why)**：发送许可必须以管道集成员关系为准，而不是底层传输
///   是否真正关闭；核心半部被丢弃（摘除）的瞬间，该连接即不再参与消息
///   分发，传输层的收尾在后台继续。
/// - **契约 (What)**：
///   - [`Pipe::pair`] 同时产出核心半部与会话半部，容量取自
///     [`SocketConfig`] 的收发高水位；
///   - 出站以 `try_send` 探测：队列满即该管道"满"，通道关闭视作已死
///     （摘除事件在途），两者都不阻塞核心任务；
///   - 核心半部整体移出管道集并丢弃，即完成该管道的逻辑拆除。
/// - **取舍 (Trade-offs)**：深度计数直接复用 mpsc 的容量语义，不另设
///   计数器——水位穿越（满 → 未满、空 → 非空）由会话任务以事件上报。
#[derive(Debug)]
pub(crate) struct Pipe {
    id: PipeId,
    owner: EndpointId,
    out_tx: mpsc::Sender<Bytes>,
    in_rx: mpsc::Receiver<Bytes>,
}

impl Pipe {
    /// 创建一对管道端：核心半部与会话半部。
    pub(crate) fn pair(owner: EndpointId, config: &SocketConfig) -> (Self, SessionEnds) {
        let (out_tx, out_rx) = mpsc::channel(config.send_hwm.max(1));
        let (in_tx, in_rx) = mpsc::channel(config.recv_hwm.max(1));
        (
            Self {
                id: PipeId::next(),
                owner,
                out_tx,
                in_rx,
            },
            SessionEnds { in_tx, out_rx },
        )
    }

    /// 管道标识。
    pub(crate) fn id(&self) -> PipeId {
        self.id
    }
}

/// 每套接字的管道集合，连同发送轮转与接收公平排队的游标。
///
/// # 教案式说明
/// - **意图 (Why)**：send/receive 只咨询本集合，端点表的变化通过挂接/
///   摘除即时反映到这里，收发因此永远观察到**当前**的存活连接集合。
/// - **契约 (What)**：
///   - [`try_send`](Self::try_send) 从上次成功位置的下一个管道开始轮转，
///     投入第一个存活且未满的管道；全部满或集合为空时把负载原样退回，
///     由调用方决定挂起还是报告 `WouldBlock`；
///   - [`try_recv`](Self::try_recv) 跨管道公平排队：从上次命中位置的
///     下一个管道开始轮询，取到即推进游标；
///   - [`detach`](Self::detach) 幂等——拆除与对端断开可能竞争，后到的
///     摘除静默返回 `false`。
#[derive(Debug, Default)]
pub(crate) struct PipeSet {
    pipes: HashMap<PipeId, Pipe>,
    order: Vec<PipeId>,
    send_cursor: usize,
    recv_cursor: usize,
}

impl PipeSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 挂入一条新管道，排在轮转次序末尾。
    pub(crate) fn attach(&mut self, pipe: Pipe) {
        self.order.push(pipe.id());
        self.pipes.insert(pipe.id(), pipe);
    }

    /// 摘除一条管道；重复摘除返回 `false`。
    pub(crate) fn detach(&mut self, id: PipeId) -> bool {
        if self.pipes.remove(&id).is_none() {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|p| *p == id) {
            self.order.remove(pos);
        }
        true
    }

    /// 摘除某个端点所有者名下的全部管道，返回摘除数量。
    pub(crate) fn detach_owner(&mut self, owner: EndpointId) -> usize {
        let doomed: Vec<PipeId> = self
            .pipes
            .values()
            .filter(|pipe| pipe.owner == owner)
            .map(Pipe::id)
            .collect();
        for id in &doomed {
            self.detach(*id);
        }
        doomed.len()
    }

    /// 清空集合（套接字整体关闭）。
    pub(crate) fn clear(&mut self) {
        self.pipes.clear();
        self.order.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    /// 轮转投递：写入第一个存活且未满的管道，失败则退回负载。
    pub(crate) fn try_send(&mut self, payload: Bytes) -> Result<(), Bytes> {
        let n = self.order.len();
        let mut payload = payload;
        for step in 0..n {
            let idx = (self.send_cursor + step) % n;
            let Some(pipe) = self.pipes.get(&self.order[idx]) else {
                continue;
            };
            match pipe.out_tx.try_send(payload) {
                Ok(()) => {
                    self.send_cursor = (idx + 1) % n;
                    return Ok(());
                }
                // 满与已关闭（摘除事件在途）都跳过，继续轮转。
                Err(TrySendError::Full(p)) | Err(TrySendError::Closed(p)) => payload = p,
            }
        }
        Err(payload)
    }

    /// 公平排队消费：从游标起轮询各管道的入站队列。
    pub(crate) fn try_recv(&mut self) -> Option<Bytes> {
        let n = self.order.len();
        for step in 0..n {
            let idx = (self.recv_cursor + step) % n;
            let id = self.order[idx];
            if let Some(pipe) = self.pipes.get_mut(&id) {
                if let Ok(payload) = pipe.in_rx.try_recv() {
                    self.recv_cursor = (idx + 1) % n;
                    return Some(payload);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SocketConfig {
        SocketConfig {
            send_hwm: 2,
            recv_hwm: 2,
            ..SocketConfig::default()
        }
    }

    fn owner(n: u64) -> EndpointId {
        EndpointId::for_tests(n)
    }

    #[test]
    fn empty_set_rejects_send_and_recv() {
        let mut set = PipeSet::new();
        assert!(set.is_empty());
        assert_eq!(set.try_send(Bytes::from_static(b"ABC")), Err(Bytes::from_static(b"ABC")));
        assert_eq!(set.try_recv(), None);
    }

    #[test]
    fn round_robin_distributes_across_pipes() {
        let mut set = PipeSet::new();
        let (p1, mut e1) = Pipe::pair(owner(1), &small_config());
        let (p2, mut e2) = Pipe::pair(owner(1), &small_config());
        set.attach(p1);
        set.attach(p2);

        for i in 0..4u8 {
            set.try_send(Bytes::copy_from_slice(&[i])).expect("capacity left");
        }
        // 每条管道各承接一半。
        assert_eq!(e1.out_rx.try_recv().ok(), Some(Bytes::from_static(&[0])));
        assert_eq!(e2.out_rx.try_recv().ok(), Some(Bytes::from_static(&[1])));
        assert_eq!(e1.out_rx.try_recv().ok(), Some(Bytes::from_static(&[2])));
        assert_eq!(e2.out_rx.try_recv().ok(), Some(Bytes::from_static(&[3])));
    }

    #[test]
    fn full_pipes_bounce_the_payload_back() {
        let mut set = PipeSet::new();
        let (p1, _ends) = Pipe::pair(owner(1), &small_config());
        set.attach(p1);

        set.try_send(Bytes::from_static(b"a")).expect("1/2");
        set.try_send(Bytes::from_static(b"b")).expect("2/2");
        // 高水位已到：负载原样退回。
        assert_eq!(set.try_send(Bytes::from_static(b"c")), Err(Bytes::from_static(b"c")));
    }

    #[test]
    fn dead_session_counts_as_unavailable() {
        let mut set = PipeSet::new();
        let (p1, ends) = Pipe::pair(owner(1), &small_config());
        set.attach(p1);
        drop(ends); // 会话端整体消失。

        assert_eq!(set.try_send(Bytes::from_static(b"x")), Err(Bytes::from_static(b"x")));
    }

    #[test]
    fn fair_queue_alternates_between_inbound_queues() {
        let mut set = PipeSet::new();
        let (p1, e1) = Pipe::pair(owner(1), &small_config());
        let (p2, e2) = Pipe::pair(owner(2), &small_config());
        set.attach(p1);
        set.attach(p2);

        e1.in_tx.try_send(Bytes::from_static(b"a1")).expect("queue 1");
        e1.in_tx.try_send(Bytes::from_static(b"a2")).expect("queue 1");
        e2.in_tx.try_send(Bytes::from_static(b"b1")).expect("queue 2");

        assert_eq!(set.try_recv(), Some(Bytes::from_static(b"a1")));
        assert_eq!(set.try_recv(), Some(Bytes::from_static(b"b1")));
        assert_eq!(set.try_recv(), Some(Bytes::from_static(b"a2")));
        assert_eq!(set.try_recv(), None);
    }

    #[test]
    fn detach_is_idempotent() {
        let mut set = PipeSet::new();
        let (pipe, _ends) = Pipe::pair(owner(1), &small_config());
        let id = pipe.id();
        set.attach(pipe);

        assert!(set.detach(id));
        assert!(!set.detach(id));
        assert!(set.is_empty());
    }

    #[test]
    fn detach_owner_removes_only_that_owner() {
        let mut set = PipeSet::new();
        let (p1, _e1) = Pipe::pair(owner(1), &small_config());
        let (p2, _e2) = Pipe::pair(owner(1), &small_config());
        let (p3, _e3) = Pipe::pair(owner(2), &small_config());
        set.attach(p1);
        set.attach(p2);
        set.attach(p3);

        assert_eq!(set.detach_owner(owner(1)), 2);
        assert_eq!(set.len(), 1);
        assert_eq!(set.detach_owner(owner(1)), 0);
    }
}
