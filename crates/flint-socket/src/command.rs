//! 核心任务的命令协议。
//!
//! 公共 API 与后台任务都不直接触碰套接字状态：用户操作携带 oneshot 回执
//! 通道，后台事件（管道挂接/摘除、容量/数据提示）单向汇入。命令在核心
//! 任务中逐条处理，构成单写者序列化点。

use bytes::Bytes;
use flint_core::SocketError;
use tokio::sync::oneshot;

use crate::endpoint_table::EndpointId;
use crate::pipe::{Pipe, PipeId};

/// 汇入套接字核心任务的全部命令。
pub(crate) enum Command {
    /// 用户操作：绑定端点。
    Bind {
        /// 原始端点字符串。
        endpoint: String,
        /// 操作回执。
        reply: oneshot::Sender<Result<(), SocketError>>,
    },
    /// 用户操作：连接端点。
    Connect {
        endpoint: String,
        reply: oneshot::Sender<Result<(), SocketError>>,
    },
    /// 用户操作：按字面量拆除端点（unbind 与 disconnect 共用）。
    TermEndpoint {
        endpoint: String,
        reply: oneshot::Sender<Result<(), SocketError>>,
    },
    /// 用户操作：发送一条消息。`block` 为真时在无可用管道的情况下挂起。
    Send {
        payload: Bytes,
        block: bool,
        reply: oneshot::Sender<Result<(), SocketError>>,
    },
    /// 用户操作：接收一条消息。
    Recv {
        block: bool,
        reply: oneshot::Sender<Result<Bytes, SocketError>>,
    },
    /// 用户操作：查询最近一次解析出的具体端点地址。
    LastEndpoint {
        reply: oneshot::Sender<Option<String>>,
    },
    /// 用户操作或 Drop：关闭套接字。
    Close {
        reply: Option<oneshot::Sender<()>>,
    },

    /// 后台事件：一条连接完成握手，管道挂入管道集。
    PipeAttached {
        owner: EndpointId,
        pipe: Pipe,
    },
    /// 后台事件：对端断开或会话退出，管道摘除（幂等）。
    PipeDetached {
        pipe: PipeId,
    },
    /// 后台事件：出口任务消费了一条消息，发送容量可能已恢复。
    PipeWritable {
        pipe: PipeId,
    },
    /// 后台事件：入口任务收到一条消息，接收队列非空。
    PipeReadable {
        pipe: PipeId,
    },
}
