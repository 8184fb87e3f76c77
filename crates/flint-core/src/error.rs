//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为端点生命周期与消息收发暴露集中定义的错误语义，调用方依据变体即可
//!   决定重试、回退或上报，无需解析字符串；
//! - 每个变体附带稳定错误码，便于日志与指标按 `<域>.<语义>` 聚合。
//!
//! ## 分类约定（What）
//! - **输入错误**（地址非法、通配符误用）：同步拒绝，不产生任何状态变更；
//! - **资源竞争**（地址被占用）：先前状态保持原样；
//! - **查找失败**（unbind/disconnect 未命中）：调用方可处理的错误，最常见的
//!   成因是用通配符字面量而非其解析出的具体地址做拆除；
//! - **流控信号**（WouldBlock）：高频、可恢复，不是故障；
//! - **致命错误**（OS 层资源耗尽等 IO 失败）：以独立变体传播，端点表与
//!   管道集保持最后一致状态。

use std::io;

use thiserror::Error;

/// 稳定错误码常量，命名遵循 `<域>.<语义>` 约定。
///
/// - **意图 (Why)**：错误码进入可观测链路后必须保持稳定，集中声明避免散落
///   的字符串字面量产生语义漂移；
/// - **契约 (What)**：每个常量与 [`SocketError`] 的一个变体一一对应，
///   由 [`SocketError::code`] 返回。
pub mod codes {
    /// 地址文法非法或 scheme 不被识别。
    pub const INVALID_ADDRESS: &str = "endpoint.invalid_address";
    /// 通配符地址被用于 bind 之外的操作。
    pub const WILDCARD_NOT_ALLOWED: &str = "endpoint.wildcard_not_allowed";
    /// 端点已在本套接字注册，或底层地址已被占用。
    pub const ADDR_IN_USE: &str = "endpoint.addr_in_use";
    /// 按字面量查找端点未命中。
    pub const NOT_FOUND: &str = "endpoint.not_found";
    /// 当前没有存活且未满的管道可以承接消息。
    pub const WOULD_BLOCK: &str = "pipe.would_block";
    /// 套接字类型不支持该方向的操作。
    pub const NOT_SUPPORTED: &str = "socket.not_supported";
    /// 套接字或上下文已关闭。
    pub const CLOSED: &str = "socket.closed";
    /// 传输层 IO 失败。
    pub const TRANSPORT_IO: &str = "transport.io";
}

/// flint 套接字操作的统一错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：端点生命周期（bind/connect/unbind/disconnect）与消息
///   收发共享同一错误面，上层据变体驱动控制流：`WouldBlock` 重试、
///   `NoSuchEndpoint` 修正字面量、`Io` 上报告警。
/// - **契约 (What)**：
///   - 所有变体满足 `Send + Sync + 'static`，可跨任务传播；
///   - 连接器内部的瞬时建连失败**不会**出现在这里——它们被吸收进重试
///     状态（见 `flint-socket` 的 Connector），直到显式 close；
///   - `code()` 返回稳定错误码，`Display` 面向排障人员。
/// - **取舍 (Trade-offs)**：端点上下文以 `String` 保存，牺牲少量堆分配换取
///   报错信息的完整性；`Io` 变体不可比较，测试侧以 `matches!` 断言。
#[derive(Debug, Error)]
pub enum SocketError {
    /// 地址字符串无法解析为受支持的端点。
    #[error("invalid endpoint address `{input}`: {reason}")]
    InvalidAddress {
        /// 原始输入。
        input: String,
        /// 拒绝原因，固定措辞便于聚合。
        reason: &'static str,
    },

    /// 通配符形式仅对 bind 合法。
    #[error("wildcard endpoint `{endpoint}` is only legal for bind")]
    WildcardNotAllowed {
        /// 被拒绝的端点字面量。
        endpoint: String,
    },

    /// 端点已在本套接字注册，或底层地址已被其它进程占用。
    #[error("endpoint `{endpoint}` is already in use")]
    AddressInUse {
        /// 冲突的端点。
        endpoint: String,
    },

    /// 按字面量精确匹配未找到已注册端点。
    #[error("no endpoint registered under `{endpoint}`")]
    NoSuchEndpoint {
        /// 未命中的查找键。
        endpoint: String,
    },

    /// 非阻塞操作此刻无法推进：没有存活且未满的管道。
    #[error("operation would block: no live, non-full pipe available")]
    WouldBlock,

    /// 套接字类型不支持该方向（如向 Pull 套接字发送）。
    #[error("operation not supported by this socket kind")]
    OperationNotSupported,

    /// 套接字或其所属上下文已关闭。
    #[error("socket already closed")]
    Closed,

    /// 传输层不可恢复的 IO 失败。
    #[error("transport io failure")]
    Io(#[from] io::Error),
}

impl SocketError {
    /// 返回该错误的稳定错误码，见 [`codes`]。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAddress { .. } => codes::INVALID_ADDRESS,
            Self::WildcardNotAllowed { .. } => codes::WILDCARD_NOT_ALLOWED,
            Self::AddressInUse { .. } => codes::ADDR_IN_USE,
            Self::NoSuchEndpoint { .. } => codes::NOT_FOUND,
            Self::WouldBlock => codes::WOULD_BLOCK,
            Self::OperationNotSupported => codes::NOT_SUPPORTED,
            Self::Closed => codes::CLOSED,
            Self::Io(_) => codes::TRANSPORT_IO,
        }
    }

    /// 构造地址解析错误。
    pub fn invalid_address(input: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidAddress {
            input: input.into(),
            reason,
        }
    }

    /// 构造通配符误用错误。
    pub fn wildcard_not_allowed(endpoint: impl Into<String>) -> Self {
        Self::WildcardNotAllowed {
            endpoint: endpoint.into(),
        }
    }

    /// 构造端点占用错误。
    pub fn addr_in_use(endpoint: impl Into<String>) -> Self {
        Self::AddressInUse {
            endpoint: endpoint.into(),
        }
    }

    /// 构造查找未命中错误。
    pub fn no_such_endpoint(endpoint: impl Into<String>) -> Self {
        Self::NoSuchEndpoint {
            endpoint: endpoint.into(),
        }
    }

    /// 将绑定阶段的 IO 错误映射为语义化错误。
    ///
    /// `AddrInUse` 归入资源竞争（先前状态不受影响），其余 IO 失败保持
    /// `Io` 原样传播。
    pub fn map_bind_error(endpoint: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::AddrInUse {
            Self::addr_in_use(endpoint)
        } else {
            Self::Io(err)
        }
    }
}
