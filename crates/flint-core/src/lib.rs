#![warn(missing_docs)]
#![doc = r#"
# flint-core

## 设计动机（Why）
- **定位**：该 crate 定义 flint 消息队列套接字的纯逻辑契约：端点地址文法与
  通配符解析、稳定错误域、套接字与重连配置。
- **架构角色**：作为工作区最底层的契约积木，供 `flint-transport` 与
  `flint-socket` 复用；本 crate 不依赖任何异步运行时，全部 API 为纯函数或
  纯数据结构，可在单元测试中独立验证。

## 核心契约（What）
- **地址文法**：`scheme://body`，支持 `tcp`（网络流式传输）与 `ipc`
  （本地域传输）两种 scheme；`*` 形式的 body（或 tcp 的 `*` 端口）表示
  通配符，仅对 bind 合法。
- **错误域**：[`SocketError`] 携带 `<域>.<语义>` 约定的稳定错误码，
  输入类错误同步拒绝、资源竞争保持原状、流控信号可恢复。
- **重连策略**：[`Backoff`] 实现指数退避，参数来自 [`ReconnectConfig`]，
  属于配置而非隐含契约。

## 风险与考量（Trade-offs）
- 地址解析不做 DNS 查询，主机名的解析推迟到传输层真正建连/绑定时进行；
- 错误域面向调用方语义而非 OS errno，IO 细节以 `source` 链保留。
"#]

mod config;
mod endpoint;
mod error;

pub use config::{Backoff, ReconnectConfig, SocketConfig};
pub use endpoint::{Endpoint, ResolutionKind, Scheme, WILDCARD_TOKEN};
pub use error::{SocketError, codes};
