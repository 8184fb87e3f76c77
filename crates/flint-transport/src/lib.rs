#![warn(missing_docs)]
#![doc = r#"
# flint-transport

## 设计动机（Why）
- **定位**：该 crate 提供 flint 在 Tokio 运行时上的最小传输原语：被动监听、
  主动建连、长度前缀帧的读写，覆盖 `tcp` 与 `ipc` 两种 scheme。
- **架构角色**：夹在 `flint-core` 的纯契约与 `flint-socket` 的引擎之间，
  只做一次性的 IO 动作；重试、管道与端点表等状态机一概不在此层。
- **分发方式**：受支持的 scheme 集合小且固定，监听器与流以**封闭的带标签
  枚举**分发（[`TransportListener`]、[`TransportStream`]），不引入开放式
  trait 对象。

## 核心契约（What）
- **通配符解析**：[`TransportListener::bind`] 对通配符端点完成具体化——
  tcp 绑定 0 端口后读回系统分配的地址，ipc 生成全局唯一的临时路径；
  返回值携带解析出的具体地址字符串，供端点表与 last-endpoint 查询使用。
- **错误语义**：绑定冲突映射为 `AddressInUse`，其余 IO 失败以
  `SocketError::Io` 原样传播；本层不吞错误、不重试。
- **帧格式**：`[长度:4 字节大端][负载]`，见 [`frame`] 模块。

## 风险与考量（Trade-offs）
- `ipc` 依赖 Unix domain socket，目标平台为类 Unix 系统；
- 监听器被 Drop 即停止接受并释放地址（ipc 连带清理套接字文件），
  已接受的流不受影响，由上层独立拆除。
"#]

pub mod frame;
mod listener;
mod stream;

pub use listener::TransportListener;
pub use stream::{StreamReader, StreamWriter, TransportStream};
