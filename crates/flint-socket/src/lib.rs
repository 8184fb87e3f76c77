#![warn(missing_docs)]
#![doc = r#"
# flint-socket

## 设计动机（Why）
- **定位**：该 crate 是 flint 的套接字引擎——端点生命周期与连接状态的
  管理者：维护一个套接字拥有哪些监听端点与连接端点、把通配符地址解析为
  具体绑定地址、异步地建立与拆除传输连接，并保证消息收发永远观察到
  **当前**的存活连接集合而非陈旧快照。
- **架构角色**：依赖 `flint-core` 的契约与 `flint-transport` 的 IO 原语，
  向上暴露 [`Context`] / [`Socket`] 两个公共类型。

## 并发模型（How）
- **单写者纪律**：每个套接字由一个核心任务独占全部可变状态（端点表、
  管道集、被挂起的收发等待者）；公共 API 与后台任务都通过命令邮箱
  （mpsc）提交请求，不存在共享可变结构，也就不需要细粒度锁。
- **后台任务**：监听器的接受循环、连接器的重试循环、每条连接的收发
  会话都是独立任务，管道的挂接/摘除以命令形式汇入核心任务。
- **拆除的异步尾巴**：unbind/disconnect 在管道摘除与端点表项删除完成后
  即返回成功；传输资源（端口、套接字文件）的释放在后台完成。上下文
  终止会阻塞等待所有此类后台释放步骤结束。

## 关键不变量（What）
- 管道集一旦为空（无存活且未满的管道），非阻塞发送**立即**以
  `WouldBlock` 失败，即使底层传输的关闭仍在异步进行——管道集成员关系
  才是发送许可的权威信号；
- 通配符绑定只能用其解析出的具体地址拆除，重复使用通配符字面量查找
  会得到 `NoSuchEndpoint`；
- 对同一精确端点的重复 bind/connect 以 `AddressInUse` 拒绝且无副作用。
"#]

mod command;
mod connector;
mod context;
mod core;
mod endpoint_table;
mod listener;
mod pipe;
mod session;
mod socket;

pub use context::Context;
pub use socket::{Socket, SocketKind};

pub use flint_core::{Endpoint, ReconnectConfig, ResolutionKind, Scheme, SocketConfig, SocketError, codes};
