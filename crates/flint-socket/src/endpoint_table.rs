//! 端点表：按字面量键注册的监听/连接所有者登记簿。
//!
//! 键匹配是**精确的字符串匹配**：精确端点以调用方书写的规范形注册，
//! 通配符绑定只以解析出的具体地址注册——通配符字面量本身不是拆除键，
//! 再次解析它只会得到另一次分配，不可能重新推导出先前的注册。

use std::collections::HashMap;
use std::fmt;

use flint_core::SocketError;
use tokio::sync::oneshot;

/// 端点所有者（监听器或连接器）的套接字内唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EndpointId(u64);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep-{}", self.0)
    }
}

#[cfg(test)]
impl EndpointId {
    /// 测试用构造：跳过表内分配。
    pub(crate) fn for_tests(n: u64) -> Self {
        Self(n)
    }
}

/// 所有者种类，决定拆除时的日志语义。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OwnerKind {
    /// 被动监听端点（bind 产物）。
    Listener,
    /// 主动连接端点（connect 产物）。
    Connector,
}

impl OwnerKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Listener => "listener",
            Self::Connector => "connector",
        }
    }
}

/// 一条注册项：注册键之外还记录解析出的具体地址与后台任务的停止信号。
#[derive(Debug)]
pub(crate) struct EndpointEntry {
    /// 所有者标识，管道以此归属。
    pub(crate) id: EndpointId,
    /// 所有者种类。
    pub(crate) kind: OwnerKind,
    /// 最近一次解析出的具体地址（精确端点即注册键本身）。
    pub(crate) resolved: String,
    /// 发送（或丢弃）即要求后台任务释放传输资源并退出。
    pub(crate) stop: oneshot::Sender<()>,
}

/// 每套接字的端点注册表。
///
/// # 教案式说明
/// - **意图 (Why)**：unbind/disconnect 与 last-endpoint 查询都以这张表
///   为依据；表项的增删只发生在核心任务内，天然串行。
/// - **契约 (What)**：
///   - [`register`](Self::register) 对已存在的键报 `AddressInUse` 且不
///     改动任何状态；
///   - [`remove`](Self::remove) 按字面量精确匹配，未命中返回 `None`，
///     由调用方翻译为 `NoSuchEndpoint`；
///   - [`allocate_id`](Self::allocate_id) 先于注册分配所有者 id，后台
///     任务与管道在注册完成前即可携带归属标识。
#[derive(Debug, Default)]
pub(crate) struct EndpointTable {
    next_id: u64,
    entries: HashMap<String, EndpointEntry>,
}

impl EndpointTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 分配下一个所有者 id。
    pub(crate) fn allocate_id(&mut self) -> EndpointId {
        self.next_id += 1;
        EndpointId(self.next_id)
    }

    /// 键是否已注册。
    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 所有者 id 是否仍然在册（迟到的管道挂接以此甄别）。
    pub(crate) fn contains_id(&self, id: EndpointId) -> bool {
        self.entries.values().any(|entry| entry.id == id)
    }

    /// 注册一条表项；键冲突时报 `AddressInUse`，原状态不变。
    pub(crate) fn register(
        &mut self,
        key: String,
        entry: EndpointEntry,
    ) -> Result<(), SocketError> {
        if self.entries.contains_key(&key) {
            return Err(SocketError::addr_in_use(key));
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    /// 按字面量精确匹配移除一条表项。
    pub(crate) fn remove(&mut self, key: &str) -> Option<EndpointEntry> {
        self.entries.remove(key)
    }

    /// 取走全部表项（套接字整体关闭）。
    pub(crate) fn drain(&mut self) -> Vec<EndpointEntry> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(table: &mut EndpointTable, resolved: &str) -> EndpointEntry {
        let (stop, _rx) = oneshot::channel();
        EndpointEntry {
            id: table.allocate_id(),
            kind: OwnerKind::Listener,
            resolved: resolved.to_owned(),
            stop,
        }
    }

    #[test]
    fn duplicate_key_is_rejected_without_side_effects() {
        let mut table = EndpointTable::new();
        let first = entry(&mut table, "tcp://127.0.0.1:5560");
        let first_id = first.id;
        table
            .register("tcp://127.0.0.1:5560".to_owned(), first)
            .expect("first registration");

        let second = entry(&mut table, "tcp://127.0.0.1:5560");
        let err = table
            .register("tcp://127.0.0.1:5560".to_owned(), second)
            .expect_err("duplicate key");
        assert!(matches!(err, SocketError::AddressInUse { .. }));

        // 原表项保持原样。
        assert_eq!(table.len(), 1);
        let kept = table.remove("tcp://127.0.0.1:5560").expect("still there");
        assert_eq!(kept.id, first_id);
    }

    #[test]
    fn lookup_is_literal_not_structural() {
        let mut table = EndpointTable::new();
        let e = entry(&mut table, "tcp://127.0.0.1:41500");
        table
            .register("tcp://127.0.0.1:41500".to_owned(), e)
            .expect("register");

        // 通配符字面量不是这条注册的键，反之亦然。
        assert!(!table.contains("tcp://127.0.0.1:*"));
        assert!(table.contains("tcp://127.0.0.1:41500"));
        assert!(table.remove("tcp://127.0.0.1:*").is_none());
    }

    #[test]
    fn remove_twice_misses_the_second_time() {
        let mut table = EndpointTable::new();
        let e = entry(&mut table, "ipc:///tmp/flint-test.sock");
        table
            .register("ipc:///tmp/flint-test.sock".to_owned(), e)
            .expect("register");

        assert!(table.remove("ipc:///tmp/flint-test.sock").is_some());
        assert!(table.remove("ipc:///tmp/flint-test.sock").is_none());
    }

    #[test]
    fn contains_id_tracks_registration_lifetime() {
        let mut table = EndpointTable::new();
        let e = entry(&mut table, "tcp://127.0.0.1:1");
        let id = e.id;
        table.register("tcp://127.0.0.1:1".to_owned(), e).expect("register");

        assert!(table.contains_id(id));
        table.remove("tcp://127.0.0.1:1");
        assert!(!table.contains_id(id));
    }
}
