//! 端点地址文法与通配符解析。
//!
//! ## 文法（What）
//! - 统一形式 `scheme://body`；
//! - `tcp` 的 body 为 `host:port`，`port` 取数字或通配符 `*`，整个 body 也
//!   可以是 `*`（任意接口 + 系统分配端口）；
//! - `ipc` 的 body 为非空文件系统路径，或通配符 `*`（运行时生成唯一路径）。
//!
//! ## 边界（Trade-offs）
//! - 解析是纯函数：不触碰网络，不分配系统资源；通配符解析成具体地址发生在
//!   传输层 bind 时；
//! - 主机名不在此处做 DNS 解析，`tcp://localhost:80` 被视为合法 body。

use std::fmt;

use crate::error::SocketError;

/// 通配符保留记号：作为 body（或 tcp 端口位）出现时表示由运行时分配。
pub const WILDCARD_TOKEN: &str = "*";

/// 受支持的传输 scheme。
///
/// 按设计为封闭集合：受支持的传输种类少且固定，以带标签的枚举分发代替
/// 开放式多态（trait 对象），调用方可以穷尽匹配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// 流式网络传输（TCP）。
    Tcp,
    /// 本地域传输（Unix domain socket）。
    Ipc,
}

impl Scheme {
    /// 返回 scheme 的字面形式。
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Ipc => "ipc",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 端点的解析种类：精确地址或通配符。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionKind {
    /// 调用方给定了完整的具体地址。
    Exact,
    /// 具体地址由运行时在 bind 时分配；仅对 bind 合法。
    Wildcard,
}

/// 解析后的端点：`(scheme, body)` 加解析种类。
///
/// # 教案式说明
/// - **意图 (Why)**：bind/connect/unbind/disconnect 全部以端点为入参，解析
///   一次后在各层传递结构化表示，避免重复的字符串拆解；
/// - **契约 (What)**：
///   - [`Endpoint::parse`] 是唯一构造入口，文法非法即返回
///     [`SocketError::InvalidAddress`]，无任何副作用；
///   - [`Endpoint::canonical`]（即 `Display`）重现 `scheme://body` 规范形，
///     作为端点表的查找键；
/// - **取舍 (Trade-offs)**：body 原样保存（不做大小写或主机名归一化），
///   端点表因此按调用方书写的字面量匹配——这是规格要求的行为而非偷懒。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: Scheme,
    body: String,
    kind: ResolutionKind,
}

impl Endpoint {
    /// 解析端点地址字符串。
    ///
    /// 纯解析，不分配系统资源。scheme 不被识别或 body 畸形时返回
    /// [`SocketError::InvalidAddress`]。
    pub fn parse(input: &str) -> Result<Self, SocketError> {
        let (scheme_str, body) = input
            .split_once("://")
            .ok_or_else(|| SocketError::invalid_address(input, "missing `://` separator"))?;

        let scheme = match scheme_str {
            "tcp" => Scheme::Tcp,
            "ipc" => Scheme::Ipc,
            _ => return Err(SocketError::invalid_address(input, "unrecognized scheme")),
        };

        if body.is_empty() {
            return Err(SocketError::invalid_address(input, "empty address body"));
        }

        let kind = match scheme {
            Scheme::Tcp => Self::classify_tcp_body(input, body)?,
            Scheme::Ipc => {
                if body == WILDCARD_TOKEN {
                    ResolutionKind::Wildcard
                } else {
                    ResolutionKind::Exact
                }
            }
        };

        Ok(Self {
            scheme,
            body: body.to_owned(),
            kind,
        })
    }

    /// tcp body 校验：`host:port`、`host:*` 或整体 `*`。
    fn classify_tcp_body(input: &str, body: &str) -> Result<ResolutionKind, SocketError> {
        if body == WILDCARD_TOKEN {
            return Ok(ResolutionKind::Wildcard);
        }
        let (host, port) = body
            .rsplit_once(':')
            .ok_or_else(|| SocketError::invalid_address(input, "tcp body must be `host:port`"))?;
        if host.is_empty() {
            return Err(SocketError::invalid_address(input, "empty tcp host"));
        }
        if port == WILDCARD_TOKEN {
            return Ok(ResolutionKind::Wildcard);
        }
        if port.parse::<u16>().is_err() {
            return Err(SocketError::invalid_address(
                input,
                "tcp port must be numeric or `*`",
            ));
        }
        Ok(ResolutionKind::Exact)
    }

    /// 端点的 scheme。
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// 端点 body 的原样字面量。
    pub fn body(&self) -> &str {
        &self.body
    }

    /// 解析种类。
    pub fn kind(&self) -> ResolutionKind {
        self.kind
    }

    /// 是否为通配符端点。
    pub fn is_wildcard(&self) -> bool {
        self.kind == ResolutionKind::Wildcard
    }

    /// 重现 `scheme://body` 规范形，作为端点表键与日志表示。
    pub fn canonical(&self) -> String {
        format!("{}://{}", self.scheme, self.body)
    }

    /// 拆出 tcp 端点的 `(host, port)`；通配符端口返回 `None` 端口。
    ///
    /// body 整体为 `*` 时主机按任意接口 `0.0.0.0` 处理。非 tcp 端点返回
    /// `None`。
    pub fn tcp_host_port(&self) -> Option<(&str, Option<u16>)> {
        if self.scheme != Scheme::Tcp {
            return None;
        }
        if self.body == WILDCARD_TOKEN {
            return Some(("0.0.0.0", None));
        }
        // parse 已保证 body 形如 `host:port`。
        let (host, port) = self.body.rsplit_once(':')?;
        if port == WILDCARD_TOKEN {
            Some((host, None))
        } else {
            Some((host, port.parse::<u16>().ok()))
        }
    }

    /// 拆出 ipc 端点的具体路径；通配符或非 ipc 端点返回 `None`。
    pub fn ipc_path(&self) -> Option<&str> {
        if self.scheme == Scheme::Ipc && self.kind == ResolutionKind::Exact {
            Some(&self.body)
        } else {
            None
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.body)
    }
}
