//! 生命周期补充测试：输入校验、方向约束、连接器重试路径、关闭语义与
//! 上下文终止的后台释放排水。

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use flint_socket::{Context, ReconnectConfig, SocketConfig, SocketError, SocketKind};

/// 重试路径测试用的快节奏退避。
fn fast_reconnect() -> SocketConfig {
    SocketConfig {
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        },
        ..SocketConfig::default()
    }
}

#[tokio::test]
async fn malformed_addresses_are_rejected_synchronously() {
    let ctx = Context::new();
    let push = ctx.socket(SocketKind::Push).expect("push socket");

    for input in ["127.0.0.1:5560", "udp://127.0.0.1:5560", "tcp://"] {
        let err = push.bind(input).await.expect_err(input);
        assert!(matches!(err, SocketError::InvalidAddress { .. }), "got {err:?}");

        let err = push.connect(input).await.expect_err(input);
        assert!(matches!(err, SocketError::InvalidAddress { .. }), "got {err:?}");

        let err = push.unbind(input).await.expect_err(input);
        assert!(matches!(err, SocketError::InvalidAddress { .. }), "got {err:?}");
    }

    ctx.terminate().await;
}

#[tokio::test]
async fn connect_to_wildcard_is_rejected() {
    let ctx = Context::new();
    let push = ctx.socket(SocketKind::Push).expect("push socket");

    for input in ["tcp://127.0.0.1:*", "tcp://*", "ipc://*"] {
        let err = push.connect(input).await.expect_err(input);
        assert!(
            matches!(err, SocketError::WildcardNotAllowed { .. }),
            "got {err:?}"
        );
    }

    ctx.terminate().await;
}

#[tokio::test]
async fn rebinding_an_active_exact_endpoint_is_addr_in_use() {
    let ctx = Context::new();
    let push = ctx.socket(SocketKind::Push).expect("push socket");

    push.bind("tcp://127.0.0.1:5563").await.expect("first bind");
    let err = push
        .bind("tcp://127.0.0.1:5563")
        .await
        .expect_err("identical active endpoint");
    assert!(matches!(err, SocketError::AddressInUse { .. }), "got {err:?}");

    // 另一套接字绑定同一地址：冲突由传输层上报，语义一致。
    let pull = ctx.socket(SocketKind::Pull).expect("pull socket");
    let err = pull
        .bind("tcp://127.0.0.1:5563")
        .await
        .expect_err("address held by sibling socket");
    assert!(matches!(err, SocketError::AddressInUse { .. }), "got {err:?}");

    ctx.terminate().await;
}

#[tokio::test]
async fn duplicate_connect_is_addr_in_use() {
    let ctx = Context::new();
    let push = ctx.socket(SocketKind::Push).expect("push socket");

    push.connect("tcp://127.0.0.1:5564").await.expect("first connect");
    let err = push
        .connect("tcp://127.0.0.1:5564")
        .await
        .expect_err("identical active endpoint");
    assert!(matches!(err, SocketError::AddressInUse { .. }), "got {err:?}");

    ctx.terminate().await;
}

#[tokio::test]
async fn direction_violations_are_not_supported() {
    let ctx = Context::new();
    let push = ctx.socket(SocketKind::Push).expect("push socket");
    let pull = ctx.socket(SocketKind::Pull).expect("pull socket");

    let err = push.try_recv().await.expect_err("push cannot receive");
    assert!(matches!(err, SocketError::OperationNotSupported), "got {err:?}");

    let err = pull
        .try_send(Bytes::from_static(b"x"))
        .await
        .expect_err("pull cannot send");
    assert!(matches!(err, SocketError::OperationNotSupported), "got {err:?}");

    ctx.terminate().await;
}

#[tokio::test]
async fn connector_retries_until_listener_appears() {
    let ctx = Context::new();
    let push = ctx
        .socket_with_config(SocketKind::Push, fast_reconnect())
        .expect("push socket");
    let pull = ctx.socket(SocketKind::Pull).expect("pull socket");

    let ep = format!(
        "ipc://{}/flint-retry-{}.sock",
        std::env::temp_dir().display(),
        std::process::id()
    );
    // 清理上次异常退出可能残留的套接字文件。
    let _ = std::fs::remove_file(ep.trim_start_matches("ipc://"));

    // 目标路径尚不存在：connect 照样立即成功，失败被吸收进重试态。
    push.connect(&ep).await.expect("connect");
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 监听者出现后，下一轮重试完成建连，挂起的发送随挂接被唤醒。
    pull.bind(&ep).await.expect("bind");
    push.send(Bytes::from_static(b"late")).await.expect("send");
    let got = pull.recv().await.expect("recv");
    assert_eq!(got, Bytes::from_static(b"late"));

    ctx.terminate().await;
}

#[tokio::test]
async fn close_fails_pending_and_subsequent_operations() {
    let ctx = Context::new();
    let pull = Arc::new(ctx.socket(SocketKind::Pull).expect("pull socket"));

    // 空管道集上的阻塞接收先挂起……
    let waiter = tokio::spawn({
        let pull = Arc::clone(&pull);
        async move { pull.recv().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // ……关闭后以 Closed 失败，而不是永远悬挂。
    pull.close().await;
    let res = waiter.await.expect("join");
    assert!(matches!(res, Err(SocketError::Closed)), "got {res:?}");

    let err = pull.try_recv().await.expect_err("socket is gone");
    assert!(matches!(err, SocketError::Closed), "got {err:?}");

    ctx.terminate().await;
}

#[tokio::test]
async fn terminate_drains_background_release_steps() {
    let ctx = Context::new();
    let push = ctx.socket(SocketKind::Push).expect("push socket");

    push.bind("ipc://*").await.expect("bind");
    let resolved = push
        .last_endpoint()
        .await
        .expect("query")
        .expect("resolved address recorded");
    let path = resolved.trim_start_matches("ipc://").to_owned();
    assert!(std::path::Path::new(&path).exists());

    // 不显式 unbind：终止必须等后台释放收尾，套接字文件在返回前消失。
    ctx.terminate().await;
    assert!(
        !std::path::Path::new(&path).exists(),
        "socket file must be released before terminate returns"
    );
}
