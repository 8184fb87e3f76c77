//! 端点拆除语义的端到端测试：绑定/连接、消息往返、拆除后的发送许可，
//! 以及通配符绑定的字面量键匹配行为。

use std::time::Duration;

use bytes::Bytes;
use flint_socket::{Context, SocketError, SocketKind};

/// 吸收拆除异步尾巴（传输资源后台释放）的沉降窗口。
const SETTLE: Duration = Duration::from_millis(300);

#[tokio::test]
async fn unbind_stops_send_admission() {
    let ctx = Context::new();
    let push = ctx.socket(SocketKind::Push).expect("push socket");
    let pull = ctx.socket(SocketKind::Pull).expect("pull socket");

    let ep = "tcp://127.0.0.1:5560";
    push.bind(ep).await.expect("bind");
    pull.connect(ep).await.expect("connect");

    // 先通过一条消息，确认连接已建立。
    push.send(Bytes::from_static(b"ABC")).await.expect("send");
    let got = pull.recv().await.expect("recv");
    assert_eq!(got, Bytes::from_static(b"ABC"));

    push.unbind(ep).await.expect("unbind");
    tokio::time::sleep(SETTLE).await;

    // 管道集已空：非阻塞发送立即报 WouldBlock，与底层关闭是否完成无关。
    let err = push
        .try_send(Bytes::from_static(b"ABC"))
        .await
        .expect_err("no outbound connection left");
    assert!(matches!(err, SocketError::WouldBlock), "got {err:?}");

    ctx.terminate().await;
}

#[tokio::test]
async fn disconnect_stops_send_admission() {
    let ctx = Context::new();
    let push = ctx.socket(SocketKind::Push).expect("push socket");
    let pull = ctx.socket(SocketKind::Pull).expect("pull socket");

    // 先 connect 后 bind：首次建连失败被吸收进重试态。
    let ep = "tcp://127.0.0.1:5561";
    push.connect(ep).await.expect("connect");
    pull.bind(ep).await.expect("bind");

    push.send(Bytes::from_static(b"ABC")).await.expect("send");
    let got = pull.recv().await.expect("recv");
    assert_eq!(got, Bytes::from_static(b"ABC"));

    push.disconnect(ep).await.expect("disconnect");
    tokio::time::sleep(SETTLE).await;

    let err = push
        .try_send(Bytes::from_static(b"ABC"))
        .await
        .expect_err("no outbound connection left");
    assert!(matches!(err, SocketError::WouldBlock), "got {err:?}");

    ctx.terminate().await;
}

#[tokio::test]
async fn wildcard_bind_resolves_and_unbinds_by_concrete_address() {
    let ctx = Context::new();
    let push = ctx.socket(SocketKind::Push).expect("push socket");
    let pull = ctx.socket(SocketKind::Pull).expect("pull socket");

    push.bind("tcp://127.0.0.1:*").await.expect("tcp wildcard bind");
    let tcp_resolved = push
        .last_endpoint()
        .await
        .expect("query")
        .expect("resolved address recorded");
    assert!(tcp_resolved.starts_with("tcp://127.0.0.1:"));
    assert!(!tcp_resolved.contains('*'), "must be concrete: {tcp_resolved}");

    pull.bind("ipc://*").await.expect("ipc wildcard bind");
    let ipc_resolved = pull
        .last_endpoint()
        .await
        .expect("query")
        .expect("resolved address recorded");
    assert!(ipc_resolved.starts_with("ipc://"));
    assert!(!ipc_resolved.contains('*'), "must be concrete: {ipc_resolved}");

    // 解析出的具体地址就是拆除键。
    push.unbind(&tcp_resolved).await.expect("unbind by resolved");
    pull.unbind(&ipc_resolved).await.expect("unbind by resolved");

    ctx.terminate().await;
}

#[tokio::test]
async fn wildcard_literal_is_not_a_teardown_key() {
    let ctx = Context::new();
    let push = ctx.socket(SocketKind::Push).expect("push socket");

    push.bind("tcp://127.0.0.1:*").await.expect("tcp wildcard bind");
    let err = push
        .unbind("tcp://127.0.0.1:*")
        .await
        .expect_err("wildcard literal was never a registration key");
    assert!(matches!(err, SocketError::NoSuchEndpoint { .. }), "got {err:?}");

    push.bind("ipc://*").await.expect("ipc wildcard bind");
    let err = push
        .unbind("ipc://*")
        .await
        .expect_err("wildcard literal was never a registration key");
    assert!(matches!(err, SocketError::NoSuchEndpoint { .. }), "got {err:?}");

    ctx.terminate().await;
}

#[tokio::test]
async fn unbind_misses_are_no_such_endpoint() {
    let ctx = Context::new();
    let push = ctx.socket(SocketKind::Push).expect("push socket");

    // 从未注册过的端点。
    let err = push
        .unbind("tcp://127.0.0.1:5599")
        .await
        .expect_err("never registered");
    assert!(matches!(err, SocketError::NoSuchEndpoint { .. }), "got {err:?}");

    // 注册、拆除，再次拆除未命中而非静默成功。
    push.bind("tcp://127.0.0.1:5562").await.expect("bind");
    push.unbind("tcp://127.0.0.1:5562").await.expect("first unbind");
    let err = push
        .unbind("tcp://127.0.0.1:5562")
        .await
        .expect_err("second unbind");
    assert!(matches!(err, SocketError::NoSuchEndpoint { .. }), "got {err:?}");

    ctx.terminate().await;
}
