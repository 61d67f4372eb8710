use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::*;
use crate::kube::{MemoryResourceApi, ResourceApi};
use edgehold_types::{ResourceKind, ResourceObject};

fn config(fallback: &str) -> MonitorConfig {
    MonitorConfig {
        fallback_server: fallback.to_string(),
        health_check_interval: Duration::from_millis(50),
        dial_timeout: Duration::from_secs(1),
        discovery_retry: Duration::from_millis(50),
    }
}

async fn echo_server() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = socket.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });
    (addr, handle)
}

/// An address nothing listens on.
async fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

#[test]
fn test_fallback_present_exactly_once() {
    let mut set = BackendSet::new("10.0.0.1:6443");
    assert_eq!(set.servers(), ["10.0.0.1:6443".to_string()]);

    set.set_servers(&["10.0.0.3:6443".into(), "10.0.0.2:6443".into(), "10.0.0.3:6443".into()]);
    assert_eq!(set.servers(), ["10.0.0.2:6443", "10.0.0.3:6443", "10.0.0.1:6443"]);

    set.set_servers(&["10.0.0.1:6443".into(), "10.0.0.2:6443".into()]);
    assert_eq!(set.servers().iter().filter(|s| *s == "10.0.0.1:6443").count(), 1);
    assert_eq!(set.servers().len(), 2);
}

#[test]
fn test_server_update_resets_current() {
    let mut set = BackendSet::new("f:1");
    assert!(set.set_servers(&["a:1".into(), "b:1".into()]));
    set.set_current(2);
    assert!(!set.set_servers(&["b:1".into(), "a:1".into(), "f:1".into()]));
    assert!(set.set_servers(&["c:1".into()]));
    let first = set.rotation()[0].1.clone();
    assert_eq!(set.current(), Some(first.as_str()));
}

#[test]
fn test_remote_signal_is_edge_triggered() {
    let mut set = BackendSet::new("f:1");
    assert_eq!(set.update_remote_ready(false), None);
    assert_eq!(set.update_remote_ready(true), Some(RemoteSignal::Ready));
    assert_eq!(set.update_remote_ready(true), None);
    assert_eq!(set.update_remote_ready(false), Some(RemoteSignal::NotReady));
    assert_eq!(set.update_remote_ready(false), None);
}

#[tokio::test]
async fn test_not_ready_fires_once_per_down_transition() {
    let (addr, server) = echo_server().await;
    let (monitor, mut signals) = ConnectivityMonitor::new(config(&addr));

    assert_eq!(monitor.check_health().await, Some(RemoteSignal::Ready));
    assert_eq!(signals.recv().await, Some(RemoteSignal::Ready));

    server.abort();
    let _ = server.await;

    assert_eq!(monitor.check_health().await, Some(RemoteSignal::NotReady));
    assert_eq!(monitor.check_health().await, None);
    assert_eq!(monitor.check_health().await, None);
    assert_eq!(signals.recv().await, Some(RemoteSignal::NotReady));
    assert!(signals.try_recv().is_err());
}

#[tokio::test]
async fn test_available_backend_skips_unhealthy_current() {
    let (live, _server) = echo_server().await;
    let dead = dead_addr().await;
    let (monitor, _signals) = ConnectivityMonitor::new(config(&dead));
    monitor.update_servers(&[live.clone()]);
    monitor.check_health().await;

    {
        let mut backends = monitor.backends.write();
        let dead_idx = backends.rotation().into_iter().find(|(_, a)| *a == dead).unwrap().0;
        backends.set_current(dead_idx);
    }
    assert_eq!(monitor.get_available_backend().await.unwrap(), live);
    assert_eq!(monitor.current_backend(), Some(live));
}

#[tokio::test]
async fn test_available_backend_fails_when_all_down() {
    let dead_a = dead_addr().await;
    let dead_b = dead_addr().await;
    let (monitor, _signals) = ConnectivityMonitor::new(config(&dead_a));
    monitor.update_servers(&[dead_b]);

    let err = monitor.get_available_backend().await.unwrap_err();
    assert!(err.to_string().contains("all servers failed"));
}

#[tokio::test]
async fn test_proxy_pipes_bytes_and_closes_on_unhealthy_backend() {
    let (backend, server) = echo_server().await;
    let (monitor, _signals) = ConnectivityMonitor::new(config(&backend));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    monitor.start_proxy_task(listener);

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
    assert_eq!(monitor.status().backends[0].connections, 1);

    server.abort();
    let _ = server.await;
    monitor.check_health().await;

    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest))
        .await
        .expect("proxy should close the client side");
    assert_eq!(read.unwrap(), 0);
    assert_eq!(monitor.status().backends[0].connections, 0);
    monitor.stop();
}

#[tokio::test]
async fn test_proxy_forwards_half_close() {
    let (backend, _server) = echo_server().await;
    let (monitor, _signals) = ConnectivityMonitor::new(config(&backend));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    monitor.start_proxy_task(listener);

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    client.write_all(b"request").await.unwrap();
    client.shutdown().await.unwrap();

    // The response still drains after the client stops writing.
    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut reply))
        .await
        .expect("proxy should finish both directions")
        .unwrap();
    assert_eq!(reply, b"request");
    monitor.stop();
}

#[test]
fn test_dropped_server_connections_are_closed() {
    let mut set = BackendSet::new("f:1");
    set.set_servers(&["a:1".into(), "b:1".into()]);
    let (close_a, close_rx_a) = tokio::sync::watch::channel(false);
    let (close_b, close_rx_b) = tokio::sync::watch::channel(false);
    set.add_connection("a:1", 1, close_a);
    set.add_connection("b:1", 2, close_b);

    assert!(set.set_servers(&["b:1".into()]));
    assert_eq!(set.connection_count("a:1"), 0);
    assert!(*close_rx_a.borrow());
    assert_eq!(set.connection_count("b:1"), 1);
    assert!(!*close_rx_b.borrow());
}

#[test]
fn test_endpoint_addresses() {
    let endpoints = ResourceObject::try_from(serde_json::json!({
        "metadata": {"name": "kubernetes", "namespace": "default"},
        "subsets": [
            {
                "addresses": [{"ip": "10.0.0.5"}, {"ip": "10.0.0.6"}],
                "ports": [{"name": "metrics", "port": 9000}, {"name": "https", "port": 6443}]
            },
            {"addresses": [{"ip": "10.0.0.7"}]}
        ]
    }))
    .unwrap();
    assert_eq!(endpoint_addresses(&endpoints), ["10.0.0.5:6443", "10.0.0.6:6443"]);
}

#[tokio::test]
async fn test_discovery_follows_endpoints() {
    let api = Arc::new(MemoryResourceApi::new());
    let endpoints = ResourceObject::try_from(serde_json::json!({
        "metadata": {"name": "kubernetes", "namespace": "default"},
        "subsets": [{"addresses": [{"ip": "10.1.0.1"}], "ports": [{"port": 6443}]}]
    }))
    .unwrap();
    api.create(ResourceKind::Endpoints, &endpoints).await.unwrap();

    let (monitor, _signals) = ConnectivityMonitor::new(config("10.0.0.1:6443"));
    monitor.start_discovery_task(api.clone());

    let wait_for = |expected: Vec<&'static str>| {
        let monitor = Arc::clone(&monitor);
        async move {
            for _ in 0..100 {
                if monitor.servers() == expected {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            panic!("servers never became {expected:?}: {:?}", monitor.servers());
        }
    };
    wait_for(vec!["10.1.0.1:6443", "10.0.0.1:6443"]).await;

    api.delete(ResourceKind::Endpoints, Some("default"), "kubernetes").await.unwrap();
    wait_for(vec!["10.0.0.1:6443"]).await;
    monitor.stop();
}
