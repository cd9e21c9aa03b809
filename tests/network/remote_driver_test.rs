/*!
 * Remote Driver Tests
 * Plugin handshake and network driver calls against a fake HTTP plugin
 */

use super::common::Fixture;
use ai_os_network::ControllerConfig;
use ai_os_network::{EndpointOptions, NetworkError, Options, SandboxOptions};
use axum::http::{StatusCode, Uri};
use axum::Router;
use pretty_assertions::assert_eq;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

type Calls = Arc<Mutex<Vec<String>>>;

/// Serve `reply` on a loopback port from a background runtime
fn spawn_plugin(reply: fn(&str) -> (StatusCode, String)) -> (SocketAddr, Calls) {
    spawn_delayed_plugin(reply, Duration::ZERO)
}

/// Like `spawn_plugin`, holding every reply back for `delay`
fn spawn_delayed_plugin(
    reply: fn(&str) -> (StatusCode, String),
    delay: Duration,
) -> (SocketAddr, Calls) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();
    let router = Router::new().fallback(move |uri: Uri| {
        let recorded = recorded.clone();
        async move {
            let method = uri.path().trim_start_matches('/').to_string();
            recorded.lock().unwrap().push(method.clone());
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            reply(&method)
        }
    });

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router).await.unwrap();
        });
    });

    (addr, calls)
}

fn install_spec(fx: &Fixture, name: &str, addr: SocketAddr) {
    fs::write(
        fx.path("plugins").join(format!("{}.spec", name)),
        format!("tcp://{}\n", addr),
    )
    .unwrap();
}

fn ok(body: &str) -> (StatusCode, String) {
    (StatusCode::OK, body.to_string())
}

fn volume_plugin(method: &str) -> (StatusCode, String) {
    match method {
        "Plugin.Activate" => ok(r#"{"Implements": ["VolumeDriver"]}"#),
        _ => (StatusCode::NOT_FOUND, String::new()),
    }
}

fn network_plugin(method: &str) -> (StatusCode, String) {
    match method {
        "Plugin.Activate" => ok(r#"{"Implements": ["NetworkDriver"]}"#),
        "NetworkDriver.CreateNetwork" => ok("null"),
        "NetworkDriver.CreateEndpoint" => ok(
            r#"{"Interfaces": [{"ID": 0, "Address": "10.10.0.2/24", "MacAddress": "02:00:0a:0a:00:02"}]}"#,
        ),
        "NetworkDriver.EndpointOperInfo" => ok(r#"{"Value": {"com.example.vlan": 42}}"#),
        "NetworkDriver.Join" => ok(
            r#"{"InterfaceNames": [{"SrcName": "rveth0", "DstPrefix": "eth"}], "Gateway": "10.10.0.1"}"#,
        ),
        "NetworkDriver.Leave" | "NetworkDriver.DeleteEndpoint" => ok(""),
        "NetworkDriver.DeleteNetwork" => ok("{}"),
        _ => (StatusCode::NOT_FOUND, String::new()),
    }
}

fn failing_plugin(method: &str) -> (StatusCode, String) {
    match method {
        "Plugin.Activate" => ok(r#"{"Implements": ["NetworkDriver"]}"#),
        "NetworkDriver.CreateNetwork" => ok(r#"{"Err": "no vlan left"}"#),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "not json".into()),
    }
}

#[test]
fn test_plugin_without_network_driver() {
    let fx = Fixture::new();
    let (addr, _) = spawn_plugin(volume_plugin);
    install_spec(&fx, "invalid-network-driver", addr);

    let err = fx
        .controller
        .new_network("invalid-network-driver", "dummy", Options::new())
        .unwrap_err();
    assert!(
        matches!(err, NetworkError::NotImplements { .. }),
        "unexpected error: {:?}",
        err
    );
}

#[test]
fn test_remote_network_lifecycle() {
    let fx = Fixture::new();
    let (addr, calls) = spawn_plugin(network_plugin);
    install_spec(&fx, "valid-network-driver", addr);

    let network = fx
        .controller
        .new_network("valid-network-driver", "dummy", Options::new())
        .unwrap();
    assert_eq!(network.network_type(), "valid-network-driver");

    let ep = network.create_endpoint("ep", EndpointOptions::new()).unwrap();
    let ep_info = ep.info();
    let iface = &ep_info.interface_list()[0];
    assert_eq!(iface.address.unwrap().ip(), Ipv4Addr::new(10, 10, 0, 2));
    assert_eq!(iface.mac_address.as_deref(), Some("02:00:0a:0a:00:02"));
    assert_eq!(ep.driver_info().unwrap()["com.example.vlan"], 42);

    let sb = fx.controller.new_sandbox("remote", SandboxOptions::new()).unwrap();
    ep.join(Some(&sb)).unwrap();
    assert_eq!(ep.info().gateway(), Some(Ipv4Addr::new(10, 10, 0, 1)));
    assert!(sb.statistics().unwrap().contains_key("eth0"));

    ep.leave(Some(&sb)).unwrap();
    ep.delete().unwrap();
    network.delete().unwrap();

    // A second network reuses the activated driver without a new handshake
    fx.controller
        .new_network("valid-network-driver", "again", Options::new())
        .unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(
        calls.iter().filter(|c| *c == "Plugin.Activate").count(),
        1
    );
    assert_eq!(
        calls.as_slice(),
        [
            "Plugin.Activate",
            "NetworkDriver.CreateNetwork",
            "NetworkDriver.CreateEndpoint",
            "NetworkDriver.EndpointOperInfo",
            "NetworkDriver.Join",
            "NetworkDriver.Leave",
            "NetworkDriver.DeleteEndpoint",
            "NetworkDriver.DeleteNetwork",
            "NetworkDriver.CreateNetwork",
        ]
    );
}

#[test]
fn test_remote_driver_errors() {
    let fx = Fixture::new();
    let (addr, _) = spawn_plugin(failing_plugin);
    install_spec(&fx, "flaky", addr);

    let err = fx
        .controller
        .new_network("flaky", "dummy", Options::new())
        .unwrap_err();
    assert_eq!(err, NetworkError::Driver("no vlan left".into()));

    // The name is free again after the driver refused
    assert!(matches!(
        fx.controller.network_by_name("dummy"),
        Err(NetworkError::NoSuchNetwork(_))
    ));
}

#[test]
fn test_unreachable_plugin() {
    let fx = Fixture::new();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    install_spec(&fx, "gone", addr);

    let err = fx
        .controller
        .new_network("gone", "dummy", Options::new())
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {:?}", err);
}

#[test]
fn test_slow_plugin_times_out() {
    let fx = Fixture::with_config(|config: ControllerConfig| {
        config.with_plugin_timeout(Duration::from_millis(200))
    });
    let (addr, calls) = spawn_delayed_plugin(network_plugin, Duration::from_secs(3));
    install_spec(&fx, "slow", addr);

    let started = Instant::now();
    let err = fx
        .controller
        .new_network("slow", "dummy", Options::new())
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {:?}", err);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!calls
        .lock()
        .unwrap()
        .iter()
        .any(|c| c == "NetworkDriver.CreateNetwork"));

    // The refused name stays free
    assert!(matches!(
        fx.controller.network_by_name("dummy"),
        Err(NetworkError::NoSuchNetwork(_))
    ));
}
