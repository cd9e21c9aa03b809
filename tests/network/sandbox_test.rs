/*!
 * Sandbox Tests
 * Registry, hosts file, statistics and deletion
 */

use super::common::Fixture;
use ai_os_network::controller::{HOST_NETWORK, NONE_NETWORK};
use ai_os_network::{EndpointOptions, NetworkError, SandboxOptions};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::Path;

#[test]
fn test_sandbox_registry() {
    let fx = Fixture::new();

    let err = fx
        .controller
        .new_sandbox("", SandboxOptions::new())
        .unwrap_err();
    assert!(matches!(err, NetworkError::InvalidId(_)));

    let sb = fx
        .controller
        .new_sandbox(
            "registry",
            SandboxOptions::new().with_label("com.example.role", json!("web")),
        )
        .unwrap();
    assert_eq!(sb.container_id(), "registry");
    assert_eq!(sb.labels()["com.example.role"], "web");
    assert!(Path::new(sb.key()).exists());
    assert!(sb.key().starts_with(fx.path("netns").to_str().unwrap()));

    assert_eq!(fx.controller.sandbox_by_id(sb.id()).unwrap(), sb);
    assert!(matches!(
        fx.controller.sandbox_by_id(""),
        Err(NetworkError::InvalidId(_))
    ));
    assert!(matches!(
        fx.controller.sandbox_by_id("nope"),
        Err(NetworkError::NoSuchSandbox(_))
    ));

    fx.controller.new_sandbox("second", SandboxOptions::new()).unwrap();
    assert_eq!(fx.controller.sandboxes().len(), 2);

    let mut visited = 0;
    fx.controller.walk_sandboxes(|_| {
        visited += 1;
        true
    });
    assert_eq!(visited, 1);
}

#[test]
fn test_fresh_sandbox_has_loopback() {
    let fx = Fixture::new();
    let sb = fx.controller.new_sandbox("lo", SandboxOptions::new()).unwrap();
    let stats = sb.statistics().unwrap();
    assert_eq!(stats.keys().collect::<Vec<_>>(), vec!["lo"]);
}

#[test]
fn test_hosts_file() {
    let fx = Fixture::new();
    let network = fx.bridge("hosts0");
    let ep = network.create_endpoint("ep", EndpointOptions::new()).unwrap();
    let hosts = fx.path("hosts");

    let sb = fx
        .controller
        .new_sandbox(
            "hosts",
            SandboxOptions::new()
                .with_hostname("web")
                .with_domainname("example.org")
                .with_extra_host("db", "10.1.2.3")
                .with_hosts_path(&hosts),
        )
        .unwrap();
    assert!(!hosts.exists());

    ep.join(Some(&sb)).unwrap();

    let address = ep.info().interface_list()[0].address.unwrap().ip();
    let content = fs::read_to_string(&hosts).unwrap();
    assert!(content.starts_with("127.0.0.1\tlocalhost\n"));
    assert!(
        content.contains(&format!("{}\tweb.example.org web\n", address)),
        "{}",
        content
    );
    assert!(content.ends_with("10.1.2.3\tdb\n"));
}

#[test]
fn test_delete_force_leaves() {
    let fx = Fixture::new();
    let net1 = fx.bridge("del1");
    let net2 = fx.bridge("del2");
    let ep1 = net1.create_endpoint("ep1", EndpointOptions::new()).unwrap();
    let ep2 = net2.create_endpoint("ep2", EndpointOptions::new()).unwrap();
    let sb = fx.controller.new_sandbox("del", SandboxOptions::new()).unwrap();
    let key = sb.key().to_string();

    ep1.join(Some(&sb)).unwrap();
    ep2.join(Some(&sb)).unwrap();

    sb.delete().unwrap();

    assert!(ep1.info().sandbox().is_none());
    assert!(ep2.info().sandbox().is_none());
    assert!(!Path::new(&key).exists());
    assert!(matches!(
        fx.controller.sandbox_by_id(sb.id()),
        Err(NetworkError::NoSuchSandbox(_))
    ));

    // Second delete is harmless, joins are refused
    sb.delete().unwrap();
    assert!(ep1.join(Some(&sb)).unwrap_err().is_forbidden());

    ep1.delete().unwrap();
    ep2.delete().unwrap();
    net1.delete().unwrap();
    net2.delete().unwrap();
}

#[test]
fn test_delete_tolerates_manual_leave() {
    let fx = Fixture::new();
    let network = fx.bridge("manual0");
    let ep = network.create_endpoint("ep", EndpointOptions::new()).unwrap();
    let sb = fx.controller.new_sandbox("manual", SandboxOptions::new()).unwrap();

    ep.join(Some(&sb)).unwrap();
    ep.leave(Some(&sb)).unwrap();
    sb.delete().unwrap();
    assert!(fx.controller.sandboxes().is_empty());
}

#[test]
fn test_default_files_removed_on_delete() {
    let fx = Fixture::new();
    let network = fx.bridge("files0");
    let ep = network.create_endpoint("ep", EndpointOptions::new()).unwrap();
    let sb = fx.controller.new_sandbox("files", SandboxOptions::new()).unwrap();

    ep.join(Some(&sb)).unwrap();
    let resolv = sb.resolv_conf_path().to_path_buf();
    assert!(resolv.exists());
    assert!(sb.hosts_path().exists());

    sb.delete().unwrap();
    assert!(!resolv.exists());
}

#[test]
fn test_stop_deletes_everything() {
    let fx = Fixture::new();
    let network = fx.bridge("stop0");
    let ep = network.create_endpoint("ep", EndpointOptions::new()).unwrap();
    let shared = fx
        .controller
        .new_sandbox("shared", SandboxOptions::new().with_default_sandbox())
        .unwrap();
    let own = fx.controller.new_sandbox("own", SandboxOptions::new()).unwrap();
    assert_ne!(shared.key(), own.key());

    ep.join(Some(&shared)).unwrap();
    fx.controller.stop().unwrap();

    assert!(fx.controller.sandboxes().is_empty());
    assert!(ep.info().sandbox().is_none());
    assert!(!Path::new(shared.key()).exists());
    ep.delete().unwrap();
}

#[test]
fn test_host_network_default_sandboxes() {
    let fx = Fixture::new();
    let network = fx.controller.network_by_name(HOST_NETWORK).unwrap();
    let ep1 = network.create_endpoint("testep1", EndpointOptions::new()).unwrap();
    let ep2 = network.create_endpoint("testep2", EndpointOptions::new()).unwrap();
    assert!(ep1.info().interface_list().is_empty());

    let sb1 = fx
        .controller
        .new_sandbox("host_c1", SandboxOptions::new().with_default_sandbox())
        .unwrap();
    let sb2 = fx
        .controller
        .new_sandbox("host_c2", SandboxOptions::new().with_default_sandbox())
        .unwrap();
    assert_eq!(sb1.key(), sb2.key());

    ep1.join(Some(&sb1)).unwrap();
    ep2.join(Some(&sb2)).unwrap();

    // Interfaceless joins still write the sandbox files
    assert!(sb1.hosts_path().exists());
    assert!(sb1.resolv_conf_path().exists());
    let stats = sb1.statistics().unwrap();
    assert_eq!(stats.keys().collect::<Vec<_>>(), vec!["lo"]);
    assert_eq!(ep1.info().sandbox(), Some(&sb1));
    assert_eq!(ep1.info().gateway(), None);

    ep1.leave(Some(&sb1)).unwrap();
    ep2.leave(Some(&sb2)).unwrap();
    ep1.delete().unwrap();
    ep2.delete().unwrap();

    let err = network.delete().unwrap_err();
    assert!(err.is_forbidden(), "{:?}", err);

    sb1.delete().unwrap();
    // The shared namespace outlives its first user
    assert!(Path::new(sb2.key()).exists());
    sb2.delete().unwrap();
}

#[test]
fn test_null_network_join() {
    let fx = Fixture::new();
    let network = fx.controller.network_by_name(NONE_NETWORK).unwrap();
    let ep = network.create_endpoint("testep", EndpointOptions::new()).unwrap();
    let sb = fx.controller.new_sandbox("null_c1", SandboxOptions::new()).unwrap();

    ep.join(Some(&sb)).unwrap();
    assert_eq!(sb.endpoint_ids(), vec![ep.id().to_string()]);
    assert!(sb.hosts_path().exists());
    let stats = sb.statistics().unwrap();
    assert_eq!(stats.keys().collect::<Vec<_>>(), vec!["lo"]);

    ep.leave(Some(&sb)).unwrap();
    assert!(sb.endpoint_ids().is_empty());
    ep.delete().unwrap();

    let err = network.delete().unwrap_err();
    assert!(err.is_forbidden(), "{:?}", err);
    sb.delete().unwrap();
}

#[test]
fn test_hosts_address_after_interfaceless_join() {
    let fx = Fixture::new();
    let host_ep = fx
        .controller
        .network_by_name(HOST_NETWORK)
        .unwrap()
        .create_endpoint("host-ep", EndpointOptions::new())
        .unwrap();
    let bridge_ep = fx
        .bridge("hosts1")
        .create_endpoint("bridge-ep", EndpointOptions::new())
        .unwrap();

    let sb = fx
        .controller
        .new_sandbox(
            "late-address",
            SandboxOptions::new().with_default_sandbox().with_hostname("web"),
        )
        .unwrap();

    host_ep.join(Some(&sb)).unwrap();
    let content = fs::read_to_string(sb.hosts_path()).unwrap();
    assert!(!content.contains("\tweb\n"), "{}", content);

    bridge_ep.join(Some(&sb)).unwrap();
    let address = bridge_ep.info().interface_list()[0].address.unwrap().ip();
    let content = fs::read_to_string(sb.hosts_path()).unwrap();
    assert!(
        content.contains(&format!("{}\tweb\n", address)),
        "{}",
        content
    );
}
