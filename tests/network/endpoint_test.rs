/*!
 * Endpoint Tests
 * Join and leave state machine, argument validation and info snapshots
 */

use super::common::Fixture;
use ai_os_network::namespace::InterfaceStatistics;
use ai_os_network::store::endpoint_key;
use ai_os_network::{
    EndpointOptions, NetworkError, NetworkResult, Options, SandboxHandle, SandboxOptions,
};
use pretty_assertions::assert_eq;
use std::any::Any;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Sandbox implementation the controller never created
struct ForeignSandbox {
    labels: Options,
}

impl SandboxHandle for ForeignSandbox {
    fn id(&self) -> &str {
        "foreign"
    }

    fn container_id(&self) -> &str {
        "foreign-container"
    }

    fn key(&self) -> &str {
        "/nonexistent"
    }

    fn labels(&self) -> &Options {
        &self.labels
    }

    fn statistics(&self) -> NetworkResult<HashMap<String, InterfaceStatistics>> {
        Ok(HashMap::new())
    }

    fn delete(&self) -> NetworkResult<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_join_and_leave() {
    let fx = Fixture::new();
    let network = fx.bridge("join0");
    let ep = network.create_endpoint("ep1", EndpointOptions::new()).unwrap();
    let sb = fx
        .controller
        .new_sandbox("container1", SandboxOptions::new().with_hostname("test"))
        .unwrap();

    let before = ep.info();
    assert!(before.gateway().is_none());
    assert!(before.sandbox().is_none());
    assert_eq!(before.interface_list().len(), 1);

    ep.join(Some(&sb)).unwrap();

    let info = ep.info();
    let gateway = info.gateway().unwrap();
    assert_ne!(gateway, Ipv4Addr::UNSPECIFIED);
    assert_eq!(info.sandbox().unwrap(), &sb);
    assert_eq!(info.sandbox_key(), Some(sb.key()));
    assert_eq!(ep.sandbox_id().as_deref(), Some(sb.id()));
    assert_eq!(sb.endpoint_ids(), vec![ep.id().to_string()]);

    ep.leave(Some(&sb)).unwrap();
    let after = ep.info();
    assert!(after.gateway().is_none());
    assert!(after.sandbox().is_none());
    assert!(sb.endpoint_ids().is_empty());

    ep.delete().unwrap();
    network.delete().unwrap();
    sb.delete().unwrap();
}

#[test]
fn test_join_validation() {
    let fx = Fixture::new();
    let network = fx.bridge("valid0");
    let ep = network.create_endpoint("ep1", EndpointOptions::new()).unwrap();

    let err = ep.join(None).unwrap_err();
    assert!(matches!(err, NetworkError::BadRequest(_)));
    let err = ep.leave(None).unwrap_err();
    assert!(matches!(err, NetworkError::BadRequest(_)));

    let foreign = ForeignSandbox {
        labels: Options::new(),
    };
    let err = ep.join(Some(&foreign)).unwrap_err();
    assert!(matches!(err, NetworkError::BadRequest(_)));

    let other = Fixture::new();
    let alien = other
        .controller
        .new_sandbox("alien", SandboxOptions::new())
        .unwrap();
    let err = ep.join(Some(&alien)).unwrap_err();
    assert!(matches!(err, NetworkError::BadRequest(_)), "{:?}", err);
}

#[test]
fn test_double_join_and_stray_leave() {
    let fx = Fixture::new();
    let network = fx.bridge("double0");
    let ep = network.create_endpoint("ep1", EndpointOptions::new()).unwrap();
    let sb1 = fx.controller.new_sandbox("c1", SandboxOptions::new()).unwrap();
    let sb2 = fx.controller.new_sandbox("c2", SandboxOptions::new()).unwrap();

    assert!(ep.leave(Some(&sb1)).unwrap_err().is_forbidden());

    ep.join(Some(&sb1)).unwrap();
    assert!(ep.join(Some(&sb1)).unwrap_err().is_forbidden());
    assert!(ep.join(Some(&sb2)).unwrap_err().is_forbidden());
    assert!(ep.leave(Some(&sb2)).unwrap_err().is_forbidden());

    let err = ep.delete().unwrap_err();
    assert!(matches!(err, NetworkError::ActiveContainer { .. }), "{:?}", err);

    ep.leave(Some(&sb1)).unwrap();
    assert!(ep.leave(Some(&sb1)).unwrap_err().is_forbidden());

    ep.join(Some(&sb2)).unwrap();
    ep.leave(Some(&sb2)).unwrap();
    ep.delete().unwrap();
}

#[test]
fn test_multiple_networks_share_sandbox() {
    let fx = Fixture::new();
    let net1 = fx.bridge("multi1");
    let net2 = fx.bridge("multi2");
    let ep1 = net1.create_endpoint("ep1", EndpointOptions::new()).unwrap();
    let ep2 = net2.create_endpoint("ep2", EndpointOptions::new()).unwrap();
    let sb = fx.controller.new_sandbox("multi", SandboxOptions::new()).unwrap();

    ep1.join(Some(&sb)).unwrap();
    ep2.join(Some(&sb)).unwrap();

    assert_eq!(ep1.info().sandbox_key(), ep2.info().sandbox_key());

    let stats = sb.statistics().unwrap();
    for name in ["lo", "eth0", "eth1"] {
        assert!(stats.contains_key(name), "missing {} in {:?}", name, stats.keys());
    }

    ep1.leave(Some(&sb)).unwrap();
    let stats = sb.statistics().unwrap();
    assert!(!stats.contains_key("eth0"));
    assert!(stats.contains_key("eth1"));

    // The lowest free index is reused
    ep1.join(Some(&sb)).unwrap();
    assert!(sb.statistics().unwrap().contains_key("eth0"));

    sb.delete().unwrap();
    assert!(ep1.info().sandbox().is_none());
    assert!(ep2.info().sandbox().is_none());
}

#[test]
fn test_join_is_persisted() {
    let fx = Fixture::new();
    let network = fx.bridge("store0");
    let ep = network.create_endpoint("ep1", EndpointOptions::new()).unwrap();
    let sb = fx.controller.new_sandbox("c1", SandboxOptions::new()).unwrap();
    let store = fx.controller.store();
    let key = endpoint_key(network.id(), ep.id());

    assert!(store.get(&key).unwrap().unwrap().get("sandbox_id").is_none());

    ep.join(Some(&sb)).unwrap();
    assert_eq!(store.get(&key).unwrap().unwrap()["sandbox_id"], sb.id());

    ep.leave(Some(&sb)).unwrap();
    ep.delete().unwrap();
    assert!(store.get(&key).unwrap().is_none());
}

#[test]
fn test_join_deleted_endpoint() {
    let fx = Fixture::new();
    let network = fx.bridge("gone0");
    let ep = network.create_endpoint("ep1", EndpointOptions::new()).unwrap();
    let sb = fx.controller.new_sandbox("c1", SandboxOptions::new()).unwrap();

    ep.delete().unwrap();
    let err = ep.join(Some(&sb)).unwrap_err();
    assert!(matches!(err, NetworkError::NoSuchEndpoint(_)));
    assert!(matches!(ep.delete(), Err(NetworkError::NoSuchEndpoint(_))));
}
