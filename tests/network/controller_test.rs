/*!
 * Controller Tests
 * Driver resolution, network registry and built-in networks
 */

use super::common::{bridge_options, Fixture};
use ai_os_network::driver::{NullDriver, BRIDGE};
use ai_os_network::{generic_options, NetworkError, Options};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_unknown_driver() {
    let fx = Fixture::new();
    let err = fx
        .controller
        .new_network("unknowndriver", "testnetwork", Options::new())
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {:?}", err);
}

#[test]
fn test_unresolvable_remote_driver() {
    let fx = Fixture::new();
    let err = fx
        .controller
        .new_network("framerelay", "dummy", Options::new())
        .unwrap_err();
    assert!(err.is_not_found());

    let err = fx
        .controller
        .configure_network_driver("framerelay", &Options::new())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_empty_network_name() {
    let fx = Fixture::new();
    let err = fx
        .controller
        .new_network(BRIDGE, "", Options::new())
        .unwrap_err();
    assert!(matches!(err, NetworkError::InvalidName(_)));
}

#[test]
fn test_duplicate_network() {
    let fx = Fixture::new();
    fx.controller
        .new_network(BRIDGE, "testdup", Options::new())
        .unwrap();

    let err = fx
        .controller
        .new_network(BRIDGE, "testdup", Options::new())
        .unwrap_err();
    assert_eq!(err, NetworkError::NetworkNameConflict("testdup".into()));
}

#[test]
fn test_builtin_network_names_are_taken() {
    let fx = Fixture::new();
    let err = fx
        .controller
        .new_network(BRIDGE, "host", Options::new())
        .unwrap_err();
    assert!(matches!(err, NetworkError::NetworkNameConflict(_)));
}

#[test]
fn test_host_and_null_are_single_instance() {
    let fx = Fixture::new();

    let err = fx
        .controller
        .new_network("host", "testhost", Options::new())
        .unwrap_err();
    assert!(err.is_forbidden(), "host network must be unique: {:?}", err);

    let err = fx
        .controller
        .new_network("null", "testnull", Options::new())
        .unwrap_err();
    assert!(err.is_forbidden());
}

#[test]
fn test_builtin_networks_cannot_be_deleted() {
    let fx = Fixture::new();
    for name in ["host", "none"] {
        let network = fx.controller.network_by_name(name).unwrap();
        assert!(network.is_builtin());
        assert!(network.delete().unwrap_err().is_forbidden());
    }
    assert_eq!(fx.controller.networks().len(), 2);
}

#[test]
fn test_network_lookup() {
    let fx = Fixture::new();
    let net = fx.bridge("lookup0");

    let by_name = fx.controller.network_by_name("lookup0").unwrap();
    let by_id = fx.controller.network_by_id(net.id()).unwrap();
    assert_eq!(by_name, net);
    assert_eq!(by_id, net);
    assert_eq!(by_id.network_type(), BRIDGE);

    assert!(matches!(
        fx.controller.network_by_name(""),
        Err(NetworkError::InvalidName(_))
    ));
    assert!(matches!(
        fx.controller.network_by_id(""),
        Err(NetworkError::InvalidId(_))
    ));
    assert!(matches!(
        fx.controller.network_by_name("missing"),
        Err(NetworkError::NoSuchNetwork(_))
    ));
    assert!(matches!(
        fx.controller.network_by_id("deadbeef"),
        Err(NetworkError::NoSuchNetwork(_))
    ));
}

#[test]
fn test_walk_networks_stops_early() {
    let fx = Fixture::new();
    fx.bridge("walk0");
    fx.bridge("walk1");

    let mut all = 0;
    fx.controller.walk_networks(|_| {
        all += 1;
        false
    });
    assert_eq!(all, 4);

    let mut found = None;
    let mut visited = 0;
    fx.controller.walk_networks(|n| {
        visited += 1;
        if n.name() == "walk1" {
            found = Some(n.clone());
            return true;
        }
        false
    });
    assert_eq!(found.unwrap().name(), "walk1");
    assert!(visited <= 4);
}

#[test]
fn test_register_driver() {
    let fx = Fixture::new();

    let err = fx
        .controller
        .register_driver("null", Arc::new(NullDriver::new()))
        .unwrap_err();
    assert!(err.is_forbidden());

    fx.controller
        .register_driver("blackhole", Arc::new(NullDriver::new()))
        .unwrap();
    let net = fx
        .controller
        .new_network("blackhole", "void", Options::new())
        .unwrap();
    assert_eq!(net.network_type(), "blackhole");
}

#[test]
fn test_configure_bridge_driver() {
    let fx = Fixture::new();
    fx.controller
        .configure_network_driver(BRIDGE, &generic_options(json!({ "EnableIPForwarding": false })))
        .unwrap();

    let err = fx
        .controller
        .configure_network_driver(BRIDGE, &generic_options(json!({ "EnableIPForwarding": "yes" })))
        .unwrap_err();
    assert!(matches!(err, NetworkError::BadRequest(_)));
}

#[test]
fn test_driver_failure_releases_name() {
    let fx = Fixture::new();
    fx.bridge("br-a");

    // Same bridge device again: the driver refuses, the name stays free
    let err = fx
        .controller
        .new_network(BRIDGE, "other", bridge_options("br-a", None))
        .unwrap_err();
    assert!(err.is_forbidden());

    fx.controller
        .new_network(BRIDGE, "other", bridge_options("br-b", None))
        .unwrap();
}
