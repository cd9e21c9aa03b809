/*!
 * Concurrency Tests
 * Racing joins on one endpoint and racing network creation
 */

use super::common::Fixture;
use ai_os_network::driver::BRIDGE;
use ai_os_network::store::endpoint_key;
use ai_os_network::{EndpointOptions, NetworkError, Options, SandboxOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 3;
const ITERATIONS: usize = 100;

#[test]
fn test_parallel_join_leave() {
    let fx = Fixture::new();
    let network = fx.bridge("parallel0");
    let ep = network.create_endpoint("ep", EndpointOptions::new()).unwrap();
    let joined = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let ep = ep.clone();
            let joined = joined.clone();
            let barrier = barrier.clone();
            let sb = fx
                .controller
                .new_sandbox(&format!("parallel{}", i), SandboxOptions::new())
                .unwrap();

            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ITERATIONS {
                    match ep.join(Some(&sb)) {
                        Ok(()) => {
                            assert_eq!(joined.fetch_add(1, Ordering::SeqCst), 0);
                            assert_eq!(sb.endpoint_ids().len(), 1);
                            joined.fetch_sub(1, Ordering::SeqCst);
                            ep.leave(Some(&sb)).unwrap();
                        }
                        Err(e) => assert!(e.is_forbidden(), "unexpected error: {:?}", e),
                    }
                }
                sb
            })
        })
        .collect();

    let sandboxes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(ep.info().sandbox().is_none());
    // The last leave is also the last record written
    let record = fx
        .controller
        .store()
        .get(&endpoint_key(network.id(), ep.id()))
        .unwrap()
        .unwrap();
    assert!(record.get("sandbox_id").is_none(), "{}", record);
    for sb in sandboxes {
        assert!(sb.endpoint_ids().is_empty());
        sb.delete().unwrap();
    }
    ep.delete().unwrap();
}

#[test]
fn test_parallel_delete_and_join() {
    let fx = Fixture::new();
    let network = fx.bridge("parallel1");
    let endpoints: Vec<_> = (0..8)
        .map(|i| {
            network
                .create_endpoint(&format!("ep{}", i), EndpointOptions::new())
                .unwrap()
        })
        .collect();
    let sb = fx.controller.new_sandbox("racing", SandboxOptions::new()).unwrap();

    let joiners: Vec<_> = endpoints
        .iter()
        .cloned()
        .map(|ep| {
            let sb = sb.clone();
            thread::spawn(move || match ep.join(Some(&sb)) {
                Ok(()) => {}
                Err(e) => assert!(e.is_forbidden(), "unexpected error: {:?}", e),
            })
        })
        .collect();
    let deleter = {
        let sb = sb.clone();
        thread::spawn(move || sb.delete().unwrap())
    };

    for handle in joiners {
        handle.join().unwrap();
    }
    deleter.join().unwrap();

    // Anything that joined before the delete was force-left
    sb.delete().unwrap();
    for ep in &endpoints {
        assert!(ep.info().sandbox().is_none());
        ep.delete().unwrap();
    }
}

#[test]
fn test_parallel_network_creation() {
    let fx = Fixture::new();
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let controller = fx.controller.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                controller.new_network(BRIDGE, "race", Options::new())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.into_iter().filter_map(Result::err) {
        assert_eq!(result, NetworkError::NetworkNameConflict("race".into()));
    }
}
