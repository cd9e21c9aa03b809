/*!
 * Namespace Guard
 * RAII entry into a network namespace for the current OS thread
 */

use super::types::{NamespaceError, NamespaceResult};
use log::{debug, error};
use nix::sched::{setns, CloneFlags};
use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

/// Switches the calling thread into a namespace and switches back on drop
///
/// Namespace membership belongs to the OS thread, so the guard is `!Send`.
pub struct NamespaceGuard {
    origin: Option<File>,
    _pinned: PhantomData<*const ()>,
}

impl NamespaceGuard {
    /// Enter the namespace bound at `key`
    pub fn enter(key: &Path) -> NamespaceResult<Self> {
        let origin = File::open(THREAD_NETNS)?;
        let target = File::open(key)
            .map_err(|e| NamespaceError::NotFound(format!("{}: {}", key.display(), e)))?;

        setns(&target, CloneFlags::CLONE_NEWNET).map_err(|e| {
            NamespaceError::PermissionDenied(format!("setns {}: {}", key.display(), e))
        })?;

        debug!("Thread entered network namespace {}", key.display());
        Ok(Self {
            origin: Some(origin),
            _pinned: PhantomData,
        })
    }
}

impl Drop for NamespaceGuard {
    fn drop(&mut self) {
        if let Some(origin) = self.origin.take() {
            if let Err(e) = setns(&origin, CloneFlags::CLONE_NEWNET) {
                error!("Failed to restore original network namespace: {}", e);
            }
        }
    }
}
