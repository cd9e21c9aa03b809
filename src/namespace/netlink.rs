/*!
 * Netlink Helpers
 * rtnetlink requests driven by a thread-local runtime
 */

use super::types::{NamespaceError, NamespaceResult};
use futures::stream::TryStreamExt;
use log::debug;
use rtnetlink::{new_connection, Handle};
use std::future::Future;

/// Run netlink requests against the namespace of the calling thread
///
/// The socket is opened inside the call, so it binds to whatever namespace
/// the thread is in at that moment.
pub fn run<F, Fut, T>(f: F) -> NamespaceResult<T>
where
    F: FnOnce(Handle) -> Fut,
    Fut: Future<Output = NamespaceResult<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()?;

    runtime.block_on(async move {
        let (connection, handle, _) = new_connection().map_err(|e| {
            NamespaceError::NetworkError(format!("Failed to create netlink connection: {}", e))
        })?;
        tokio::spawn(connection);
        f(handle).await
    })
}

pub fn net_err(what: impl std::fmt::Display, e: rtnetlink::Error) -> NamespaceError {
    NamespaceError::NetworkError(format!("{}: {}", what, e))
}

/// Index of the named link, `None` when the link does not exist
pub async fn link_index(handle: &Handle, name: &str) -> Option<u32> {
    let mut links = handle.link().get().match_name(name.to_string()).execute();
    match links.try_next().await {
        Ok(Some(link)) => Some(link.header.index),
        Ok(None) => None,
        Err(e) => {
            debug!("Link {} lookup failed: {}", name, e);
            None
        }
    }
}

pub async fn require_link(handle: &Handle, name: &str) -> NamespaceResult<u32> {
    link_index(handle, name)
        .await
        .ok_or_else(|| NamespaceError::InterfaceNotFound(name.to_string()))
}

pub async fn set_up(handle: &Handle, index: u32) -> NamespaceResult<()> {
    handle
        .link()
        .set(index)
        .up()
        .execute()
        .await
        .map_err(|e| net_err(format!("link {} up", index), e))
}

/// Parse `aa:bb:cc:dd:ee:ff` into raw bytes
pub fn parse_mac(mac: &str) -> NamespaceResult<Vec<u8>> {
    let bytes = mac
        .split(':')
        .map(|octet| u8::from_str_radix(octet, 16))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| NamespaceError::InvalidConfig(format!("invalid MAC address {}", mac)))?;

    if bytes.len() != 6 {
        return Err(NamespaceError::InvalidConfig(format!(
            "invalid MAC address {}",
            mac
        )));
    }
    Ok(bytes)
}
