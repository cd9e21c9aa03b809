/*!
 * Hosts File
 */

use std::fmt::Write;
use std::net::Ipv4Addr;

const DEFAULT_ENTRIES: &[(&str, &str)] = &[
    ("127.0.0.1", "localhost"),
    ("::1", "localhost ip6-localhost ip6-loopback"),
    ("fe00::0", "ip6-localnet"),
    ("ff00::0", "ip6-mcastprefix"),
    ("ff02::1", "ip6-allnodes"),
    ("ff02::2", "ip6-allrouters"),
];

/// Extra `<address>\t<name>` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub name: String,
    pub address: String,
}

/// Render the sandbox hosts file
///
/// The hostname line is only written when the sandbox has both a hostname and
/// an address for it.
pub fn build_hosts(
    address: Option<Ipv4Addr>,
    hostname: Option<&str>,
    domainname: Option<&str>,
    extra: &[HostRecord],
) -> String {
    let mut content = String::new();

    for (addr, names) in DEFAULT_ENTRIES {
        let _ = writeln!(content, "{}\t{}", addr, names);
    }

    if let (Some(ip), Some(host)) = (address, hostname.filter(|h| !h.is_empty())) {
        match domainname.filter(|d| !d.is_empty()) {
            Some(domain) => {
                let _ = writeln!(content, "{}\t{}.{} {}", ip, host, domain, host);
            }
            None => {
                let _ = writeln!(content, "{}\t{}", ip, host);
            }
        }
    }

    for record in extra {
        let _ = writeln!(content, "{}\t{}", record.address, record.name);
    }

    content
}
