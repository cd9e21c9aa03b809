/*!
 * resolv.conf Handling
 * Filtering of the host DNS configuration and atomic file replacement
 */

use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::net::IpAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::NamedTempFile;

/// Public resolvers used when filtering leaves no nameserver
pub const DEFAULT_IPV4_NAMESERVERS: &[&str] = &["8.8.8.8", "8.8.4.4"];
pub const DEFAULT_IPV6_NAMESERVERS: &[&str] = &["2001:4860:4860::8888", "2001:4860:4860::8844"];

/// Mode used when the source file carries none
pub const DEFAULT_MODE: u32 = 0o644;

fn nameserver_of(line: &str) -> Option<&str> {
    let mut fields = line.split_whitespace();
    match fields.next() {
        Some("nameserver") => fields.next(),
        _ => None,
    }
}

fn is_localhost(ip: &IpAddr) -> bool {
    ip.is_loopback()
}

/// Nameserver addresses listed in `content`
pub fn nameservers(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(nameserver_of)
        .map(str::to_string)
        .collect()
}

/// Drop localhost nameservers, and IPv6 ones unless `ipv6` is set
///
/// Every other line is kept byte for byte. When no nameserver survives the
/// default public resolvers are appended.
pub fn filter_resolv_conf(content: &str, ipv6: bool) -> String {
    let mut filtered = String::with_capacity(content.len());

    for line in content.split_inclusive('\n') {
        let drop = nameserver_of(line)
            .and_then(|ns| ns.parse::<IpAddr>().ok())
            .map(|ip| is_localhost(&ip) || (ip.is_ipv6() && !ipv6))
            .unwrap_or(false);
        if !drop {
            filtered.push_str(line);
        }
    }

    if nameservers(&filtered).is_empty() {
        if !filtered.is_empty() && !filtered.ends_with('\n') {
            filtered.push('\n');
        }
        let v6: &[&str] = if ipv6 { DEFAULT_IPV6_NAMESERVERS } else { &[] };
        for ns in DEFAULT_IPV4_NAMESERVERS.iter().chain(v6) {
            filtered.push_str("nameserver ");
            filtered.push_str(ns);
            filtered.push('\n');
        }
    }

    filtered
}

/// Read a file together with its permission bits
pub fn read_with_mode(path: &Path) -> io::Result<(Vec<u8>, u32)> {
    let content = fs::read(path)?;
    let mode = fs::metadata(path)?.permissions().mode() & 0o7777;
    Ok((content, mode))
}

/// Replace `path` with `content` atomically and apply `mode`
pub fn write_atomic(path: &Path, content: &[u8], mode: u32) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.as_file().set_permissions(Permissions::from_mode(mode))?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
