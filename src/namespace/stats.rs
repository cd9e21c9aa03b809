/*!
 * Interface Counters
 * Parser for the kernel's /proc/net/dev table
 */

use super::types::{InterfaceStatistics, NamespaceError, NamespaceResult};
use std::collections::HashMap;

/// Parse `/proc/<pid>/net/dev` content into per-interface counters
pub fn parse_net_dev(content: &str) -> NamespaceResult<HashMap<String, InterfaceStatistics>> {
    let mut stats = HashMap::new();

    // Two header lines precede the table
    for line in content.lines().skip(2) {
        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };

        let fields = counters
            .split_whitespace()
            .map(|f| f.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                NamespaceError::NetworkError(format!("malformed net/dev line {:?}: {}", line, e))
            })?;

        if fields.len() < 16 {
            return Err(NamespaceError::NetworkError(format!(
                "net/dev line has {} counters, expected 16",
                fields.len()
            )));
        }

        stats.insert(
            name.trim().to_string(),
            InterfaceStatistics {
                rx_bytes: fields[0],
                rx_packets: fields[1],
                rx_errors: fields[2],
                rx_dropped: fields[3],
                tx_bytes: fields[8],
                tx_packets: fields[9],
                tx_errors: fields[10],
                tx_dropped: fields[11],
            },
        );
    }

    Ok(stats)
}
