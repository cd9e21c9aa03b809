/*!
 * ID Generation
 * Random identifiers for networks, endpoints and sandboxes
 */

use uuid::Uuid;

/// Length of the abbreviated form used in namespace keys and interface names
pub const SHORT_ID_LEN: usize = 12;

/// Generate a new 32 character hexadecimal identifier
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Abbreviate an identifier, never splitting a multi-byte character
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
