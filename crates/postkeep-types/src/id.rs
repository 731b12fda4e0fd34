//! Post identifiers

use uuid::Uuid;

/// Length of a hyphenated UUID
pub const POST_ID_LEN: usize = 36;

/// Whether `id` has the shape of a post identifier: 36 characters drawn from
/// lowercase ASCII letters, digits and `-`.
pub fn is_post_id(id: &str) -> bool {
    id.len() == POST_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Generate a new time-ordered post identifier (UUIDv7).
pub fn new_post_id() -> String {
    Uuid::now_v7().to_string()
}
