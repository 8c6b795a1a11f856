//! Push-channel client identifiers
//!
//! A client id correlates server-push events with the render request that
//! triggered them. Ids are `client_<unix-millis>_<9 base36 chars>`: unique
//! enough to avoid same-millisecond collisions in practice, with no
//! cryptographic guarantee.

use rand::Rng;

const SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a new client id from the current time and a random suffix
pub fn generate() -> String {
    generate_at(crate::time::now_millis())
}

/// Generate a client id for a specific timestamp (milliseconds)
pub fn generate_at(millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("client_{}_{}", millis, suffix)
}

/// Check whether a string has the client id shape
pub fn is_well_formed(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("client_") else {
        return false;
    };
    let Some((millis, suffix)) = rest.split_once('_') else {
        return false;
    };
    !millis.is_empty()
        && millis.chars().all(|c| c.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.bytes().all(|b| BASE36.contains(&b))
}
