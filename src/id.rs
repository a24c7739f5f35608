//! Subscription handles and URIs.

use uuid::Uuid;

use crate::resource::ResourcePath;

/// Length of a generated subscription handle.
pub const HANDLE_LEN: usize = 16;

/// Path segment separating a resource from its feeds.
pub const FEEDS_SEGMENT: &str = "_feeds";

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates a fresh subscription handle.
///
/// The handle is [`HANDLE_LEN`] base-36 characters drawn from 128 uniformly
/// random bits. Collisions are not handled: the cache rejects a duplicate key
/// as a logic error.
#[must_use]
pub fn generate_handle() -> String {
    let mut n = random_u128();
    let mut out = [0u8; HANDLE_LEN];
    for slot in &mut out {
        // `n % 36` is always a valid alphabet index.
        #[allow(clippy::cast_possible_truncation)]
        let digit = (n % 36) as usize;
        *slot = ALPHABET[digit];
        n /= 36;
    }
    out.iter().map(|&b| char::from(b)).collect()
}

/// 128 random bits from the OS CSPRNG via two v4 UUIDs.
///
/// A v4 UUID fixes six version and variant bits. Rotating the second UUID by
/// 64 moves its fixed bits onto random bits of the first, so every bit of the
/// XOR is random.
fn random_u128() -> u128 {
    Uuid::new_v4().as_u128() ^ Uuid::new_v4().as_u128().rotate_left(64)
}

/// Builds `<resource>/_feeds/<operation>/<handle>`, the cache key and the
/// address a delivery client connects to.
#[must_use]
pub fn subscription_uri(resource: &ResourcePath, operation: &str, handle: &str) -> String {
    format!("{resource}/{FEEDS_SEGMENT}/{operation}/{handle}")
}
