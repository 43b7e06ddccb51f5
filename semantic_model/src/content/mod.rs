//! Helpers for information payloads.

/// Content type reported when none was set.
pub const DEFAULT_CONTENT_TYPE: &str = "application/unknown";

const SMALL_LIMIT: usize = 100;
const LARGE_THRESHOLD: usize = 1024 * 1024;
const LARGE_PREFIX: usize = 500;
const LARGE_STRIDE: usize = 1000;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Cheap, stable fingerprint of a payload. Not a cryptographic digest.
///
/// - up to 100 bytes: every byte
/// - up to 1 MiB: the first 100 bytes, then every 100th byte
/// - above: the first 500 bytes, then every 1000th byte
///
/// Payloads differing only outside the sampled offsets collide.
pub fn content_fingerprint(content: &[u8]) -> i32 {
    let (prefix, stride) = if content.len() <= SMALL_LIMIT {
        (content.len(), 1)
    } else if content.len() <= LARGE_THRESHOLD {
        (SMALL_LIMIT, SMALL_LIMIT)
    } else {
        (LARGE_PREFIX, LARGE_STRIDE)
    };

    let mix = |acc: i32, byte: u8| acc.wrapping_mul(31).wrapping_add(byte as i8 as i32);

    let mut hash = content[..prefix].iter().fold(17_i32, |acc, b| mix(acc, *b));
    let mut cursor = prefix;
    while cursor < content.len() {
        hash = mix(hash, content[cursor]);
        cursor += stride;
    }
    hash
}
