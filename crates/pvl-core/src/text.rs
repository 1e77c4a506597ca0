//! Text manipulations used by `whitespace_normalize` and `assert_find_base64`.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};

/// Collapse every run of whitespace into a single space and trim both ends.
pub fn whitespace_normalize(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `haystack` embeds the base64 rendering of `needle`.
///
/// Whitespace is ignored entirely so that blocks wrapped across lines, or
/// indented inside a post, still match. The padded encoding is tried first,
/// then the unpadded one for renderings that drop trailing `=`.
pub fn find_base64_block(haystack: &str, needle: &[u8]) -> bool {
    if needle.is_empty() {
        return false;
    }
    let compact: String = haystack.chars().filter(|c| !c.is_whitespace()).collect();
    let padded = STANDARD.encode(needle);
    if compact.contains(&padded) {
        return true;
    }
    let unpadded = STANDARD_NO_PAD.encode(needle);
    unpadded != padded && compact.contains(&unpadded)
}
