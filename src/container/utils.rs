/// Length of a full Docker container id in hex characters.
const FULL_ID_LEN: usize = 64;

/// Checks whether the given string looks like a full container id.
///
/// Returns `true` if the input is exactly 64 bytes long and every byte is a
/// lowercase hex digit (`'0'..='9'`, `'a'..='f'`).
pub(crate) fn is_hex_id(src: &str) -> bool {
    src.len() == FULL_ID_LEN
        && src
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
