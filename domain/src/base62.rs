//! Base62 encoding utilities used for document id generation.

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of the longest base62 rendering of a `u64` (62^11 > 2^64).
pub const MAX_U64_DIGITS: usize = 11;

/// Encode an unsigned 64-bit integer into a base62 string using the alphabet
/// 0-9, A-Z, a-z. Zero encodes to "0".
pub fn encode_u64(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = [0u8; MAX_U64_DIGITS];
    let mut i = buf.len();
    while n > 0 {
        let rem = (n % 62) as usize;
        i -= 1;
        buf[i] = ALPHABET[rem];
        n /= 62;
    }
    buf[i..].iter().map(|&b| b as char).collect()
}
