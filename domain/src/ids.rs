//! Document id generation for stores that do not assign ids themselves.

use crate::base62::{encode_u64, MAX_U64_DIGITS};
use crate::{IdGenerator, UserId};

/// Base62 id generator. Deterministic w.r.t. `seq`, but sequence numbers are
/// scrambled first so consecutive ids do not look consecutive. The scramble is
/// a bijection on `u64`, so distinct sequence numbers never collide.
/// If `min_width` is set, left-pads with '0' to reach the minimal length.
#[derive(Clone, Copy, Debug)]
pub struct Base62IdGenerator {
    min_width: usize,
}

impl Base62IdGenerator {
    pub fn new(min_width: usize) -> Self {
        Self { min_width }
    }
}

impl Default for Base62IdGenerator {
    fn default() -> Self {
        Self::new(MAX_U64_DIGITS)
    }
}

impl IdGenerator for Base62IdGenerator {
    fn next_id(&self, seq: u64) -> UserId {
        let mut s = encode_u64(scramble(seq));
        if s.len() < self.min_width {
            let mut buf = "0".repeat(self.min_width - s.len());
            buf.push_str(&s);
            s = buf;
        }
        // Valid by construction: non-empty alphanumerics
        UserId::new(s).unwrap_or_else(|_| UserId(String::from("0")))
    }
}

/// splitmix64 finalizer; every step is invertible.
fn scramble(seq: u64) -> u64 {
    let mut z = seq.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
