//! Access-code generation.
//!
//! Codes are what students (and linked parents) type instead of a full id:
//! 6 characters over uppercase letters and digits, unique among the codes
//! currently held by the roster. The caller passes the live in-use set and
//! the generator retries on collision up to a fixed cap.

use std::collections::HashSet;

use rand::Rng;

use crate::error::RosterError;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CODE_LEN: usize = 6;

/// Retry cap. The code space is ~2.2e9 against rosters of a few dozen, so
/// hitting this means something is wrong upstream, not bad luck.
const MAX_ATTEMPTS: u32 = 100;

/// Draws a fresh code not present in `in_use`, using the thread-local RNG.
pub fn generate(in_use: &HashSet<String>) -> Result<String, RosterError> {
    generate_with(&mut rand::thread_rng(), in_use)
}

/// RNG-injectable variant so tests can force collisions.
pub fn generate_with<R: Rng>(rng: &mut R, in_use: &HashSet<String>) -> Result<String, RosterError> {
    for _ in 0..MAX_ATTEMPTS {
        let code: String = (0..CODE_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        if !in_use.contains(&code) {
            return Ok(code);
        }
    }
    Err(RosterError::CodeSpaceExhausted(MAX_ATTEMPTS))
}
