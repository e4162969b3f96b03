// SPDX-License-Identifier: MIT

//! 8-char run id generation (§4.12). Short enough to type into a URL,
//! long enough that two runs started in the same second don't collide in
//! practice.

use rand::Rng;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..8)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}
