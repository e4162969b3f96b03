// SPDX-License-Identifier: MIT

//! 8-char run id generation, the same alphabet and length `rf-http::run_id`
//! uses — both entry points (HTTP upload, CLI spawn) must produce ids that
//! satisfy the `^[A-Za-z0-9-]+$` charset the review path validates.

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
