// SPDX-License-Identifier: MIT

//! Wave construction (part of C6): chunk a priority-sorted finding list into
//! contiguously-numbered waves.

use chrono::{DateTime, Utc};
use rf_core::{Finding, Wave};

/// Chunk `findings` (already sorted by priority descending) into waves of
/// `wave_size`, numbered 1..N. The last wave may be smaller.
pub fn build_waves(findings: &[Finding], wave_size: usize, now: DateTime<Utc>) -> Vec<Wave> {
    if wave_size == 0 {
        return Vec::new();
    }
    findings
        .chunks(wave_size)
        .enumerate()
        .map(|(i, chunk)| {
            let finding_ids = chunk.iter().map(|f| f.id.clone()).collect();
            Wave::new((i + 1) as u32, finding_ids, now)
        })
        .collect()
}
