// File: comparator.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

/// Status line of a raw response: everything before the first `\n`, with a
/// trailing `\r` stripped.
pub fn status_line(response: &[u8]) -> &[u8] {
    let line = match response.iter().position(|&b| b == b'\n') {
        Some(pos) => &response[..pos],
        None => response,
    };
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// `a` lies within 80%..120% of `b`.
fn within_band(a: usize, b: usize) -> bool {
    let (a, b) = (a as u128, b as u128);
    5 * a >= 4 * b && 5 * a <= 6 * b
}

/// Whether two raw responses are considered the same answer: identical status
/// lines and raw lengths within 20% of each other, checked in both directions.
pub fn responses_equal(a: &[u8], b: &[u8]) -> bool {
    if status_line(a) != status_line(b) {
        return false;
    }

    within_band(a.len(), b.len()) && within_band(b.len(), a.len())
}
