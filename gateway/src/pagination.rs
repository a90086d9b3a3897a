//! Cursor pagination for the ledger history endpoint.
//!
//! The cursor is an opaque base64 string wrapping the last sequence number
//! the caller has seen. History reads are restartable by construction
//! (`seq > cursor`), so a client can resume after a disconnect without
//! missing or duplicating entries.

use serde::{Deserialize, Serialize};

/// Default page size when `count` is not specified.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Maximum allowed page size.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Query parameters accepted by the history endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    /// Token kind to list, e.g. "spendable_coin". Defaults to all kinds
    /// being rejected — the caller must pick one.
    pub kind: Option<String>,
    /// Opaque cursor from a previous response.
    pub since: Option<String>,
    /// Number of items per page (default 100, max 1000).
    pub count: Option<u32>,
}

impl HistoryQuery {
    /// Resolve effective page size, clamped to `[1, MAX_PAGE_SIZE]`.
    pub fn effective_count(&self) -> u32 {
        self.count
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Decode the cursor to the last-seen sequence number. Returns 0 (the
    /// beginning of history) when absent or invalid.
    pub fn since_seq(&self) -> u64 {
        self.since.as_deref().and_then(decode_cursor).unwrap_or(0)
    }
}

/// Pagination metadata included in history responses.
#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    /// Cursor to pass for the next page, or `None` on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Encode a sequence number into an opaque cursor string.
pub fn encode_cursor(seq: u64) -> String {
    base64_encode(seq.to_string().as_bytes())
}

/// Decode a cursor string back to a sequence number.
pub fn decode_cursor(cursor: &str) -> Option<u64> {
    let bytes = base64_decode(cursor)?;
    std::str::from_utf8(&bytes).ok()?.parse::<u64>().ok()
}

/// Next-page cursor: the seq of the last entry returned, or `None` when
/// the page came back short (end of history).
pub fn next_cursor(last_seq: Option<u64>, returned: usize, page_size: u32) -> Option<String> {
    if (returned as u32) < page_size {
        return None;
    }
    last_seq.map(encode_cursor)
}

// Minimal base64 helpers; cursors are tiny, no extra dependency needed.

const B64_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b = [
            chunk[0] as u32,
            chunk.get(1).copied().unwrap_or(0) as u32,
            chunk.get(2).copied().unwrap_or(0) as u32,
        ];
        let triple = (b[0] << 16) | (b[1] << 8) | b[2];
        out.push(B64_CHARS[((triple >> 18) & 0x3F) as usize] as char);
        out.push(B64_CHARS[((triple >> 12) & 0x3F) as usize] as char);
        out.push(if chunk.len() > 1 {
            B64_CHARS[((triple >> 6) & 0x3F) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            B64_CHARS[(triple & 0x3F) as usize] as char
        } else {
            '='
        });
    }
    out
}

fn base64_decode(input: &str) -> Option<Vec<u8>> {
    fn val(c: u8) -> Option<u32> {
        match c {
            b'A'..=b'Z' => Some(u32::from(c - b'A')),
            b'a'..=b'z' => Some(u32::from(c - b'a') + 26),
            b'0'..=b'9' => Some(u32::from(c - b'0') + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }
    let bytes: Vec<u8> = input.bytes().filter(|&b| b != b'=').collect();
    let mut out = Vec::new();
    for chunk in bytes.chunks(4) {
        let mut accum: u32 = 0;
        let mut bits = 0;
        for &b in chunk {
            accum = (accum << 6) | val(b)?;
            bits += 6;
        }
        accum <<= 24 - bits;
        out.push((accum >> 16) as u8);
        if chunk.len() > 2 {
            out.push((accum >> 8) as u8);
        }
        if chunk.len() > 3 {
            out.push(accum as u8);
        }
    }
    Some(out)
}
