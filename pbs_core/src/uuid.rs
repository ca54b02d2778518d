// Copyright 2026 the PBS client authors. MIT license.
//! A 128-bit identifier split into two 64-bit words, matching the wire and
//! textual format of `cc/core/common/uuid/src/uuid.cc`.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use once_cell::sync::Lazy;
use rand::RngCore;
use thiserror::Error;

const HEX_MAP: &[u8; 16] = b"0123456789ABCDEF";

/// The zero Uuid, reserved to mean "no activity".
pub const ZERO_UUID: Uuid = Uuid { high: 0, low: 0 };

/// A 128-bit identifier: high word is a process-wide monotonic counter
/// seeded from wall-clock nanoseconds at process start, low word is
/// uniformly random.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Uuid {
  pub high: u64,
  pub low: u64,
}

static MONOTONIC_HIGH: Lazy<AtomicU64> = Lazy::new(|| {
  let nanos = std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_nanos() as u64;
  AtomicU64::new(nanos)
});

impl Uuid {
  /// Generates a new Uuid. High word is an atomically-incremented
  /// process-wide counter; low word is uniformly random.
  pub fn generate() -> Self {
    let high = MONOTONIC_HIGH.fetch_add(1, Ordering::Relaxed);
    let low = rand::thread_rng().next_u64();
    Uuid { high, low }
  }

  pub fn is_zero(&self) -> bool {
    *self == ZERO_UUID
  }
}

fn append_hex_byte(byte: u64, out: &mut String) {
  out.push(HEX_MAP[((byte >> 4) & 0x0F) as usize] as char);
  out.push(HEX_MAP[(byte & 0x0F) as usize] as char);
}

impl fmt::Display for Uuid {
  // Guid format is 00000000-0000-0000-0000-000000000000
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut s = String::with_capacity(36);
    let high = self.high;
    let low = self.low;

    // 4 bytes
    append_hex_byte((high >> 56) & 0xFF, &mut s);
    append_hex_byte((high >> 48) & 0xFF, &mut s);
    append_hex_byte((high >> 40) & 0xFF, &mut s);
    append_hex_byte((high >> 32) & 0xFF, &mut s);
    s.push('-');
    // 2 bytes
    append_hex_byte((high >> 24) & 0xFF, &mut s);
    append_hex_byte((high >> 16) & 0xFF, &mut s);
    s.push('-');
    // 2 bytes
    append_hex_byte((high >> 8) & 0xFF, &mut s);
    append_hex_byte(high & 0xFF, &mut s);
    s.push('-');
    // 2 bytes
    append_hex_byte((low >> 56) & 0xFF, &mut s);
    append_hex_byte((low >> 48) & 0xFF, &mut s);
    s.push('-');
    // 6 bytes
    append_hex_byte((low >> 40) & 0xFF, &mut s);
    append_hex_byte((low >> 32) & 0xFF, &mut s);
    append_hex_byte((low >> 24) & 0xFF, &mut s);
    append_hex_byte((low >> 16) & 0xFF, &mut s);
    append_hex_byte((low >> 8) & 0xFF, &mut s);
    append_hex_byte(low & 0xFF, &mut s);

    write!(f, "{s}")
  }
}

impl fmt::Debug for Uuid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Uuid({self})")
  }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid uuid string")]
pub struct UuidParseError;

fn read_hex(bytes: &[u8], offset: usize) -> Result<u64, UuidParseError> {
  let hi = hex_value(bytes[offset])?;
  let lo = hex_value(bytes[offset + 1])?;
  Ok(((hi << 4) | lo) as u64)
}

fn hex_value(b: u8) -> Result<u8, UuidParseError> {
  match b {
    b'0'..=b'9' => Ok(b - b'0'),
    // Generation never produces lowercase, but the original parser
    // rejects it anyway; preserved here (see DESIGN.md open question).
    b'A'..=b'F' => Ok(b - b'A' + 10),
    _ => Err(UuidParseError),
  }
}

impl std::str::FromStr for Uuid {
  type Err = UuidParseError;

  /// Parses the canonical uppercase-hex, dashed textual form. Rejects
  /// lowercase hex, non-hex characters, wrong length, and dashes in the
  /// wrong position.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let bytes = s.as_bytes();
    if bytes.len() != 36 {
      return Err(UuidParseError);
    }
    if bytes[8] != b'-' || bytes[13] != b'-' || bytes[18] != b'-' || bytes[23] != b'-' {
      return Err(UuidParseError);
    }
    for (i, &b) in bytes.iter().enumerate() {
      if matches!(i, 8 | 13 | 18 | 23) {
        continue;
      }
      hex_value(b)?;
    }

    let high = (read_hex(bytes, 0)? << 56)
      | (read_hex(bytes, 2)? << 48)
      | (read_hex(bytes, 4)? << 40)
      | (read_hex(bytes, 6)? << 32)
      | (read_hex(bytes, 9)? << 24)
      | (read_hex(bytes, 11)? << 16)
      | (read_hex(bytes, 14)? << 8)
      | read_hex(bytes, 16)?;

    let low = (read_hex(bytes, 19)? << 56)
      | (read_hex(bytes, 21)? << 48)
      | (read_hex(bytes, 24)? << 40)
      | (read_hex(bytes, 26)? << 32)
      | (read_hex(bytes, 28)? << 24)
      | (read_hex(bytes, 30)? << 16)
      | (read_hex(bytes, 32)? << 8)
      | read_hex(bytes, 34)?;

    Ok(Uuid { high, low })
  }
}
