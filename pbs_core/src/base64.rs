// Copyright 2026 the PBS client authors. MIT license.
//! Base64 encode/decode helpers, grounded on
//! `cc/core/utils/src/base64.h` (not itself included in the retrieval
//! pack, but exercised by `cc/core/utils/test/base64_test.cc`, which this
//! module's tests mirror).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::result::failure;
use crate::result::ExecutionResultOr;
use crate::result::StatusCode;

/// Pads a base64 string with `=` to a multiple of 4 characters. A
/// remainder of 1 is never valid base64 and is rejected.
pub fn pad_base64_encoding(s: &str) -> ExecutionResultOr<String> {
  match s.len() % 4 {
    0 => Ok(s.to_string()),
    1 => Err(failure(StatusCode::CoreUtilsInvalidBase64EncodingLength)),
    2 => Ok(format!("{s}==")),
    3 => Ok(format!("{s}=")),
    _ => unreachable!(),
  }
}

/// Encodes `data` as base64. Rejects empty input (mirrors the original's
/// `SC_CORE_UTILS_INVALID_INPUT` on an empty string).
pub fn base64_encode(data: &[u8]) -> ExecutionResultOr<String> {
  if data.is_empty() {
    return Err(failure(StatusCode::CoreUtilsInvalidInput));
  }
  Ok(STANDARD.encode(data))
}

/// Decodes a base64 string, auto-padding short inputs to a multiple of 4
/// via `pad_base64_encoding`. An empty string decodes to an empty buffer.
pub fn base64_decode(encoded: &str) -> ExecutionResultOr<Vec<u8>> {
  if encoded.is_empty() {
    return Ok(Vec::new());
  }
  let padded = pad_base64_encoding(encoded)?;
  STANDARD
    .decode(padded)
    .map_err(|_| failure(StatusCode::CoreUtilsInvalidBase64EncodingLength))
}
