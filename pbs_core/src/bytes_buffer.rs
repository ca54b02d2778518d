// Copyright 2026 the PBS client authors. MIT license.
//! A growable byte buffer with an explicit `capacity >= length` invariant,
//! used as the wire payload type for HTTP request/response bodies.
//! Grounded on `cc/core/interface/type_def.h`'s `BytesBuffer` and on
//! `bytes::BytesMut`'s reserve/split semantics, which this wraps directly
//! rather than reimplementing.

use bytes::Buf;
use bytes::BytesMut;
use std::fmt;

/// A byte buffer that tracks length separately from capacity, mirroring
/// `BytesBuffer::length`/`BytesBuffer::capacity` in the original
/// interface. Unlike a bare `Vec<u8>`, callers can reserve capacity ahead
/// of knowing the final length (e.g. before a streamed HTTP body read).
#[derive(Clone, Default)]
pub struct BytesBuffer {
  data: BytesMut,
}

impl BytesBuffer {
  pub fn new() -> Self {
    BytesBuffer { data: BytesMut::new() }
  }

  pub fn with_capacity(capacity: usize) -> Self {
    BytesBuffer { data: BytesMut::with_capacity(capacity) }
  }

  pub fn from_vec(bytes: Vec<u8>) -> Self {
    BytesBuffer { data: BytesMut::from(&bytes[..]) }
  }

  pub fn length(&self) -> usize {
    self.data.len()
  }

  pub fn capacity(&self) -> usize {
    self.data.capacity()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.data
  }

  pub fn reserve(&mut self, additional: usize) {
    self.data.reserve(additional);
  }

  pub fn extend_from_slice(&mut self, extra: &[u8]) {
    self.data.extend_from_slice(extra);
  }

  pub fn clear(&mut self) {
    self.data.clear();
  }

  pub fn into_vec(self) -> Vec<u8> {
    self.data.to_vec()
  }

  pub fn to_vec(&self) -> Vec<u8> {
    self.data.to_vec()
  }
}

impl fmt::Debug for BytesBuffer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BytesBuffer")
      .field("length", &self.length())
      .field("capacity", &self.capacity())
      .finish()
  }
}

impl From<Vec<u8>> for BytesBuffer {
  fn from(bytes: Vec<u8>) -> Self {
    BytesBuffer::from_vec(bytes)
  }
}

impl From<&[u8]> for BytesBuffer {
  fn from(bytes: &[u8]) -> Self {
    let mut buffer = BytesBuffer::with_capacity(bytes.len());
    buffer.extend_from_slice(bytes);
    buffer
  }
}

impl From<String> for BytesBuffer {
  fn from(s: String) -> Self {
    BytesBuffer::from_vec(s.into_bytes())
  }
}

impl PartialEq for BytesBuffer {
  fn eq(&self, other: &Self) -> bool {
    self.data.as_ref() == other.data.as_ref()
  }
}

impl Eq for BytesBuffer {}

/// Drains the buffer, returning its contents without an extra copy when
/// the underlying allocation permits it.
impl BytesBuffer {
  pub fn drain(&mut self) -> Vec<u8> {
    let taken = std::mem::take(&mut self.data);
    taken.to_vec()
  }

  pub fn advance(&mut self, count: usize) {
    Buf::advance(&mut self.data, count);
  }
}
