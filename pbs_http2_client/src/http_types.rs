// Copyright 2026 the PBS client authors. MIT license.
//! Wire request/response types, grounded on
//! `cc/core/interface/http_types.h` / `cc/core/interface/type_def.h`'s
//! `HttpRequest`/`HttpResponse`/`BytesBuffer`.

use http::HeaderMap;
use pbs_core::bytes_buffer::BytesBuffer;

/// Request method. Only `Get` and `Post` are wire-supported; `Put` and
/// `Unknown` always fail before transmission with
/// `StatusCode::Http2ClientHttpMethodNotSupported`, matching spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
  Get,
  Post,
  Put,
  Unknown,
}

/// An outbound HTTP request. `path` carries the full URI including
/// scheme; `query` is an optional raw (unescaped) query string appended
/// during `SendHttpRequest`'s percent-escaping step.
#[derive(Debug, Clone)]
pub struct HttpRequest {
  pub method: HttpMethod,
  pub path: String,
  pub query: Option<String>,
  pub headers: HeaderMap,
  pub body: BytesBuffer,
}

impl HttpRequest {
  pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
    HttpRequest {
      method,
      path: path.into(),
      query: None,
      headers: HeaderMap::new(),
      body: BytesBuffer::new(),
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(HttpMethod::Get, path)
  }

  pub fn post(path: impl Into<String>, body: BytesBuffer) -> Self {
    let mut request = Self::new(HttpMethod::Post, path);
    request.body = body;
    request
  }

  pub fn with_query(mut self, query: impl Into<String>) -> Self {
    self.query = Some(query.into());
    self
  }
}

/// An inbound HTTP response: status code plus headers and an accumulated
/// body buffer populated chunk-by-chunk as `on_data` fires.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
  pub code: u16,
  pub headers: HeaderMap,
  pub body: BytesBuffer,
}

impl HttpResponse {
  pub fn new(code: u16) -> Self {
    HttpResponse { code, headers: HeaderMap::new(), body: BytesBuffer::new() }
  }
}
