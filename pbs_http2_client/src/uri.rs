// Copyright 2026 the PBS client authors. MIT license.
//! URI parsing and percent-escaping, grounded on
//! `cc/core/utils/src/http.{h,cc}`'s `GetEscapedUriWithQuery`. Only the
//! query component is percent-escaped; the path and scheme are passed
//! through untouched.

use percent_encoding::utf8_percent_encode;
use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

use pbs_core::result::failure;
use pbs_core::result::ExecutionResultOr;
use pbs_core::StatusCode;

/// Characters the original C++ client's curl-based escaper leaves
/// unescaped in query strings, mirroring the common `curl_easy_escape`
/// safe set extended with URI-reserved separators query strings use
/// (`=`, `&`) so a multi-parameter query round-trips.
const QUERY_SAFE: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'~')
  .remove(b'=')
  .remove(b'&');

/// The parsed components of an endpoint URI needed to select/create a
/// pooled connection: scheme, host, and port (as a string, matching
/// nghttp2's `service` parameter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
  pub is_https: bool,
  pub host: String,
  pub service: String,
}

impl ParsedUri {
  /// The `host:port` key used to index the connection pool.
  pub fn pool_key(&self) -> String {
    format!("{}:{}", self.host, self.service)
  }
}

/// Parses `uri` into scheme/host/port. Only `http` and `https` schemes
/// are accepted; anything else (including a parse failure) returns
/// `Failure(Http2ClientInvalidUri)`, matching spec.md §4.4 step 1.
pub fn parse_uri(uri: &str) -> ExecutionResultOr<ParsedUri> {
  let parsed =
    fluent_uri::Uri::parse(uri).map_err(|_| failure(StatusCode::Http2ClientInvalidUri))?;
  let scheme = parsed.scheme().map(|s| s.as_str().to_ascii_lowercase());
  let is_https = match scheme.as_deref() {
    Some("https") => true,
    Some("http") => false,
    _ => return Err(failure(StatusCode::Http2ClientInvalidUri)),
  };
  let authority = parsed.authority().ok_or_else(|| failure(StatusCode::Http2ClientInvalidUri))?;
  let host = authority.host().to_string();
  if host.is_empty() {
    return Err(failure(StatusCode::Http2ClientInvalidUri));
  }
  let service = authority
    .port()
    .filter(|p| !p.is_empty())
    .map(|p| p.to_string())
    .unwrap_or_else(|| if is_https { "443".to_string() } else { "80".to_string() });

  Ok(ParsedUri { is_https, host, service })
}

/// Percent-escapes the query component of `path`+`query` and
/// reconstitutes `path?escaped_query`, matching `GetEscapedUriWithQuery`.
/// Returns `path` unchanged if there is no query.
pub fn escaped_uri_with_query(
  path: &str,
  query: Option<&str>,
) -> ExecutionResultOr<String> {
  match query {
    None | Some("") => Ok(path.to_string()),
    Some(query) => {
      let escaped = utf8_percent_encode(query, QUERY_SAFE).to_string();
      Ok(format!("{path}?{escaped}"))
    }
  }
}
