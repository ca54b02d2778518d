// Copyright 2026 the PBS client authors. MIT license.
//! HTTP/2 connection pool, request multiplexer, and sync/async façades,
//! grounded on `cc/core/http2_client/src/*`. `nghttp2`'s connection/session
//! pair is replaced end-to-end by `hyper`/`hyper-util`/`hyper-rustls`
//! (spec.md §2 expansion), the way the teacher workspace already depends
//! on that stack for its own HTTP/2 fetch implementation.

pub mod client;
pub mod connection;
pub mod http_types;
pub mod pool;
pub mod status;
pub mod uri;

pub use client::AsyncHttpClient;
pub use client::ExponentialBackoffRetryStrategy;
pub use client::RetryStrategy;
pub use client::SyncHttpClient;
pub use client::SyncHttpClientResponse;
pub use connection::HttpConnection;
pub use connection::DEFAULT_HTTP2_READ_TIMEOUT;
pub use http_types::HttpMethod;
pub use http_types::HttpRequest;
pub use http_types::HttpResponse;
pub use pool::HttpConnectionPool;
pub use pool::DEFAULT_MAX_CONNECTIONS_PER_HOST;
pub use status::status_code_to_execution_result;
pub use uri::parse_uri;
pub use uri::ParsedUri;
