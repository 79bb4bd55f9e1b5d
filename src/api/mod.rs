//! External REST service access.

pub mod client;

pub use client::{
    ApiClient, HttpApiClient, MAX_PAYLOAD_CHARS, TRUNCATION_MARKER, encode_query_value,
    normalize_target, truncate_payload,
};
