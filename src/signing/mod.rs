//! Connection URL signing
//!
//! The realtime ASR endpoint authenticates each WebSocket connection through
//! its query string: identity parameters plus the session's business
//! parameters are sorted, encoded and signed with HMAC-SHA1.

mod params;
mod signer;

pub use params::{BusinessParams, RAW_PCM_ENCODING};
pub use signer::{canonical_query, format_utc, sign, Credentials, RequestSigner};
