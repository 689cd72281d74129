/*!
 * Core error types
 *
 * The codec boundary returns a typed `ProtocolError` rather than an opaque
 * `anyhow::Error` so the session loop can tell a genuine protocol
 * violation from simply needing more bytes. "Need more bytes" isn't an
 * error at all — `parse_request`/`parse_many` signal it with `Ok(None)`
 * and leave the partial request in the buffer for the next read.
 */

use thiserror::Error;

/// Errors produced while framing a request out of raw bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The leading byte was not `*`; this codec only accepts RESP arrays.
    #[error("unsupported message type")]
    UnsupportedMessageType,

    /// The buffer violates RESP framing (bad length line, wrong sigil, etc).
    #[error("protocol error: {0}")]
    Malformed(String),
}
