// Core modules for the respkv key-value server
pub mod config; // CLI/env configuration
pub mod dispatch; // command dispatch table (arity, options, reply typing)
pub mod error; // ProtocolError
pub mod net; // bind_reuseport + serve/run (event loop)
pub mod protocol; // RESP codec: Reply + parse_request/parse_many
pub mod storage; // Store + Value + expiration

pub use config::{ConfigError, ServerConfig};
pub use dispatch::dispatch;
pub use error::ProtocolError;
pub use protocol::{parse_many, parse_request, Reply};
pub use storage::{Store, Value};

/// Default RESP listening address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:6379";
