/*!
 * CLI / environment configuration
 *
 * Outside the core's contract (the core only cares that bytes arrive and
 * replies leave), implemented as a small hand-rolled argv-parsing and env
 * var layer rather than reaching for a derive-based CLI crate, since this
 * is a single-binary, no-subcommand server.
 */

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_PORT: u16 = 6379;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown flag '{0}'")]
    UnknownFlag(String),
    #[error("flag '{0}' requires a value")]
    MissingValue(String),
    #[error("invalid value '{value}' for '{flag}'")]
    InvalidValue { flag: String, value: String },
}

/// Resolved server configuration: where to listen and how loud to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: DEFAULT_BIND,
            port: DEFAULT_PORT,
            verbose: false,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Parse CLI flags, falling back to `RESPKV_BIND`/`RESPKV_PORT` env vars and
/// finally to the hardcoded defaults. CLI flags win over environment.
///
/// Recognized flags: `--bind <addr>`, `--port <port>`, `-v`/`--verbose`,
/// `--version`. An explicit `--version` short-circuits by returning
/// `Ok(None)`; the caller is expected to print the version and exit.
pub fn parse_args<I: IntoIterator<Item = String>>(
    args: I,
) -> Result<Option<ServerConfig>, ConfigError> {
    let mut cfg = ServerConfig {
        bind: env_bind().unwrap_or(DEFAULT_BIND),
        port: env_port().unwrap_or(DEFAULT_PORT),
        verbose: false,
    };

    let mut it = args.into_iter();
    while let Some(flag) = it.next() {
        match flag.as_str() {
            "--bind" => {
                let v = it.next().ok_or_else(|| ConfigError::MissingValue(flag.clone()))?;
                cfg.bind = v
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue { flag, value: v })?;
            }
            "--port" => {
                let v = it.next().ok_or_else(|| ConfigError::MissingValue(flag.clone()))?;
                cfg.port = v
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue { flag, value: v })?;
            }
            "-v" | "--verbose" => cfg.verbose = true,
            "--version" => return Ok(None),
            other => return Err(ConfigError::UnknownFlag(other.to_string())),
        }
    }

    Ok(Some(cfg))
}

fn env_bind() -> Option<IpAddr> {
    env::var("RESPKV_BIND").ok()?.parse().ok()
}

fn env_port() -> Option<u16> {
    env::var("RESPKV_PORT").ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_flags_or_env() {
        let cfg = parse_args(std::iter::empty::<String>()).unwrap().unwrap();
        assert_eq!(cfg.bind, DEFAULT_BIND);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(!cfg.verbose);
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = parse_args(
            ["--bind", "127.0.0.1", "--port", "9999", "-v"]
                .iter()
                .map(|s| s.to_string()),
        )
        .unwrap()
        .unwrap();
        assert_eq!(cfg.bind, "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(cfg.port, 9999);
        assert!(cfg.verbose);
    }

    #[test]
    fn unknown_flag_errors() {
        let err = parse_args(["--nope".to_string()]).unwrap_err();
        assert_eq!(err, ConfigError::UnknownFlag("--nope".into()));
    }

    #[test]
    fn missing_value_errors() {
        let err = parse_args(["--port".to_string()]).unwrap_err();
        assert_eq!(err, ConfigError::MissingValue("--port".into()));
    }

    #[test]
    fn version_flag_short_circuits() {
        assert_eq!(parse_args(["--version".to_string()]).unwrap(), None);
    }
}
