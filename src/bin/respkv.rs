/*!
 * respkv server entry point
 *
 * Parses CLI flags/env, initializes logging, spawns the expiration
 * sweeper, and runs the event loop. This call blocks until the process
 * exits.
 */

use anyhow::{Context, Result};
use respkv::config::parse_args;
use respkv::storage::{spawn_sweeper, Store};
use std::sync::Arc;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    let cfg = match parse_args(std::env::args().skip(1)).context("parsing arguments")? {
        Some(cfg) => cfg,
        None => {
            println!("respkv {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    let log_level = if cfg.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let store = Arc::new(Store::new());
    spawn_sweeper(Arc::clone(&store));

    let addr = cfg.addr();
    log::info!("respkv listening on {addr}");

    respkv::net::run(addr, store)
}
