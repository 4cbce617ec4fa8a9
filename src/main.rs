mod config;
mod db;
mod delta;
mod edit;
mod ipc;
mod junction;
mod schema;
mod store;
mod validate;

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};

fn main() -> anyhow::Result<()> {
    let cfg = config::Config::parse();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&cfg.log)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let schema = schema::Schema::standard().context("invalid entity schema")?;
    let mut state = ipc::AppState::new(schema);

    if let Some(path) = &cfg.workspace {
        let conn = db::open_db(path)?;
        state.db = Some(conn);
        state.workspace = Some(path.clone());
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "schoold ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                writeln!(stdout, "{resp}")?;
                stdout.flush()?;
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        writeln!(stdout, "{resp}")?;
        stdout.flush()?;
    }
    Ok(())
}
