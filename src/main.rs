mod calc;
mod ipc;
mod sessions;
mod sheet;

use std::io::{self, BufRead, Write};

use anyhow::Context;
use serde_json::json;

fn main() -> anyhow::Result<()> {
    let mut state = ipc::AppState::default();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // Can't address a reply without an id; answer a bare envelope.
            Err(e) => json!({
                "ok": false,
                "error": { "code": "bad_json", "message": e.to_string() },
            }),
        };

        writeln!(stdout, "{}", resp).context("write response")?;
        stdout.flush().context("flush response")?;
    }

    Ok(())
}
