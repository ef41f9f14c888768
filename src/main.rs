mod access_code;
mod dispatch;
mod error;
mod invite;
mod ipc;
mod roster;

use std::io::{self, BufRead, Write};

fn main() {
    // ROSTERD_FAIL_DISPATCH=1 swaps in a gateway whose sends always fail,
    // so the rollback path can be driven from the outside.
    let fail_dispatch = std::env::var("ROSTERD_FAIL_DISPATCH")
        .map(|v| v == "1")
        .unwrap_or(false);
    let mut state = if fail_dispatch {
        ipc::AppState::with_failing_gateway()
    } else {
        ipc::AppState::new()
    };

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

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; ignore.
                let _ = writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
