//! wavecap-ctl — command-line interface for the wavecap daemon.

use anyhow::{Context, Result};

mod cmd;

const DEFAULT_PORT: u16 = 8080;

fn print_usage() {
    println!("Usage: wavecap-ctl [--port <port>] <command>");
    println!();
    println!("Daemon");
    println!("  health                          Check whether wavecapd is up");
    println!();
    println!("Sessions");
    println!("  session inspect <id>           Show persisted/missing chunks and assembly state");
    println!("  session cancel <id>            Cancel a session and remove its chunk subtree");
    println!("  session assemble <id>          Manually trigger assembly (idempotent)");
    println!();
    println!(
        "Options:\n  --port <port>                   API port (default: {})",
        DEFAULT_PORT
    );
    println!();
    println!("Examples:");
    println!("  wavecap-ctl health");
    println!("  wavecap-ctl session inspect 7f3a9c21");
    println!("  wavecap-ctl session assemble 7f3a9c21");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(args[i].clone());
        }
        i += 1;
    }

    let remaining_refs: Vec<&str> = remaining.iter().map(|s| s.as_str()).collect();

    match remaining_refs.as_slice() {
        ["health"] | [] => cmd::health::cmd_health(port).await,
        ["session", "inspect", id] => cmd::session::cmd_session_inspect(port, id).await,
        ["session", "cancel", id] => cmd::session::cmd_session_cancel(port, id).await,
        ["session", "assemble", id] => cmd::session::cmd_session_assemble(port, id).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
