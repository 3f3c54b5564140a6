//! volley: single-connection QUIC latency benchmark.
//!
//! init -> run -> exit status

use std::io::Write;
use volley_core::{exit_code, run, Config};

fn main() {
    // logs on stderr with nanosecond timestamps, stdout is the report
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = buf.timestamp_nanos();
            writeln!(
                buf,
                "[{} {:5} {}:{}] {}",
                ts,
                record.level(),
                record.module_path().unwrap_or(""),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[volley] {}", e);
            std::process::exit(1);
        }
    };

    let stdout = std::io::stdout().lock();
    match run(&config, stdout) {
        Ok(outcome) => {
            log::info!("[volley] done: {:?}", outcome);
            std::process::exit(exit_code(&outcome));
        }
        Err(e) => {
            eprintln!("[volley] fatal: {}", e);
            std::process::exit(1);
        }
    }
}
