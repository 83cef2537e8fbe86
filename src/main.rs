//! repcrep-sim - a replicated, snapshot-isolated transaction simulator
//!
//! Replays a command-stream file (`begin(T1)`, `W(T1,x2,100)`, `dump`, ...)
//! against a fixed 10-site, 20-variable cluster and prints a
//! human-readable status line to stdout for each command.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use log::info;

use repcrep_sim::{run_script, SimConfig};
use repcrep_sim::transaction_manager::TransactionManager;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = SimConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--script" | "-s" => {
                if i + 1 < args.len() {
                    config.script_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("repcrep-sim - replicated snapshot-isolated transaction simulator");
                println!();
                println!("Usage: repcrep-sim [OPTIONS] [SCRIPT]");
                println!();
                println!("Options:");
                println!("  -s, --script PATH   Command-stream file to replay (default: ./test1.txt)");
                println!("  -h, --help          Show this help");
                return Ok(());
            }
            other if !other.starts_with('-') => {
                config.script_path = other.into();
            }
            _ => {}
        }
        i += 1;
    }

    info!("Replaying script {}", config.script_path.display());

    let file = File::open(&config.script_path)?;
    let reader = BufReader::new(file);
    let mut tm = TransactionManager::new();

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    run_script(&mut tm, reader, |line| {
        use io::Write;
        if let Err(e) = writeln!(handle, "{line}") {
            log::error!("failed to write output: {e}");
        }
    })?;

    Ok(())
}
