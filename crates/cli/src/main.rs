//! # mdrecorder - Market Data Recorder Shell
//!
//! A REPL over the tick journal and the bitemporal tickstore. Reads
//! commands from stdin, prints results to stdout, logs to stderr. Works
//! interactively or scripted (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! RECORD product buy|sell size price   Append a tick to today's journal file
//! ROLL                                 Finalize the open journal day file
//! REPLAY yyyy-mm-dd                    Load a finalized journal day into the tickstore
//! SELECT symbol start end [as_of]      Query ticks (RFC 3339 or yyyy-mm-dd instants)
//! DELETE symbol yyyy-mm-dd             Logically delete a day of a symbol
//! VERSIONS symbol yyyy-mm-dd           Show the version history of a day
//! DAYS                                 List journal day files
//! FLUSH                                Sync the journal and persist the index
//! STATS                                Print recorder state
//! EXIT / QUIT                          Finalize and shut down
//! ```
//!
//! ## Configuration
//!
//! See the `config` crate: `MDREC_CONFIG` names an optional TOML file and
//! `MDREC_*` variables override single settings. `RUST_LOG` sets the log
//! filter (default: `info`).
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p mdrecorder
//! > RECORD BTC-USD buy 0.5 8300
//! OK (day=2019-10-01, pos=56)
//! > ROLL
//! OK (finalized 2019-10-01)
//! > REPLAY 2019-10-01
//! data/ticks/2019/10/01/BTC-USD_0000.tick
//! OK (1 products)
//! > EXIT
//! bye
//! ```

mod shell;

use anyhow::{Context, Result};
use config::StoreConfig;
use shell::{Reply, Shell, HELP};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    init_tracing()?;
    let config = StoreConfig::from_env().context("failed to load configuration")?;
    tracing::debug!(?config, "configuration loaded");
    let mut shell = Shell::open(&config, clock::system())?;

    println!(
        "mdrecorder started (journal={}, capacity={}, schema=v{}, tickstore={})",
        config.journal_dir.display(),
        config.journal_capacity,
        config.journal_schema,
        config.tickstore_dir.display(),
    );
    println!("{HELP}");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match shell.execute(&line) {
            Reply::Continue(text) => {
                if !text.is_empty() {
                    println!("{text}");
                }
            }
            Reply::Exit(text) => {
                println!("{text}");
                return Ok(());
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    // stdin closed without EXIT.
    shell.close()?;
    Ok(())
}
