//! CLI host for the token ledger.
//!
//! Plays the execution context the ledger expects: one operation per
//! invocation, witnesses supplied by the caller, and all-or-nothing commit
//! of storage writes. The state file is rewritten only when the call
//! succeeds, so a failed call (including a partially applied
//! `transferMulti`) leaves the persisted ledger untouched.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use tracing::error;
use tracing_subscriber::EnvFilter;

use oep4_ledger::dispatch::dispatch;
use oep4_ledger::ledger::{Address, RecordingSink, TokenLedger, WitnessSet};
use oep4_ledger::store::MemoryStore;

#[derive(Parser)]
#[command(name = "oep4", version, about = "Fixed-supply token ledger host")]
struct Cli {
    /// Ledger state file; a missing file is an uninitialized ledger.
    #[arg(long, default_value = "ledger.json")]
    state: PathBuf,

    /// Hex address the call carries a witness for (repeatable).
    #[arg(long = "witness")]
    witnesses: Vec<String>,

    /// Operation name from the dispatch table.
    operation: String,

    /// Positional arguments, parsed as JSON; bare words become strings so
    /// addresses can be passed unquoted.
    args: Vec<String>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(result) => {
            println!("{result}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Value, Box<dyn std::error::Error>> {
    let store = load_state(&cli.state)?;
    let mut witness = WitnessSet::new();
    for encoded in &cli.witnesses {
        witness.grant(Address::from_hex(encoded)?);
    }
    let args: Vec<Value> = cli.args.iter().map(|raw| parse_arg(raw)).collect();

    let mut ledger = TokenLedger::new(store, witness, RecordingSink::new());
    let result = dispatch(&mut ledger, &cli.operation, &args)?;

    let (store, _, sink) = ledger.into_parts();
    for event in &sink.events {
        println!("{}", serde_json::to_string(event)?);
    }
    save_state(&cli.state, &store)?;
    Ok(result)
}

fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn load_state(path: &Path) -> Result<MemoryStore, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(MemoryStore::new());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn save_state(path: &Path, store: &MemoryStore) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(path, serde_json::to_string_pretty(store)?)?;
    Ok(())
}
