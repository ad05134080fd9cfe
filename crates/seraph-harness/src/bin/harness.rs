//! CLI entrypoint for the SERAPH conformance harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Scenario runner and small diagnostic tools for the SERAPH substrate.
#[derive(Debug, Parser)]
#[command(name = "seraph-harness")]
#[command(about = "Conformance testing harness for SERAPH")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the end-to-end scenarios and print a JSON report.
    Scenarios {
        /// Run only the named scenario instead of all of them.
        #[arg(long)]
        only: Option<String>,
        /// Write the JSON report here instead of stdout.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Compare two sparse vector clocks given as `node:ts` pairs.
    ClockCompare {
        /// e.g. "1:5,3:7"
        #[arg(long)]
        left: String,
        /// e.g. "2:4,3:6"
        #[arg(long)]
        right: String,
    },
    /// Replay a sequence of packet sequence numbers through a fresh
    /// replay window and report accept/reject for each.
    ReplayTrace {
        /// Comma-separated sequence numbers, in receipt order.
        #[arg(long)]
        sequence: String,
    },
}

fn parse_vclock(spec: &str) -> seraph_clock::VectorClock {
    let mut clock = seraph_clock::VectorClock::new();
    for pair in spec.split(',').filter(|s| !s.is_empty()) {
        let (node, ts) = pair.split_once(':').expect("pair must be node:ts");
        clock.set(node.parse().expect("node id must be u16"), ts.parse().expect("timestamp must be u64"));
    }
    clock
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Scenarios { only, report } => {
            let results = match only {
                Some(name) => match seraph_harness::run_one(&name) {
                    Some(r) => vec![r],
                    None => {
                        eprintln!("unknown scenario: {name}");
                        return Err(format!("unknown scenario {name}").into());
                    }
                },
                None => seraph_harness::run_all(),
            };

            let failed = results.iter().filter(|r| !r.pass).count();
            eprintln!("ran {} scenario(s), {} failed", results.len(), failed);

            let json = serde_json::to_string_pretty(&results)?;
            match report {
                Some(path) => std::fs::write(&path, json)?,
                None => println!("{json}"),
            }

            if failed > 0 {
                return Err(format!("{failed} scenario(s) failed").into());
            }
        }
        Command::ClockCompare { left, right } => {
            let a = parse_vclock(&left);
            let b = parse_vclock(&right);
            let order = a.compare(&b);
            eprintln!("comparing {left} vs {right}");
            println!("{order:?}");
        }
        Command::ReplayTrace { sequence } => {
            let mut window = seraph_dsm::security::ReplayWindow::new();
            let mut outcomes = Vec::new();
            for tok in sequence.split(',').filter(|s| !s.is_empty()) {
                let seq: u64 = tok.parse()?;
                let accepted = window.check_and_record(seq);
                outcomes.push(serde_json::json!({ "sequence": seq, "accepted": accepted }));
            }
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
    }

    Ok(())
}
