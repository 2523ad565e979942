#![deny(warnings)]

//! Headless CLI: play a number of turns and print the indicators.

use anyhow::{anyhow, Context, Result};
use sim_core::{GameSnapshot, GovernanceMode, SimConfig};
use sim_runtime::Game;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    turns: u64,
    mode: Option<GovernanceMode>,
    votes: Vec<(String, f64)>,
    json: bool,
    version: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        turns: 12,
        ..Args::default()
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--turns" => {
                let raw = it.next().ok_or_else(|| anyhow!("--turns needs a value"))?;
                args.turns = raw.parse().with_context(|| format!("bad --turns {raw}"))?;
            }
            "--mode" => {
                let raw = it.next().ok_or_else(|| anyhow!("--mode needs a value"))?;
                args.mode = Some(raw.parse::<GovernanceMode>().map_err(|e| anyhow!(e))?);
            }
            // --vote name=0.035, cast before every turn
            "--vote" => {
                let raw = it.next().ok_or_else(|| anyhow!("--vote needs name=rate"))?;
                let (name, rate) = raw
                    .split_once('=')
                    .ok_or_else(|| anyhow!("bad --vote {raw}, expected name=rate"))?;
                let rate = rate.parse().with_context(|| format!("bad vote rate {rate}"))?;
                args.votes.push((name.to_string(), rate));
            }
            "--json" => args.json = true,
            "--version" => args.version = true,
            other => return Err(anyhow!("unknown argument {other}")),
        }
    }
    Ok(args)
}

fn load_config(path: Option<&str>) -> Result<SimConfig> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading {p}"))?;
            Ok(SimConfig::from_yaml_str(&text)?)
        }
        None => Ok(SimConfig::default()),
    }
}

fn print_turn(snap: &GameSnapshot) {
    let s = &snap.state;
    println!(
        "T{:>3} {} | GDP {:>10.1} | CPI {:>6.1} | infl {:>6.2}% | emp {:>5.1}% | M2 {} | V {:.2} | FFR {:.2}%",
        snap.turn,
        s.period,
        s.gdp,
        s.cpi,
        s.inflation * 100.0,
        s.employment_rate * 100.0,
        s.money_supply,
        s.velocity,
        s.policy_rate * 100.0
    );
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    if args.version {
        println!(
            "{} {} ({} {})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }
    info!(config = ?args.config, turns = args.turns, "starting CLI");

    let config = load_config(args.config.as_deref())?;
    let game = Game::start_game(config)?;
    if let Some(mode) = args.mode {
        game.set_governance_mode(mode)?;
    }

    for _ in 0..args.turns {
        for (voter, rate) in &args.votes {
            game.submit_vote(voter, *rate)?;
        }
        game.advance_turn()?;
        if !args.json {
            print_turn(&game.snapshot()?);
        }
    }

    let snap = game.snapshot()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    } else {
        println!("Policy | {}", snap.policy.explanation);
        for msg in snap.messages().iter().rev().take(5) {
            println!("  {msg}");
        }
    }
    Ok(())
}
