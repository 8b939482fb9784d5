//! `reflex-cli` – Reflex Command Line Interface
//!
//! Entry point for running the control loop against the simulated robot and
//! for inspecting the behaviour table.
//!
//! Commands:
//! - `start`   – run the control loop until Ctrl-C, then print its metrics
//! - `rules`   – list the default rule table
//! - `explain` – show which rule would fire for a set of `FACT=VALUE` facts
//! - `init`    – write the default `~/.reflex/config.toml`
//!
//! While `start` runs, each line typed on stdin is treated as a recognised
//! voice utterance (pass `--voice` or `--mode voice_control` to listen).

mod config;
mod ollama;
mod typed_voice;

use std::process::ExitCode;
use std::thread;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use reflex_hal::AudioListener;
use reflex_hal::sim::{SimActuator, SimVision};
use reflex_kernel::RuleEngine;
use reflex_runtime::{
    Collaborators, ControlLoop, DecisionEngine, ReasonerEngine, ReasonerProvider, init_tracing,
};
use reflex_types::{Context, FactValue, LoopMetrics, LoopMode};
use tracing::warn;

use config::{Config, EngineKind};
use typed_voice::LineTranscriber;

#[derive(Parser)]
#[command(
    name = "reflex",
    about = "Reflex – rule-driven control loop for small robots",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control loop against the simulated robot
    Start(StartArgs),

    /// List the default rule table
    Rules,

    /// Show which rule would fire for the given facts
    Explain {
        /// Facts such as `obstacle_distance=15` or `face_detected=true`
        #[arg(value_name = "FACT=VALUE", required = true)]
        facts: Vec<String>,

        /// Decision engine to ask
        #[arg(long, value_enum)]
        engine: Option<EngineKind>,
    },

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct StartArgs {
    /// Operating mode: autonomous, voice_control, tracking or exploration
    #[arg(long, default_value = "autonomous")]
    mode: LoopMode,

    /// Decision engine (overrides the config file)
    #[arg(long, value_enum)]
    engine: Option<EngineKind>,

    /// Cycles per second (overrides the config file)
    #[arg(long)]
    frequency: Option<f64>,

    /// Enable a rule by name (repeatable)
    #[arg(long = "enable-rule", value_name = "NAME")]
    enable_rules: Vec<String>,

    /// Disable a rule by name (repeatable)
    #[arg(long = "disable-rule", value_name = "NAME")]
    disable_rules: Vec<String>,

    /// Listen for typed voice commands in every mode
    #[arg(long)]
    voice: bool,

    /// Print the final metrics as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut cfg = match config::load_or_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            Config::default()
        }
    };
    if cli.verbose {
        cfg.log.level = "debug".to_string();
    }
    let _guard = init_tracing("reflex", &cfg.log);

    let result = match cli.command {
        Commands::Start(args) => start(cfg, args),
        Commands::Rules => {
            print_rules(&RuleEngine::with_default_rules());
            Ok(())
        }
        Commands::Explain { facts, engine } => explain(&cfg, &facts, engine.unwrap_or(cfg.engine)),
        Commands::Init { force } => init(&cfg, force),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// start
// ─────────────────────────────────────────────────────────────────────────────

fn start(mut cfg: Config, args: StartArgs) -> Result<(), String> {
    print_banner();

    if let Some(hz) = args.frequency {
        cfg.control.frequency_hz = hz;
    }
    if args.voice {
        cfg.control.voice_control = true;
    }
    let kind = args.engine.unwrap_or(cfg.engine);
    if kind == EngineKind::Reasoner && cfg.reasoner.provider == ReasonerProvider::Ollama {
        probe_ollama(cfg.reasoner.base_url());
    }
    let engine = build_engine(kind, &cfg, &args.enable_rules, &args.disable_rules)?;

    let audio = AudioListener::new(LineTranscriber::stdin())
        .with_wake_words(cfg.audio.wake_words.clone())
        .with_poll_interval(cfg.audio.poll_interval);
    let collaborators = Collaborators {
        vision: Box::new(SimVision::new(cfg.vision.clone())),
        audio: Box::new(audio),
        actuator: Box::new(SimActuator::new(cfg.robot.clone())),
    };
    let mut control = ControlLoop::new(cfg.control.clone(), collaborators, engine)
        .with_context_config(cfg.context.clone())
        .with_safety_config(cfg.safety.clone());

    println!(
        "  Mode {} · engine {} · {} Hz",
        args.mode.to_string().bold(),
        kind.to_string().bold(),
        cfg.control.frequency_hz
    );
    if cfg.control.voice_control || args.mode == LoopMode::VoiceControl {
        println!("  Type a command (e.g. {}) and press Enter.", "go forward".cyan());
    }
    println!("  Press {} to stop.\n", "Ctrl-C".bold());

    let mode = args.mode;
    let worker = thread::Builder::new()
        .name("reflex-loop".to_string())
        .spawn(move || control.run(mode))
        .map_err(|e| format!("failed to spawn control loop: {e}"))?;
    let metrics = worker
        .join()
        .map_err(|_| "control loop thread panicked".to_string())?
        .map_err(|e| e.to_string())?;

    print_metrics(&metrics, args.json)
}

fn build_engine(
    kind: EngineKind,
    cfg: &Config,
    enable: &[String],
    disable: &[String],
) -> Result<Box<dyn DecisionEngine>, String> {
    match kind {
        EngineKind::RuleBased => Ok(Box::new(rule_engine(enable, disable))),
        EngineKind::Reasoner => {
            if !enable.is_empty() || !disable.is_empty() {
                warn!("rule toggles are ignored by the reasoner engine");
            }
            let engine = ReasonerEngine::new(cfg.reasoner.clone()).map_err(|e| e.to_string())?;
            Ok(Box::new(engine))
        }
    }
}

/// The default rule table with the requested toggles applied. Unknown names
/// are reported and skipped.
fn rule_engine(enable: &[String], disable: &[String]) -> RuleEngine {
    let engine = RuleEngine::with_default_rules();
    let toggles = enable
        .iter()
        .map(|name| (name, true))
        .chain(disable.iter().map(|name| (name, false)));
    for (name, enabled) in toggles {
        if let Err(e) = engine.try_enable_rule(name, enabled) {
            warn!(rule = %name, "ignoring toggle for unknown rule");
            println!("  {} {}", "⚠".yellow(), e);
        }
    }
    engine
}

fn probe_ollama(base_url: &str) {
    print!("  Probing Ollama at {} … ", base_url.dimmed());
    match ollama::fetch_models(base_url) {
        Ok(models) => {
            println!("{} ({} model(s) available)", "online".green(), models.len());
            for m in &models {
                println!("    • {}", m.name.bold());
            }
        }
        Err(e) => {
            println!("{}", "offline".yellow());
            println!("  {}", e.dimmed());
        }
    }
}

fn print_metrics(metrics: &LoopMetrics, json: bool) -> Result<(), String> {
    if json {
        let out = serde_json::to_string_pretty(metrics)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        println!("{out}");
        return Ok(());
    }
    println!();
    println!("{}", "  Control loop stopped".bold().green());
    println!("    cycles            {}", metrics.cycle_count);
    println!(
        "    average cycle     {:.2} ms",
        metrics.average_cycle_duration * 1000.0
    );
    println!("    failed cycles     {}", metrics.failed_cycles);
    println!("    overruns          {}", metrics.overruns);
    println!("    final mode        {}", metrics.mode);
    println!("    run id            {}", metrics.run_id.to_string().dimmed());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// rules / explain / init
// ─────────────────────────────────────────────────────────────────────────────

fn print_rules(engine: &RuleEngine) {
    println!();
    for rule in engine.rules().iter() {
        let state = if rule.enabled {
            "enabled".green()
        } else {
            "disabled".red()
        };
        println!(
            "  {} {} [{}]",
            rule.name.bold().cyan(),
            format!("(priority {})", rule.priority).dimmed(),
            state
        );
        let conditions = rule.describe_conditions();
        let when = if conditions.is_empty() {
            "always".to_string()
        } else {
            conditions.join(" AND ")
        };
        println!("      when {when}");
        let actions: Vec<String> = rule.actions.iter().map(ToString::to_string).collect();
        println!("      then {}", actions.join(", "));
    }
    println!();
}

fn explain(cfg: &Config, facts: &[String], kind: EngineKind) -> Result<(), String> {
    let context = parse_facts(facts)?;
    let text = match kind {
        EngineKind::RuleBased => RuleEngine::with_default_rules().explain(&context).to_string(),
        EngineKind::Reasoner => build_engine(kind, cfg, &[], &[])?.explain(&context),
    };
    println!("{text}");
    Ok(())
}

/// Parse `FACT=VALUE` arguments into a context.
fn parse_facts(facts: &[String]) -> Result<Context, String> {
    facts
        .iter()
        .map(|raw| {
            raw.split_once('=')
                .filter(|(name, _)| !name.trim().is_empty())
                .map(|(name, value)| (name.trim().to_string(), FactValue::parse_literal(value)))
                .ok_or_else(|| format!("expected FACT=VALUE, got '{raw}'"))
        })
        .collect()
}

fn init(cfg: &Config, force: bool) -> Result<(), String> {
    let path = config::config_path();
    if path.exists() && !force {
        println!(
            "  Config already exists at {} (use {} to overwrite).",
            path.display().to_string().bold(),
            "--force".bold()
        );
        return Ok(());
    }
    config::save(cfg)?;
    println!(
        "  {} Config saved to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___       __ _           "#.bold().cyan());
    println!("{}", r#"  / _ \___  / _| |_____ __  "#.bold().cyan());
    println!("{}", r#" / , _/ -_)/ _/ / -_) \ /  "#.bold().cyan());
    println!("{}", r#"/_/|_|\__//_/ /_/\__/_\_\  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Reflex".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Rule-driven robot control loop");
    println!();
}
