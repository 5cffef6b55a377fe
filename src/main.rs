//! DemoForge CLI Entry Point
//!
//! Provides a command-line interface for building demos.
//!
//! # Usage
//!
//! ```bash
//! # Start a session; prints the proposed scenario and a session id
//! demoforge start "build a retail demo"
//!
//! # Approve it, or reply with changes to get a revised scenario
//! demoforge resume <SESSION_ID> "yes"
//!
//! # Interactive session in the terminal
//! demoforge chat
//!
//! # Housekeeping
//! demoforge sessions
//! demoforge agents
//! demoforge drop-schema RETAIL_DEMO
//! ```

use std::env;
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use colored::Colorize;
use log::{info, warn};

use demoforge::environment::{check_packages, interpreter_version, resolve_interpreter, REQUIRED_PACKAGES};
use demoforge::execution::{Engine, FinalResult, ProcessScriptRunner, RunOutcome, SuspendedPayload};
use demoforge::llm::{OpenAiConfig, OpenAiGenerator};
use demoforge::monitoring::Progress;
use demoforge::warehouse::{LocalWarehouse, Warehouse};
use demoforge::workflow::{fields, CheckpointStore, FileCheckpointStore, SessionId};
use demoforge::{AppConfig, APP_NAME, VERSION};

/// Replies that leave the interactive chat.
const CHAT_EXIT_WORDS: &[&str] = &["exit", "quit"];

#[derive(Debug, PartialEq)]
enum Command {
    Start(String),
    Resume(String, String),
    Chat,
    Sessions,
    Abandon(String),
    Check,
    Agents,
    DropAgent(String),
    Schemas,
    DropSchema(String),
}

/// Command-line options parsed from arguments.
#[derive(Debug, Default)]
struct Cli {
    command: Option<Command>,
    config_path: Option<PathBuf>,
    state_dir: Option<PathBuf>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Sales Demo Builder");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: demoforge [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  start <PROMPT>               Start a session from a demo prompt");
    println!("  resume <SESSION_ID> <REPLY>  Answer the approval question of a session");
    println!("  chat                         Interactive session in the terminal");
    println!("  sessions                     List sessions waiting for approval");
    println!("  abandon <SESSION_ID>         Discard a waiting session");
    println!("  check                        Verify the Python interpreter and packages");
    println!("  agents                       List registered agents");
    println!("  drop-agent <NAME>            Remove a registered agent");
    println!("  schemas                      List warehouse schemas");
    println!("  drop-schema <NAME>           Drop a warehouse schema");
    println!();
    println!("Options:");
    println!("  --config PATH       Configuration file (default: ./demoforge.yaml if present)");
    println!("  --state-dir PATH    Directory for sessions, checkpoints and the warehouse");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  demoforge start \"build a retail demo\"");
    println!("  demoforge resume 6f1c0c9e-0d4b-4d7a-9a53-2f0c1b8e7a10 \"add a returns table\"");
}

/// Parses command-line arguments into a Cli struct.
fn parse_arguments(args: &[String]) -> Result<Cli, String> {
    let mut cli = Cli::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                cli.verbose = true;
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("--config requires a path argument".to_string());
                }
                cli.config_path = Some(PathBuf::from(&args[i]));
            }
            "--state-dir" => {
                i += 1;
                if i >= args.len() {
                    return Err("--state-dir requires a path argument".to_string());
                }
                cli.state_dir = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with("--") => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => positional.push(arg.clone()),
        }
        i += 1;
    }

    cli.command = parse_command(&positional)?;
    Ok(cli)
}

fn parse_command(positional: &[String]) -> Result<Option<Command>, String> {
    let Some((name, rest)) = positional.split_first() else {
        return Ok(None);
    };

    let arity = |expected: usize| -> Result<(), String> {
        if rest.len() == expected {
            Ok(())
        } else {
            Err(format!(
                "'{}' takes {} argument(s), got {}",
                name,
                expected,
                rest.len()
            ))
        }
    };

    let command = match name.as_str() {
        "start" => {
            if rest.is_empty() {
                return Err("'start' requires a prompt".to_string());
            }
            // Unquoted prompts arrive as separate words
            Command::Start(rest.join(" "))
        }
        "resume" => {
            if rest.len() < 2 {
                return Err("'resume' requires a session id and a reply".to_string());
            }
            Command::Resume(rest[0].clone(), rest[1..].join(" "))
        }
        "chat" => arity(0).map(|_| Command::Chat)?,
        "sessions" => arity(0).map(|_| Command::Sessions)?,
        "abandon" => arity(1).map(|_| Command::Abandon(rest[0].clone()))?,
        "check" => arity(0).map(|_| Command::Check)?,
        "agents" => arity(0).map(|_| Command::Agents)?,
        "drop-agent" => arity(1).map(|_| Command::DropAgent(rest[0].clone()))?,
        "schemas" => arity(0).map(|_| Command::Schemas)?,
        "drop-schema" => arity(1).map(|_| Command::DropSchema(rest[0].clone()))?,
        other => return Err(format!("Unknown command: {}", other)),
    };

    Ok(Some(command))
}

fn open_warehouse(config: &AppConfig) -> Result<LocalWarehouse, Box<dyn Error>> {
    Ok(LocalWarehouse::new(config.warehouse_dir(), &config.database)?)
}

/// Builds the engine and a thread printing its progress events.
///
/// The printer exits once the engine is dropped.
fn open_engine(config: &AppConfig) -> Result<(Engine, thread::JoinHandle<()>), Box<dyn Error>> {
    let api_key = config.api_key();
    if api_key.is_none() {
        warn!("{} is not set; generation requests will fail", config.api_key_env);
    }

    let generator = OpenAiGenerator::new(OpenAiConfig {
        api_key,
        base_url: config.api_base.clone(),
        model: config.model.clone(),
        timeout: config.request_timeout(),
        api_key_env: config.api_key_env.clone(),
    })?;

    let interpreter = resolve_interpreter(config.python.as_deref());
    info!("Script interpreter: {}", interpreter.display());
    let runner = ProcessScriptRunner::new(interpreter).with_timeout(config.script_timeout());

    let mut engine = Engine::new(
        Arc::new(generator),
        Arc::new(runner),
        Arc::new(open_warehouse(config)?),
        Arc::new(FileCheckpointStore::new(config.checkpoint_dir())),
    );
    engine.set_work_root(config.sessions_dir());
    engine.set_limits(config.limits());

    let (tx, rx) = mpsc::channel::<Progress>();
    engine.set_progress(tx);
    let printer = thread::spawn(move || {
        for event in rx {
            println!("{} {}", "›".cyan(), event.message.dimmed());
        }
    });

    Ok((engine, printer))
}

fn print_suspended(payload: &SuspendedPayload) {
    println!();
    println!("{}", payload.task.bold());
    println!();
    println!("{}", payload.scenario);
    println!();
    for (i, question) in payload.questions.iter().enumerate() {
        println!("  {}. {}", i + 1, question);
    }
    if !payload.message.is_empty() {
        println!();
        println!("{}", payload.message);
    }
    println!();
    println!("Session: {}", payload.session_id.to_string().yellow());
}

fn print_completed(result: &FinalResult) {
    println!();
    println!("{}", "Demo ready".green().bold());
    println!();
    println!("{}", result.summary);
    println!();
    println!("Agent:  {} ({})", result.agent_name.bold(), result.agent_record);
    println!("Schema: {}", result.schema);
    println!();
    println!("Try asking:");
    for question in &result.sample_questions {
        println!("  - {}", question);
    }
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Suspended(payload) => {
            print_suspended(payload);
            println!(
                "Reply with: demoforge resume {} \"<your feedback or yes>\"",
                payload.session_id
            );
        }
        RunOutcome::Completed(result) => print_completed(result),
    }
}

/// Runs one engine call, then waits for pending progress output.
fn run_once<F>(config: &AppConfig, call: F) -> Result<(), Box<dyn Error>>
where
    F: FnOnce(&Engine) -> Result<RunOutcome, demoforge::WorkflowError>,
{
    let (engine, printer) = open_engine(config)?;
    let result = call(&engine);
    drop(engine);
    let _ = printer.join();

    print_outcome(&result?);
    Ok(())
}

/// Interactive loop: the first line starts a session, later lines answer it.
fn chat(config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let (engine, printer) = open_engine(config)?;
    let stdin = io::stdin();
    let mut current: Option<SessionId> = None;

    println!("Describe the demo you want to build ('exit' to quit).");
    loop {
        print!("{} ", ">".bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if CHAT_EXIT_WORDS.contains(&line.to_lowercase().as_str()) {
            break;
        }
        if line.is_empty() && current.is_none() {
            continue;
        }

        let result = match &current {
            Some(id) => engine.resume(id, line),
            None => engine.start(line),
        };

        match result {
            Ok(RunOutcome::Suspended(payload)) => {
                print_suspended(&payload);
                println!("Approve, or describe what to change.");
                current = Some(payload.session_id);
            }
            Ok(RunOutcome::Completed(result)) => {
                print_completed(&result);
                println!();
                println!("Describe another demo, or 'exit' to quit.");
                current = None;
            }
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                if e.is_limit() {
                    current = None;
                }
            }
        }
    }

    drop(engine);
    let _ = printer.join();
    Ok(())
}

fn list_sessions(config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let store = FileCheckpointStore::new(config.checkpoint_dir());
    let sessions = store.list()?;

    if sessions.is_empty() {
        println!("No sessions are waiting for approval.");
        return Ok(());
    }

    for checkpoint in sessions {
        println!(
            "{}  {}  {}",
            checkpoint.session_id.to_string().yellow(),
            checkpoint.saved_at.format("%Y-%m-%d %H:%M"),
            checkpoint.context.get_str(fields::PROMPT)
        );
    }
    Ok(())
}

/// Verifies the interpreter and the packages generated scripts use.
fn check_environment(config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let interpreter = resolve_interpreter(config.python.as_deref());
    let version = interpreter_version(&interpreter)
        .map_err(|e| format!("Python interpreter '{}' is not usable: {}", interpreter.display(), e))?;
    println!("{} {} ({})", "ok".green(), version, interpreter.display());

    let missing = check_packages(&interpreter, REQUIRED_PACKAGES)?;
    for package in REQUIRED_PACKAGES {
        if missing.iter().any(|m| m == package) {
            println!("{} {} is not installed", "missing".red(), package);
        } else {
            println!("{} {}", "ok".green(), package);
        }
    }

    if config.api_key().is_some() {
        println!("{} {} is set", "ok".green(), config.api_key_env);
    } else {
        println!("{} {} is not set", "missing".red(), config.api_key_env);
    }

    if !missing.is_empty() {
        return Err(format!("install the missing packages: pip install {}", missing.join(" ")).into());
    }
    Ok(())
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let cli = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(cli.verbose);
    print_banner();

    let Some(command) = cli.command else {
        print_usage();
        return Ok(());
    };

    let mut config = AppConfig::load_or_default(cli.config_path.as_deref())?;
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }
    config.validate()?;
    info!("State directory: {}", config.state_dir.display());

    match command {
        Command::Start(prompt) => run_once(&config, |engine| engine.start(&prompt)),
        Command::Resume(id, reply) => {
            let session_id: SessionId = id.parse()?;
            run_once(&config, |engine| engine.resume(&session_id, &reply))
        }
        Command::Chat => chat(&config),
        Command::Sessions => list_sessions(&config),
        Command::Abandon(id) => {
            let session_id: SessionId = id.parse()?;
            let (engine, printer) = open_engine(&config)?;
            engine.abandon(&session_id)?;
            drop(engine);
            let _ = printer.join();
            println!("Abandoned session {}", session_id);
            Ok(())
        }
        Command::Check => check_environment(&config),
        Command::Agents => {
            let agents = open_warehouse(&config)?.list_agents()?;
            if agents.is_empty() {
                println!("No agents registered.");
            }
            for agent in agents {
                println!(
                    "{}  {}  {}",
                    agent.fully_qualified_name.bold(),
                    agent.created_at.format("%Y-%m-%d %H:%M"),
                    agent.spec.name
                );
            }
            Ok(())
        }
        Command::DropAgent(name) => {
            open_warehouse(&config)?.drop_agent(&name)?;
            println!("Dropped agent {}", name);
            Ok(())
        }
        Command::Schemas => {
            for schema in open_warehouse(&config)?.list_schemas()? {
                println!("{}", schema);
            }
            Ok(())
        }
        Command::DropSchema(name) => {
            open_warehouse(&config)?.drop_schema(&name)?;
            println!("Dropped schema {}", name);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("demoforge")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_parse_start_joins_words() {
        let cli = parse_arguments(&args(&["start", "build", "a", "retail", "demo"])).unwrap();
        assert_eq!(cli.command, Some(Command::Start("build a retail demo".to_string())));
    }

    #[test]
    fn test_parse_resume_with_options() {
        let cli = parse_arguments(&args(&[
            "--state-dir",
            "/tmp/df",
            "resume",
            "abc-123",
            "add",
            "returns",
            "--verbose",
        ]))
        .unwrap();

        assert_eq!(
            cli.command,
            Some(Command::Resume("abc-123".to_string(), "add returns".to_string()))
        );
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/df")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&["start"])).is_err());
        assert!(parse_arguments(&args(&["resume", "id"])).is_err());
        assert!(parse_arguments(&args(&["abandon"])).is_err());
        assert!(parse_arguments(&args(&["sessions", "extra"])).is_err());
        assert!(parse_arguments(&args(&["frobnicate"])).is_err());
        assert!(parse_arguments(&args(&["--config"])).is_err());
        assert!(parse_arguments(&args(&["--bogus", "check"])).is_err());
    }

    #[test]
    fn test_parse_no_command() {
        let cli = parse_arguments(&args(&["--verbose"])).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_housekeeping_commands() {
        assert_eq!(
            parse_arguments(&args(&["drop-schema", "RETAIL"])).unwrap().command,
            Some(Command::DropSchema("RETAIL".to_string()))
        );
        assert_eq!(parse_arguments(&args(&["agents"])).unwrap().command, Some(Command::Agents));
        assert_eq!(parse_arguments(&args(&["check"])).unwrap().command, Some(Command::Check));
    }
}
