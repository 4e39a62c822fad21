use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use medtriage_contracts::analysis::{BatchAnalysis, ChatRole, ChatTurn, ImageAnalysis};
use medtriage_contracts::chat::{chat_help, parse_intent, Intent};
use medtriage_contracts::events::EventWriter;
use medtriage_engine::{resolve_api_key, EngineConfig, TriageEngine};
use tracing_subscriber::EnvFilter;

const DEFAULT_EVENTS_PATH: &str = "medtriage-events.jsonl";

#[derive(Debug, Parser)]
#[command(name = "medtriage", version, about = "Medical image triage assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze one image, or several as a batch.
    Analyze(AnalyzeArgs),
    /// Ask a single question.
    Ask(AskArgs),
    /// Interactive chat.
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
struct EngineArgs {
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(required = true)]
    images: Vec<PathBuf>,
    #[command(flatten)]
    engine: EngineArgs,
    #[arg(long)]
    json: bool,
    #[arg(long)]
    sections: bool,
}

#[derive(Debug, Parser)]
struct AskArgs {
    prompt: String,
    /// File whose content is used as the previous analysis.
    #[arg(long)]
    context_file: Option<PathBuf>,
    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    engine: EngineArgs,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("medtriage error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Ask(args) => run_ask(args),
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
    }
}

fn build_engine(args: &EngineArgs) -> Result<TriageEngine> {
    let config = EngineConfig::from_env();
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EVENTS_PATH));
    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(%session_id, events = %events_path.display(), "session started");
    let events = EventWriter::new(events_path, session_id);
    let api_key = resolve_api_key(args.api_key.as_deref()).unwrap_or_default();

    let mut engine = TriageEngine::new(&config, api_key, events);
    if let Some(model) = args.model.as_deref() {
        if let Some(reason) = engine.set_model(model)? {
            eprintln!("{reason} Using {}.", engine.model());
        }
    }
    Ok(engine)
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let engine = build_engine(&args.engine)?;

    if let [path] = args.images.as_slice() {
        let upload = medtriage_engine::ImageUpload::from_path(path)?;
        let result = engine.analyze(&upload)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_analysis(&result, args.sections);
        }
        return Ok(0);
    }

    let batch = engine.analyze_paths(args.images.as_slice());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
    } else {
        print_batch(&batch, args.sections);
    }
    Ok(if batch.successful_analyses == batch.total_images { 0 } else { 2 })
}

fn run_ask(args: AskArgs) -> Result<i32> {
    let engine = build_engine(&args.engine)?;
    if let Some(path) = args.context_file.as_deref() {
        engine.remember_analysis(read_context_file(path)?);
    }
    let reply = engine.respond(&args.prompt)?;
    println!("{}", reply.response);
    Ok(0)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let mut engine = build_engine(&args.engine)?;
    let mut history: Vec<ChatTurn> = Vec::new();

    let stdin = io::stdin();
    let mut line = String::new();

    println!("Medtriage chat started ({}). Type /help for commands.", engine.model());

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        match parse_intent(&line) {
            Intent::Noop => continue,
            Intent::Help => println!("Commands: {}", chat_help()),
            Intent::Model(None) => println!("Model: {}", engine.model()),
            Intent::Model(Some(requested)) => match engine.set_model(&requested) {
                Ok(Some(reason)) => println!("{reason} Model set to {}", engine.model()),
                Ok(None) => println!("Model set to {}", engine.model()),
                Err(err) => println!("Model unchanged: {err:#}"),
            },
            Intent::SetContext(text) => {
                engine.remember_analysis(text);
                println!("Context updated.");
            }
            Intent::ShowContext => match engine.stored_analysis() {
                Some(analysis) => println!("{analysis}"),
                None => println!("No previous analysis."),
            },
            Intent::ClearContext => {
                engine.clear_analysis();
                println!("Context cleared.");
            }
            Intent::Metrics => {
                println!("{}", serde_json::to_string_pretty(&engine.metrics())?);
            }
            Intent::History => {
                if history.is_empty() {
                    println!("No messages yet.");
                }
                for turn in &history {
                    let who = match turn.role {
                        ChatRole::User => "you",
                        ChatRole::Assistant => "assistant",
                    };
                    println!("[{who}] {}", turn.content);
                }
            }
            Intent::Analyze(paths) if paths.is_empty() => {
                println!("/analyze requires at least one path");
            }
            Intent::Analyze(paths) => print_batch(&engine.analyze_paths(paths.as_slice()), false),
            Intent::Ask(prompt) => {
                history.push(ChatTurn::user(prompt.clone()));
                match engine.respond(&prompt) {
                    Ok(reply) => {
                        println!("{}", reply.response);
                        history.push(ChatTurn::assistant(reply.response));
                    }
                    Err(err) => println!("Error: {err}"),
                }
            }
            Intent::Unknown { command, .. } => {
                println!("Unknown command /{command}. Type /help for commands.");
            }
        }
    }

    Ok(())
}

fn read_context_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_analysis(result: &ImageAnalysis, sections: bool) {
    println!(
        "Calidad: {} | Médico: {} ({:.0}%)",
        result.image_quality.quality.as_str(),
        if result.validation.is_medical { "sí" } else { "no" },
        result.validation.confidence * 100.0
    );
    for warning in &result.validation.warnings {
        println!("Advertencia: {warning}");
    }
    println!();
    if sections {
        for section in &result.sections {
            println!("{}\n{}\n", section.title, section.content);
        }
    } else {
        println!("{}", result.analysis);
    }
}

fn print_batch(batch: &BatchAnalysis, sections: bool) {
    for item in &batch.results {
        println!("== [{}] {}", item.index + 1, item.name);
        match (&item.result, &item.error) {
            (Some(result), _) => print_analysis(result, sections),
            (None, Some(error)) => println!("Error: {error}"),
            (None, None) => println!("Error: sin resultado"),
        }
        println!();
    }
    println!(
        "{} de {} imágenes analizadas correctamente.",
        batch.successful_analyses, batch.total_images
    );
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn analyze_accepts_many_images_and_flags() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "medtriage",
            "analyze",
            "a.jpg",
            "b.png",
            "--model",
            "gemini-2.5-flash",
            "--json",
        ])?;
        let Command::Analyze(args) = cli.command else {
            anyhow::bail!("expected analyze");
        };
        assert_eq!(args.images.len(), 2);
        assert!(args.json);
        assert!(!args.sections);
        assert_eq!(args.engine.model.as_deref(), Some("gemini-2.5-flash"));
        Ok(())
    }

    #[test]
    fn analyze_requires_an_image() {
        assert!(Cli::try_parse_from(["medtriage", "analyze"]).is_err());
    }

    #[test]
    fn context_file_is_read_verbatim() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("analisis.md");
        fs::write(&path, "Hallazgos: normal")?;
        assert_eq!(read_context_file(&path)?, "Hallazgos: normal");
        assert!(read_context_file(&temp.path().join("missing.md")).is_err());
        Ok(())
    }
}
