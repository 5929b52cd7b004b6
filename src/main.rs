use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use scripture_styler::gateway::{ChatGateway, HttpChatGateway};
use scripture_styler::pipeline::{
    generate_notes, init_default_config, BatchSelection, ConfigOverrides, PipelineConfig,
    Restyler, RunContext, RunStatus, VerseSelection,
};
use scripture_styler::progress::ConsoleProgress;
use scripture_styler::verses::{load_verses, parse_list};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Single,
    Chapter,
    Batch,
}

#[derive(Parser, Debug)]
#[command(name = "scripture-styler")]
#[command(about = "Restyle scripture verse by verse through an OpenAI-compatible chat model", long_about = None)]
struct Args {
    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Verse JSON: local path or http(s) URL
    #[arg(value_name = "SOURCE")]
    source: Option<String>,

    #[arg(long, value_enum, default_value_t = Mode::Batch)]
    mode: Mode,

    /// Book title (single and chapter modes)
    #[arg(long)]
    book: Option<String>,

    #[arg(long)]
    chapter: Option<u32>,

    #[arg(long)]
    verse: Option<u32>,

    /// Text to restyle instead of the loaded verse (single mode)
    #[arg(long)]
    text: Option<String>,

    /// Comma-separated volume titles to keep (batch mode)
    #[arg(long)]
    volumes: Option<String>,

    /// Comma-separated book titles to keep (batch mode)
    #[arg(long)]
    books: Option<String>,

    /// First filtered verse index, inclusive (batch mode)
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Last filtered verse index, exclusive (batch mode)
    #[arg(long)]
    end: Option<usize>,

    /// Transcript output file
    #[arg(short, long, value_name = "TXT", default_value = "styled_bible.txt")]
    output: PathBuf,

    /// Only write files; no progress or streamed lines
    #[arg(long)]
    quiet: bool,

    /// Config file path (default: search for scripture-styler.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model id (overrides config)
    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    /// Prior verses checked for repeated openings; 0 disables the check
    #[arg(long)]
    context_pairs: Option<usize>,

    /// Built-in persona preset (stoner, zoomer, plain, kid, pirate, noir, ...)
    #[arg(long)]
    persona: Option<String>,

    /// Persona system prompt read from a file
    #[arg(long, value_name = "TXT")]
    persona_file: Option<PathBuf>,

    /// Generate study notes from the fresh transcript after the run
    #[arg(long)]
    notes: bool,

    /// Generate study notes from an existing transcript, then exit
    #[arg(long, value_name = "TXT")]
    notes_from: Option<PathBuf>,

    #[arg(long, value_name = "MD", default_value = "study-notes.md")]
    notes_output: PathBuf,

    /// outline | exegetical | sermon | youth | academic
    #[arg(long)]
    notes_preset: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            context_pairs: self.context_pairs,
            persona: self.persona.clone(),
            persona_file: self.persona_file.clone(),
            notes_preset: self.notes_preset.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    if let Some(transcript_path) = args.notes_from.as_ref() {
        let cfg = PipelineConfig::from_overrides(args.overrides())?;
        let gateway = HttpChatGateway::new(cfg.connection.clone()).context("connection settings")?;
        let passage = std::fs::read_to_string(transcript_path)
            .with_context(|| format!("read transcript: {}", transcript_path.display()))?;
        write_notes(&gateway, &cfg, &passage, &args.notes_output, &progress).await?;
        return Ok(());
    }

    let source = match args.source.clone() {
        Some(s) => s,
        None if args.mode == Mode::Single && args.text.is_some() => String::new(),
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  scripture-styler <verses.json|URL> [--mode batch|chapter|single]\n\nTIPS:\n  - Default config search: scripture-styler.toml (upwards), or set SCRIPTURE_STYLER_CONFIG.\n  - Ctrl-C stops a chapter/batch run after the current verse; the partial transcript is kept.\n"
            );
            return Ok(());
        }
    };

    let cfg = PipelineConfig::from_overrides(args.overrides())?;
    if let Some(p) = cfg.config_path.as_ref() {
        progress.info(format!("Config: {}", p.display()));
    }
    let gateway = Arc::new(
        HttpChatGateway::new(cfg.connection.clone()).context("connection settings")?,
    );
    progress.info(format!("Model: {} @ {}", gateway.model(), gateway.url()));

    let verses = if source.is_empty() {
        Vec::new()
    } else {
        let verses = load_verses(&source).await?;
        progress.info(format!("Loaded {} verses", verses.len()));
        verses
    };

    let restyler = Restyler::new(gateway.clone(), cfg.clone());
    let transcript = match args.mode {
        Mode::Single => {
            let sel = VerseSelection {
                book: args.book.clone().unwrap_or_default(),
                chapter: args.chapter,
                verse: args.verse,
                text_override: args.text.clone(),
            };
            let line = restyler.run_single(&verses, &sel).await?;
            progress.line(&line);
            write_transcript(&args.output, &line)?;
            line
        }
        Mode::Chapter | Mode::Batch => {
            let mut ctx = RunContext::new(cfg.context_pairs);
            let token = ctx.cancel_token();
            let stop_progress = progress.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if token.request_stop() {
                        stop_progress.info("Interrupted again; exiting now.");
                        std::process::exit(130);
                    }
                    stop_progress
                        .info("Stopping after the current verse (Ctrl-C again to quit) ...");
                }
            });

            let mut observer = progress.clone();
            let result = if args.mode == Mode::Chapter {
                let book = args.book.clone().unwrap_or_default();
                restyler
                    .run_chapter(&mut ctx, &verses, &book, args.chapter.unwrap_or(0), &mut observer)
                    .await
            } else {
                let sel = BatchSelection {
                    volumes: args.volumes.as_deref().and_then(parse_list),
                    books: args.books.as_deref().and_then(parse_list),
                    start: args.start,
                    end: args.end,
                };
                restyler.run_batch(&mut ctx, &verses, &sel, &mut observer).await
            };

            let committed = ctx.committed_lines();
            write_transcript(&args.output, ctx.collected())?;
            let transcript = ctx.into_transcript();
            match result? {
                RunStatus::Completed => progress.info(format!("Done: {committed} lines")),
                RunStatus::Cancelled => progress.info(format!("Stopped: {committed} lines")),
            }
            transcript
        }
    };
    progress.info(format!("Wrote: {}", args.output.display()));

    if args.notes {
        write_notes(gateway.as_ref(), &cfg, &transcript, &args.notes_output, &progress).await?;
    }
    Ok(())
}

fn write_transcript(path: &Path, text: &str) -> anyhow::Result<()> {
    let text = text.trim();
    let body = if text.is_empty() {
        String::new()
    } else {
        format!("{text}\n")
    };
    std::fs::write(path, body).with_context(|| format!("write output: {}", path.display()))
}

async fn write_notes(
    gateway: &dyn ChatGateway,
    cfg: &PipelineConfig,
    passage: &str,
    output: &Path,
    progress: &ConsoleProgress,
) -> anyhow::Result<()> {
    progress.info(format!("Study notes: {}", cfg.notes_preset));
    let notes = generate_notes(gateway, passage, &cfg.notes_preset, cfg.temperature).await?;
    std::fs::write(output, format!("{}\n", notes.trim_end()))
        .with_context(|| format!("write notes: {}", output.display()))?;
    progress.info(format!("Wrote: {}", output.display()));
    Ok(())
}
