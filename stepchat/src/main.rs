//! Scripted conversation step walker CLI.
//!
//! `stepchat run` walks a script against an OpenAI-compatible chat endpoint,
//! reading user turns from stdin. `compare` replays a recorded transcript
//! against other models. `init`, `validate`, `chat` and `embed` are helpers
//! for authoring scripts and checking provider settings.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use stepchat::compare::{Candidate, compare_transcript};
use stepchat::core::similarity::cosine_similarity;
use stepchat::core::types::Turn;
use stepchat::exit_codes;
use stepchat::io::config::{Config, DEFAULT_CONFIG_PATH, load_config, write_config};
use stepchat::io::provider::HttpProvider;
use stepchat::io::script::{check_script, resolve_script};
use stepchat::io::transcript_log::{TranscriptRecord, load_transcript_turns, write_transcript};
use stepchat::io::turns::ConsoleTurns;
use stepchat::logging;
use stepchat::walker::{WalkStop, Walker, run_walk};

#[derive(Parser)]
#[command(
    name = "stepchat",
    version,
    about = "Walk a scripted conversation one step at a time"
)]
struct Cli {
    /// Path to the TOML config file; defaults apply when it is missing.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scripted conversation on the console.
    Run {
        /// TOML script file; the built-in intake script is used when omitted.
        #[arg(long)]
        script: Option<PathBuf>,
        /// Write the final transcript as JSON to this path.
        #[arg(long)]
        transcript: Option<PathBuf>,
    },
    /// Replay a recorded transcript against chat models and score their replies.
    Compare {
        /// Transcript JSON written by `stepchat run --transcript`.
        #[arg(long)]
        transcript: PathBuf,
        /// Model to compare; repeat for several. Defaults to the configured model.
        #[arg(long = "model")]
        models: Vec<String>,
        /// Replies requested per model and user turn.
        #[arg(long, default_value_t = 1)]
        repeat: u32,
        /// Exit with code 4 when any reply scores below this similarity.
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Write a config file with default settings.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
    /// Check the config and a script (schema, invariants, prompt rendering) offline.
    Validate {
        #[arg(long)]
        script: Option<PathBuf>,
    },
    /// Send a single message to the provider and print the reply.
    Chat {
        /// Optional system turn sent before the message.
        #[arg(long)]
        system: Option<String>,
        /// Print the reply as it streams in.
        #[arg(long)]
        stream: bool,
        message: String,
    },
    /// Embed texts and print the cosine similarity of the first to each other.
    Embed {
        #[arg(required = true)]
        texts: Vec<String>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { script, transcript } => {
            cmd_run(&cli.config, script.as_deref(), transcript.as_deref())
        }
        Command::Compare {
            transcript,
            models,
            repeat,
            threshold,
        } => cmd_compare(&cli.config, &transcript, &models, repeat, threshold),
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Validate { script } => cmd_validate(&cli.config, script.as_deref()),
        Command::Chat {
            system,
            stream,
            message,
        } => cmd_chat(&cli.config, system, stream, message),
        Command::Embed { texts } => cmd_embed(&cli.config, &texts),
    }
}

fn cmd_run(config_path: &Path, script: Option<&Path>, transcript: Option<&Path>) -> Result<i32> {
    let config = load_config(config_path)?;
    let script = resolve_script(script)?;
    let provider = HttpProvider::from_config(&config.provider)?;
    let mut walker = Walker::new(script)?;

    let stdin = std::io::stdin();
    let mut turns = ConsoleTurns::new(stdin.lock(), std::io::stdout());
    let outcome = run_walk(&mut walker, &provider, &mut turns, |message| {
        println!("AI: {message}");
    })?;

    if let Some(path) = transcript {
        let record = TranscriptRecord {
            script: &outcome.script,
            model: &config.provider.model,
            cursor: outcome.cursor,
            stop: &outcome.stop,
            turns: walker.transcript().turns(),
        };
        write_transcript(path, &record)?;
    }

    Ok(match outcome.stop {
        WalkStop::AllComplete => {
            println!("All steps complete.");
            exit_codes::OK
        }
        WalkStop::Failed { reason } if reason.is_empty() => {
            eprintln!("conversation failed");
            exit_codes::FAILED
        }
        WalkStop::Failed { reason } => {
            eprintln!("conversation failed: {reason}");
            exit_codes::FAILED
        }
        WalkStop::InputClosed => {
            println!();
            exit_codes::INPUT_CLOSED
        }
    })
}

fn cmd_compare(
    config_path: &Path,
    transcript: &Path,
    models: &[String],
    repeat: u32,
    threshold: Option<f64>,
) -> Result<i32> {
    let config = load_config(config_path)?;
    let provider = HttpProvider::from_config(&config.provider)?;
    let turns = load_transcript_turns(transcript)?;

    let providers: Vec<HttpProvider> = if models.is_empty() {
        vec![provider.with_model(provider.model())]
    } else {
        models.iter().map(|model| provider.with_model(model)).collect()
    };
    let candidates: Vec<Candidate<'_>> = providers
        .iter()
        .map(|model_provider| Candidate {
            model: model_provider.model(),
            provider: model_provider,
        })
        .collect();

    let report = compare_transcript(&turns, &candidates, repeat, &provider)?;
    for turn in &report.turns {
        println!("turn {}: {}", turn.message_index, turn.user);
        for reply in &turn.replies {
            println!(
                "  {:.4}\t{}\t{}",
                reply.similarity,
                reply.model,
                reply.reply.replace('\n', " ")
            );
        }
    }
    for (model, mean) in report.model_means() {
        println!("mean {mean:.4}\t{model}");
    }

    if let Some(threshold) = threshold {
        let below = report.below(threshold);
        if below > 0 {
            eprintln!("{below} replies scored below {threshold}");
            return Ok(exit_codes::DISSIMILAR);
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            config_path.display()
        );
    }
    write_config(config_path, &Config::default())?;
    println!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(config_path: &Path, script: Option<&Path>) -> Result<i32> {
    load_config(config_path)?;
    let script = resolve_script(script)?;
    let errors = check_script(&script);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    println!("ok: {} ({} steps)", script.name, script.steps.len());
    Ok(exit_codes::OK)
}

fn cmd_chat(
    config_path: &Path,
    system: Option<String>,
    stream: bool,
    message: String,
) -> Result<i32> {
    let config = load_config(config_path)?;
    let provider = HttpProvider::from_config(&config.provider)?;

    let mut turns: Vec<Turn> = system.into_iter().map(Turn::system).collect();
    turns.push(Turn::user(message));

    if stream || config.provider.stream {
        let mut echo = ChunkEcho::new(std::io::stdout());
        provider.chat_stream(&turns, &mut |chunk: &str| echo.push(chunk))?;
        echo.finish()?;
    } else {
        println!("{}", provider.chat(&turns)?);
    }
    Ok(exit_codes::OK)
}

/// Echoes streamed chunks, keeping the first write error for later.
struct ChunkEcho<W: Write> {
    out: W,
    error: Option<std::io::Error>,
}

impl<W: Write> ChunkEcho<W> {
    fn new(out: W) -> Self {
        Self { out, error: None }
    }

    fn push(&mut self, chunk: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self
            .out
            .write_all(chunk.as_bytes())
            .and_then(|()| self.out.flush())
        {
            self.error = Some(err);
        }
    }

    fn finish(mut self) -> Result<()> {
        if let Some(err) = self.error {
            return Err(err).context("write reply to stdout");
        }
        writeln!(self.out).context("write reply to stdout")
    }
}

fn cmd_embed(config_path: &Path, texts: &[String]) -> Result<i32> {
    let config = load_config(config_path)?;
    let provider = HttpProvider::from_config(&config.provider)?;
    let vectors = provider.embed(texts)?;

    let (first, rest) = vectors
        .split_first()
        .context("embeddings response was empty")?;
    println!("{} vectors of {} dimensions", vectors.len(), first.len());
    for (text, vector) in texts.iter().skip(1).zip(rest) {
        let similarity = cosine_similarity(first, vector)?;
        println!("{similarity:.4}\t{text}");
    }
    Ok(exit_codes::OK)
}
