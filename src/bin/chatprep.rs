use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use chatprep::config::{ClockZone, DateOrder, ParserConfig, TokenizerConfig};
use chatprep::message::ChatId;
use chatprep::{ChatTokenizer, Corpus};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde_json::{self, json, Value};

#[derive(Parser, Debug)]
#[command(author, version, about = "Chat log corpus preparation toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse chat logs, run preparation steps and optionally train a tokenizer
    Prepare(PrepareArgs),
    /// Encode text with a trained tokenizer
    Tokenize(TokenizeArgs),
}

#[derive(Args, Debug)]
struct PrepareArgs {
    /// Chat log files (or directories with --recursive)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Number of parsing workers (defaults to the number of CPUs)
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Only the last N lines of every file are parsed
    #[arg(long, value_name = "N")]
    window: Option<usize>,

    /// Order of the day and month fields
    #[arg(long, value_enum, default_value_t = DateOrderArg::Dmy)]
    date_order: DateOrderArg,

    /// Interpret timestamps as UTC instead of local time
    #[arg(long)]
    utc: bool,

    /// Descend into directory inputs
    #[arg(long)]
    recursive: bool,

    /// Follow symlinks while descending
    #[arg(long)]
    follow_symlinks: bool,

    /// Preparation steps, applied in the order given
    #[arg(long = "step", value_enum, value_name = "STEP")]
    steps: Vec<Step>,

    /// Characters to keep when cleaning rare characters
    #[arg(long, value_name = "N")]
    keep_chars: Option<usize>,

    /// Explicit delta (in hours) for time normalization
    #[arg(long, value_name = "HOURS", allow_hyphen_values = true)]
    time_delta: Option<i64>,

    /// Print the message at CHAT:LINE
    #[arg(long = "show", value_name = "CHAT:LINE")]
    show: Vec<String>,

    /// Print the sender table after encoding
    #[arg(long)]
    list_senders: bool,

    /// Emit a machine-readable JSON summary
    #[arg(long)]
    json: bool,

    /// Train a WordPiece tokenizer on the prepared corpus and save it here
    #[arg(long, value_name = "PATH")]
    tokenizer_out: Option<PathBuf>,

    /// Minimum pair frequency for the tokenizer trainer
    #[arg(long, value_name = "COUNT", requires = "tokenizer_out")]
    min_frequency: Option<u64>,

    /// Maximum initial alphabet size for the tokenizer trainer
    #[arg(long, value_name = "COUNT", requires = "tokenizer_out")]
    limit_alphabet: Option<usize>,

    /// Target vocabulary size for the tokenizer trainer
    #[arg(long, value_name = "SIZE", requires = "tokenizer_out")]
    vocab_size: Option<usize>,

    /// Pretty-print the saved tokenizer JSON
    #[arg(long, requires = "tokenizer_out")]
    pretty: bool,

    /// Disable the training spinner
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct TokenizeArgs {
    /// Tokenizer JSON to load
    #[arg(short = 'm', long, value_name = "PATH")]
    tokenizer: PathBuf,

    /// Text to encode; each argument is encoded separately
    #[arg(required = true, value_name = "TEXT")]
    texts: Vec<String>,

    /// Emit one JSON record per text
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DateOrderArg {
    /// day/month/year
    Dmy,
    /// month/day/year
    Mdy,
}

impl From<DateOrderArg> for DateOrder {
    fn from(value: DateOrderArg) -> Self {
        match value {
            DateOrderArg::Dmy => DateOrder::DayMonthYear,
            DateOrderArg::Mdy => DateOrder::MonthDayYear,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Step {
    /// Replace sender names with frequency-ranked ids
    EncodeSenders,
    /// Drop messages containing rarely used characters
    CleanRare,
    /// Shift timestamps so their mean is zero
    NormalizeTime,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Step::EncodeSenders => "encode-senders",
            Step::CleanRare => "clean-rare",
            Step::NormalizeTime => "normalize-time",
        };
        f.write_str(label)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Prepare(args) => run_prepare(args),
        Commands::Tokenize(args) => run_tokenize(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn parser_config(args: &PrepareArgs) -> Result<ParserConfig> {
    let mut cfg = ParserConfig::builder()
        .date_order(args.date_order.into())
        .clock_zone(if args.utc {
            ClockZone::Utc
        } else {
            ClockZone::Local
        })
        .recursive(args.recursive)
        .follow_symlinks(args.follow_symlinks);
    if let Some(workers) = args.workers {
        cfg = cfg.workers(workers);
    }
    if let Some(window) = args.window {
        cfg = cfg.line_window(window);
    }
    Ok(cfg.build()?)
}

fn tokenizer_config(args: &PrepareArgs) -> Result<TokenizerConfig> {
    let mut cfg = TokenizerConfig::builder();
    if let Some(min_frequency) = args.min_frequency {
        cfg = cfg.min_frequency(min_frequency);
    }
    if let Some(limit_alphabet) = args.limit_alphabet {
        cfg = cfg.limit_alphabet(limit_alphabet);
    }
    if let Some(vocab_size) = args.vocab_size {
        cfg = cfg.vocab_size(vocab_size);
    }
    Ok(cfg.build()?)
}

fn parse_location(raw: &str) -> Result<(ChatId, usize)> {
    let (chat, line) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("expected CHAT:LINE, got {raw:?}"))?;
    let chat = chat
        .trim()
        .parse()
        .with_context(|| format!("invalid chat id in {raw:?}"))?;
    let line = line
        .trim()
        .parse()
        .with_context(|| format!("invalid line number in {raw:?}"))?;
    Ok((chat, line))
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    let parser_cfg = parser_config(&args)?;
    let tokenizer_cfg = tokenizer_config(&args)?;
    if args.steps.contains(&Step::CleanRare) && args.keep_chars.is_none() {
        bail!("--step clean-rare requires --keep-chars");
    }
    let locations = args
        .show
        .iter()
        .map(|raw| parse_location(raw))
        .collect::<Result<Vec<_>>>()?;

    let mut corpus = Corpus::new();
    let report = corpus
        .parse_files(&args.inputs, &parser_cfg)
        .context("failed to parse chat logs")?;
    let files: Vec<Value> = report
        .parsed
        .iter()
        .map(|file| {
            json!({
                "path": file.path.display().to_string(),
                "chat_id": file.chat_id,
                "messages": file.messages,
                "rejected": file.rejected,
                "dropped": file.dropped,
            })
        })
        .collect();
    let skipped: Vec<Value> = report
        .skipped
        .iter()
        .map(|file| {
            json!({
                "path": file.path.display().to_string(),
                "reason": format!("{:?}", file.reason),
            })
        })
        .collect();

    let mut steps = Vec::with_capacity(args.steps.len());
    for step in &args.steps {
        let detail = match step {
            Step::EncodeSenders => {
                let table = corpus
                    .encode_senders()
                    .with_context(|| format!("step {step} failed"))?;
                json!({ "senders": table.len() })
            }
            Step::CleanRare => {
                let keep = args.keep_chars.unwrap_or_default();
                let filtered = corpus
                    .filter_rare(keep, parser_cfg.worker_count())
                    .with_context(|| format!("step {step} failed"))?;
                json!({
                    "rare_chars": filtered.rare_chars.iter().collect::<String>(),
                    "removed": filtered.removed,
                    "dropped": filtered.dropped,
                    "kept": filtered.kept,
                })
            }
            Step::NormalizeTime => {
                let delta = corpus
                    .normalize_time(args.time_delta)
                    .with_context(|| format!("step {step} failed"))?;
                json!({ "delta": delta, "total_delta": corpus.time_delta() })
            }
        };
        steps.push(json!({ "step": step.to_string(), "result": detail }));
    }

    let zone = parser_cfg.decoder.clock_zone;
    let mut shown = Vec::with_capacity(locations.len());
    for (chat, line) in locations {
        match corpus.find(chat, line) {
            Ok(message) => shown.push((message.render(zone), serde_json::to_value(message)?)),
            Err(err) => warn!("{err}"),
        }
    }

    let senders = if args.list_senders {
        Some(
            corpus
                .sender_table()
                .context("--list-senders requires --step encode-senders")?,
        )
    } else {
        None
    };

    let tokenizer = match &args.tokenizer_out {
        Some(path) => Some((path, train_tokenizer(&corpus, &tokenizer_cfg, args.no_progress)?)),
        None => None,
    };
    if let Some((path, tokenizer)) = &tokenizer {
        tokenizer
            .save(path, args.pretty)
            .with_context(|| format!("failed to save tokenizer to {}", path.display()))?;
        info!("saved tokenizer to {}", path.display());
    }

    if args.json {
        let summary = json!({
            "files": files,
            "skipped": skipped,
            "messages": corpus.len(),
            "chats": corpus.chat_count(),
            "steps": steps,
            "time_delta": corpus.time_delta(),
            "shown": shown.iter().map(|(_, value)| value.clone()).collect::<Vec<_>>(),
            "senders": senders,
            "tokenizer": tokenizer.as_ref().map(|(path, tokenizer)| json!({
                "path": path.display().to_string(),
                "vocab_size": tokenizer.vocab_size(),
            })),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Files parsed : {}", report.parsed.len());
    println!("Files skipped: {}", report.skipped.len());
    println!("Messages     : {}", corpus.len());
    println!("Time delta   : {}", corpus.time_delta());
    for step in &steps {
        println!("Step {}: {}", step["step"].as_str().unwrap_or_default(), step["result"]);
    }
    if let Some(table) = senders {
        for (id, (name, count)) in table.names().iter().zip(table.counts()).enumerate() {
            println!("{id}\t{name}\t{count}");
        }
    }
    for (rendered, _) in &shown {
        println!("{rendered}");
    }
    if let Some((path, tokenizer)) = &tokenizer {
        println!(
            "Tokenizer    : {} (vocab size {})",
            path.display(),
            tokenizer.vocab_size()
        );
    }
    Ok(())
}

fn train_tokenizer(
    corpus: &Corpus,
    cfg: &TokenizerConfig,
    no_progress: bool,
) -> Result<ChatTokenizer> {
    let spinner = if no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} training tokenizer... {elapsed}")
            .context("invalid spinner template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let start = Instant::now();
    let tokenizer =
        ChatTokenizer::from_corpus(corpus, cfg).context("failed to train tokenizer")?;
    if let Some(pb) = spinner {
        pb.finish_with_message("training complete");
    }
    info!(
        "trained tokenizer with {} entries in {:.2?}",
        tokenizer.vocab_size(),
        start.elapsed()
    );
    Ok(tokenizer)
}

fn run_tokenize(args: TokenizeArgs) -> Result<()> {
    let tokenizer = ChatTokenizer::load(&args.tokenizer)
        .with_context(|| format!("failed to load tokenizer from {}", args.tokenizer.display()))?;

    for text in &args.texts {
        let encoded = tokenizer.encode(text)?;
        if args.json {
            let record = json!({
                "text": text,
                "ids": encoded.ids,
                "tokens": encoded.tokens,
            });
            println!("{}", serde_json::to_string(&record)?);
        } else {
            println!("{}\t{}", encoded.tokens.join(" "), join_ids(&encoded.ids));
        }
    }

    Ok(())
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
