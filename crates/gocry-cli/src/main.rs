//! gocry: file and line-directive encryption CLI
//!
//! Commands:
//!   encrypt [FILE]   - encrypt FILE (or stdin) to stdout
//!   decrypt [FILE]   - decrypt FILE (or stdin) to stdout
//!   config show      - display the merged configuration

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use gocry_core::config::GocryConfig;
use gocry_core::{CipherKind, Mode, Operation};
use gocry_crypto::SecretKey;
use gocry_engine::Engine;

const DEFAULT_CONFIG: &str = "gocry.toml";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "gocry",
    version,
    about = "Encrypt and decrypt files or directive-marked lines",
    long_about = "gocry: AES-256 encryption of whole files (streamed) or of single lines \
                  tagged with an encrypt directive, leaving the rest of the file readable"
)]
struct Cli {
    /// Path to gocry.toml configuration file
    #[arg(long, short = 'c', env = "GOCRY_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Log level or filter directive (overrides config; RUST_LOG wins over both)
    #[arg(long, env = "GOCRY_LOG")]
    log: Option<String>,

    /// Log output format
    #[arg(long, env = "GOCRY_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    /// Do not print the summary line after a successful run
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file, or the marked lines in it
    #[command(alias = "enc")]
    Encrypt(RunArgs),

    /// Decrypt a file, or the sealed lines in it
    #[command(alias = "dec")]
    Decrypt(RunArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Input file (default: stdin). Output always goes to stdout.
    file: Option<PathBuf>,

    /// Key as hex (64 chars, or 128 for deterministic mode)
    #[arg(
        long,
        short = 'k',
        env = "GOCRY_KEY",
        hide_env_values = true,
        conflicts_with = "key_file"
    )]
    key: Option<String>,

    /// File holding the key as hex
    #[arg(long, env = "GOCRY_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Process the whole file, or only directive lines
    #[arg(long, short = 'm', env = "GOCRY_MODE", value_enum)]
    mode: Option<ModeArg>,

    /// Line-mode worker count (0 = number of CPUs)
    #[arg(long, short = 'j', env = "GOCRY_PARALLEL")]
    parallel: Option<usize>,

    /// Encrypt with AES-SIV: same input, same output (64-byte key)
    #[arg(long, env = "GOCRY_DETERMINISTIC")]
    deterministic: bool,

    /// File-mode decrypt: authenticate everything before writing plaintext
    #[arg(long, env = "GOCRY_BUFFERED")]
    buffered: bool,

    /// Line-mode encrypt: a line holding only the encrypt directive seals the next line with it
    #[arg(long, short = 'x', alias = "experiments", env = "GOCRY_JOIN_STANDALONE")]
    join_standalone: bool,

    /// Suffix marking a line for encryption
    #[arg(long = "encrypt-directive", short = 'e', env = "GOCRY_ENCRYPT_DIRECTIVE")]
    encrypt_directive: Option<String>,

    /// Prefix of an encrypted line (followed by ": ")
    #[arg(long = "decrypt-directive", short = 'd', env = "GOCRY_DECRYPT_DIRECTIVE")]
    decrypt_directive: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    File,
    Line,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::File => Mode::File,
            ModeArg::Line => Mode::Line,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_config(format: &str) -> Self {
        if format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let explicit_config = cli.config != Path::new(DEFAULT_CONFIG);
    let config = load_config(&cli.config)?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli
        .log_format
        .unwrap_or_else(|| LogFormat::from_config(&config.log.format));
    init_logging(&level, format);

    if explicit_config && !cli.config.exists() {
        warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    match cli.command {
        Commands::Encrypt(args) => cmd_run(Operation::Encrypt, config, args, cli.quiet),
        Commands::Decrypt(args) => cmd_run(Operation::Decrypt, config, args, cli.quiet),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<GocryConfig> {
    if path.exists() {
        GocryConfig::from_file(path).with_context(|| format!("loading config: {}", path.display()))
    } else {
        Ok(GocryConfig::default())
    }
}

/// Command-line flags win over the config file.
fn merge_args(mut config: GocryConfig, args: &RunArgs) -> GocryConfig {
    if let Some(mode) = args.mode {
        config.mode = mode.into();
    }
    if let Some(parallel) = args.parallel {
        config.parallel = parallel;
    }
    config.deterministic |= args.deterministic;
    config.buffered |= args.buffered;
    config.join_standalone |= args.join_standalone;
    if let Some(encrypt) = &args.encrypt_directive {
        config.directives.encrypt = encrypt.clone();
    }
    if let Some(decrypt) = &args.decrypt_directive {
        config.directives.decrypt = decrypt.clone();
    }
    config
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// Logs go to stderr; stdout carries the data.
fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

// ── Key loading ───────────────────────────────────────────────────────────────

fn load_key(args: &RunArgs) -> Result<SecretKey> {
    let hex = match (&args.key, &args.key_file) {
        (Some(hex), _) => hex.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading key file: {}", path.display()))?,
        (None, None) => anyhow::bail!(
            "no key provided\n\
             Use --key <hex>, --key-file <path>, or set GOCRY_KEY / GOCRY_KEY_FILE."
        ),
    };
    SecretKey::from_hex(&hex).context("loading key")
}

// ── `gocry encrypt` / `gocry decrypt` ─────────────────────────────────────────

fn cmd_run(operation: Operation, config: GocryConfig, args: RunArgs, quiet: bool) -> Result<()> {
    let config = merge_args(config, &args);
    let key = load_key(&args)?;

    let mut engine = Engine::new(key, operation);
    engine.mode = config.mode;
    engine.cipher = config.cipher();
    engine.parallelism = config.effective_parallelism();
    engine.buffered = config.buffered;
    engine.join_standalone = config.join_standalone;
    engine.directives = config.directives.clone();

    if operation == Operation::Encrypt && engine.cipher == CipherKind::Deterministic {
        debug!("deterministic encryption: equal inputs produce equal outputs");
    }

    let input: Box<dyn Read> = match &args.file {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("opening input file: {}", path.display()))?,
        ),
        None => Box::new(io::stdin().lock()),
    };
    let name = args
        .file
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdin>".into());

    let processed = engine
        .process(input, io::stdout().lock())
        .with_context(|| format!("{operation}ing {name:?}"))?;

    if !quiet {
        match config.mode {
            Mode::File => eprintln!("{operation}ed file: {name:?}"),
            Mode::Line if processed => eprintln!("{operation}ed lines in: {name:?}"),
            Mode::Line => {}
        }
    }
    Ok(())
}

// ── `gocry config show` ───────────────────────────────────────────────────────

fn cmd_config_show(config: &GocryConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
