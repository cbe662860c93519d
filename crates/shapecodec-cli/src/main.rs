//! `shapecodec` CLI: reformat and validate JSON from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Compact a document (stdin → stdout)
//! echo '{ "b": 2, "a": [1, 2] }' | shapecodec fmt
//!
//! # Indent with two spaces, file to file
//! shapecodec fmt --indent "  " -i data.json -o pretty.json
//!
//! # Colourize for the terminal
//! shapecodec fmt --indent '\t' --color -i data.json
//!
//! # Load encode/decode options from a JSON config file
//! shapecodec fmt --config shapecodec.json -i data.json
//!
//! # Check well-formedness (exit status 1 with the offset on failure)
//! shapecodec validate -i data.json
//!
//! # Newline-delimited input: every value is checked
//! shapecodec validate --stream -i events.ndjson
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use shapecodec_core::{
    ColorScheme, DecodeOptions, DuplicateKeyPolicy, Dynamic, EncodeOptions, RawValue, StreamDecoder, StreamEncoder,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shapecodec", version, about = "Reformat and validate JSON documents")]
struct Cli {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-encode every JSON value in the input, one per line
    Fmt(FmtArgs),
    /// Check that the input is well-formed JSON
    Validate {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Accept a sequence of top-level values instead of exactly one
        #[arg(long)]
        stream: bool,
    },
}

#[derive(Args)]
struct FmtArgs {
    /// Input file (reads from stdin if omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Output file (writes to stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Indent for each nesting level; `\t` is a tab. Compact output if omitted
    #[arg(long)]
    indent: Option<String>,
    /// Written at the start of every indented line after the first
    #[arg(long, default_value = "", requires = "indent")]
    prefix: String,
    /// Wrap literals in ANSI colour escapes
    #[arg(long)]
    color: bool,
    /// Leave `<`, `>` and `&` unescaped inside strings
    #[arg(long)]
    no_escape_html: bool,
    /// Keep the first of repeated object keys instead of the last
    #[arg(long)]
    first_wins: bool,
    /// Trace the output program while encoding (use with --log-level trace)
    #[arg(long)]
    debug: bool,
    /// JSON file holding `encode` and `decode` option objects
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Options file layout. Command-line flags override its values.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Config {
    encode: EncodeOptions,
    decode: DecodeOptions,
}

impl Config {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let text = std::fs::read(path).with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config =
            serde_json::from_slice(&text).with_context(|| format!("Invalid config file: {}", path.display()))?;
        tracing::debug!(?config, "loaded configuration");
        Ok(config)
    }
}

impl FmtArgs {
    fn options(&self, config: Config) -> (EncodeOptions, DecodeOptions) {
        let Config {
            mut encode,
            mut decode,
        } = config;
        if let Some(indent) = &self.indent {
            encode = encode.with_indent(unescape(&self.prefix), unescape(indent));
        }
        if self.color && encode.colorize.is_none() {
            encode = encode.with_colors(ColorScheme::default());
        }
        if self.no_escape_html {
            encode.escape_html = false;
        }
        if self.debug {
            encode.debug = true;
        }
        if self.first_wins {
            decode.duplicate_keys = DuplicateKeyPolicy::FirstWins;
        }
        // Numbers pass through exactly as written.
        decode.use_number = true;
        (encode, decode)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Fmt(args) => cmd_fmt(&args),
        Commands::Validate { input, stream } => cmd_validate(input.as_deref(), stream),
    }
}

fn cmd_fmt(args: &FmtArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let (encode, decode) = args.options(config);

    let mut decoder = StreamDecoder::with_options(open_input(args.input.as_deref())?, decode);
    let mut encoder = StreamEncoder::with_options(open_output(args.output.as_deref())?, encode);

    let mut count = 0usize;
    while decoder.more() {
        let mut value = Dynamic::null();
        decoder
            .decode(&mut value)
            .with_context(|| format!("Failed to decode value {}", count + 1))?;
        encoder
            .encode(&value)
            .with_context(|| format!("Failed to encode value {}", count + 1))?;
        count += 1;
    }
    reject_trailing(&decoder)?;
    if count == 0 {
        bail!("No JSON value in input");
    }

    encoder.into_inner().flush().context("Failed to flush output")?;
    tracing::info!(values = count, "formatted");
    Ok(())
}

fn cmd_validate(input: Option<&Path>, stream: bool) -> Result<()> {
    // Nesting is not limited when only checking syntax.
    let options = DecodeOptions::default().with_max_depth(usize::MAX);
    let mut decoder = StreamDecoder::with_options(open_input(input)?, options);

    let mut count = 0usize;
    while decoder.more() {
        if count == 1 && !stream {
            bail!(
                "Invalid JSON: unexpected data after top-level value at offset {} (use --stream for multiple values)",
                decoder.input_offset()
            );
        }
        let mut raw = RawValue::default();
        decoder.decode(&mut raw).context("Invalid JSON")?;
        count += 1;
    }
    reject_trailing(&decoder)?;
    if count == 0 {
        bail!("Invalid JSON: no value in input");
    }

    if stream {
        println!("valid ({count} values)");
    } else {
        println!("valid");
    }
    Ok(())
}

/// A stray closing bracket stops `more()` without being consumed.
fn reject_trailing<R: Read>(decoder: &StreamDecoder<R>) -> Result<()> {
    if let Some(&b) = decoder.buffered().first() {
        bail!(
            "Invalid JSON: unexpected '{}' at offset {}",
            char::from(b),
            decoder.input_offset()
        );
    }
    Ok(())
}

/// `\t` in an indent or prefix argument means a tab.
fn unescape(s: &str) -> String {
    s.replace("\\t", "\t")
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>> {
    match path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to write file: {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}
