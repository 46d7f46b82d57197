use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use keybridge_core::replay::replay_jsonl;
use keybridge_core::{CharModifierPolicy, ImeConfig};
use tracing::{debug, info};

use crate::error::{ReplayError, Result};
use crate::output::{OutputFormat, write_outcome};

#[derive(Debug, Parser)]
#[command(
    name = "keybridge-replay",
    about = "Replay recorded browser keyboard/IME captures into canonical key and character events",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a JSONL capture of DOM events.
    Replay(ReplayArgs),

    /// Load and validate a session config file.
    #[command(name = "check-config")]
    CheckConfig(CheckConfigArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    /// Capture file, one DOM event per line; `-` reads stdin.
    pub capture: PathBuf,

    /// Session config (`.toml`, otherwise JSON).
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Jsonl)]
    pub format: OutputFormat,

    /// Override the config's character modifier policy.
    #[arg(long, value_enum)]
    pub char_modifiers: Option<ModifierPolicyArg>,

    /// Emit a character event after each printable key-down.
    #[arg(long)]
    pub synthesize_key_press: bool,

    /// Write to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct CheckConfigArgs {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModifierPolicyArg {
    CaseDerived,
    #[value(name = "none")]
    Empty,
}

impl From<ModifierPolicyArg> for CharModifierPolicy {
    fn from(arg: ModifierPolicyArg) -> Self {
        match arg {
            ModifierPolicyArg::CaseDerived => Self::CaseDerived,
            ModifierPolicyArg::Empty => Self::None,
        }
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

/// Run with output going to stdout (or `--output`).
pub fn run(cli: Cli) -> Result<()> {
    let output = match &cli.command {
        Commands::Replay(args) => {
            if args
                .output
                .as_deref()
                .is_some_and(|output| same_file(output, &args.capture))
            {
                return Err(ReplayError::invalid("--output must not overwrite the capture"));
            }
            args.output.clone()
        }
        Commands::CheckConfig(_) => None,
    };
    match output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(&path)?);
            execute(cli, &mut out)?;
            out.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            execute(cli, &mut out)?;
        }
    }
    Ok(())
}

/// Run, writing results to `out`.
pub fn execute(cli: Cli, out: &mut impl Write) -> Result<()> {
    match cli.command {
        Commands::Replay(args) => run_replay(&args, out),
        Commands::CheckConfig(args) => {
            let config = load_config(&args.path)?;
            writeln!(out, "{}", serde_json::to_string(&config)?)?;
            Ok(())
        }
    }
}

fn run_replay(args: &ReplayArgs, out: &mut impl Write) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ImeConfig::default(),
    };
    if let Some(policy) = args.char_modifiers {
        config.char_modifiers = policy.into();
    }
    config.synthesize_key_press |= args.synthesize_key_press;
    debug!(?config, "replay config");

    let capture = read_capture(&args.capture)?;
    let outcome = replay_jsonl(&capture, config)?;
    info!(
        records = outcome.records,
        entries = outcome.entries.len(),
        "capture replayed"
    );
    write_outcome(out, &outcome, args.format)
}

/// Both paths name the same file, resolving `.`/`..` and symlinks when the
/// files exist.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn read_capture(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    if !path.exists() {
        return Err(ReplayError::MissingPath {
            path: path.to_path_buf(),
        });
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Load a config file; `.toml` files are parsed as TOML, anything else as JSON.
pub fn load_config(path: &Path) -> Result<ImeConfig> {
    if !path.exists() {
        return Err(ReplayError::MissingPath {
            path: path.to_path_buf(),
        });
    }
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let config = if is_toml {
        ImeConfig::from_toml_file(path)?
    } else {
        ImeConfig::from_json_str(&std::fs::read_to_string(path)?)?
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_capture_is_a_missing_path_error() {
        let mut out = Vec::new();
        let result = execute(
            Cli {
                command: Commands::Replay(ReplayArgs {
                    capture: PathBuf::from("/tmp/keybridge-replay/does-not-exist.jsonl"),
                    config: None,
                    format: OutputFormat::Jsonl,
                    char_modifiers: None,
                    synthesize_key_press: false,
                    output: None,
                }),
            },
            &mut out,
        );
        match result.expect_err("missing capture should fail") {
            ReplayError::MissingPath { path } => assert_eq!(
                path,
                PathBuf::from("/tmp/keybridge-replay/does-not-exist.jsonl")
            ),
            other => panic!("expected MissingPath, got {other}"),
        }
        assert!(out.is_empty());
    }

    #[test]
    fn output_over_capture_is_rejected() {
        let result = run(Cli {
            command: Commands::Replay(ReplayArgs {
                capture: PathBuf::from("capture.jsonl"),
                config: None,
                format: OutputFormat::Jsonl,
                char_modifiers: None,
                synthesize_key_press: false,
                output: Some(PathBuf::from("capture.jsonl")),
            }),
        });
        assert!(matches!(result, Err(ReplayError::InvalidArgument { .. })));
    }

    #[test]
    fn output_aliasing_the_capture_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let capture = dir.path().join("capture.jsonl");
        std::fs::write(&capture, "{\"type\":\"input\"}\n").expect("write capture");

        let result = run(Cli {
            command: Commands::Replay(ReplayArgs {
                capture: capture.clone(),
                config: None,
                format: OutputFormat::Jsonl,
                char_modifiers: None,
                synthesize_key_press: false,
                output: Some(dir.path().join(".").join("capture.jsonl")),
            }),
        });
        assert!(matches!(result, Err(ReplayError::InvalidArgument { .. })));
        assert_eq!(
            std::fs::read_to_string(&capture).expect("capture intact"),
            "{\"type\":\"input\"}\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn output_symlinked_to_the_capture_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let capture = dir.path().join("capture.jsonl");
        std::fs::write(&capture, "").expect("write capture");
        let link = dir.path().join("link.jsonl");
        std::os::unix::fs::symlink(&capture, &link).expect("symlink");

        assert!(same_file(&link, &capture));
        assert!(!same_file(&dir.path().join("other.jsonl"), &capture));
    }

    #[test]
    fn cli_parses_replay_flags() {
        let cli = Cli::try_parse_from([
            "keybridge-replay",
            "replay",
            "capture.jsonl",
            "--format",
            "summary",
            "--char-modifiers",
            "none",
            "--synthesize-key-press",
        ])
        .expect("parses");
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay command");
        };
        assert_eq!(args.format, OutputFormat::Summary);
        assert_eq!(args.char_modifiers, Some(ModifierPolicyArg::Empty));
        assert!(args.synthesize_key_press);
        assert_eq!(args.capture, PathBuf::from("capture.jsonl"));
    }

    #[test]
    fn modifier_policy_arg_maps_to_core_policy() {
        assert_eq!(
            CharModifierPolicy::from(ModifierPolicyArg::CaseDerived),
            CharModifierPolicy::CaseDerived
        );
        assert_eq!(
            CharModifierPolicy::from(ModifierPolicyArg::Empty),
            CharModifierPolicy::None
        );
    }
}
