use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use keytest::app::{self, RunConfig};
use keytest::input::InputMode;
use keytest::prefs::{MemoryStore, Preferences, PreferencesStore, Theme, TomlFileStore};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keytest")]
#[command(version)]
#[command(about = "keytest: an on-screen keyboard that lights up the keys you press", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Options for running without a subcommand
    #[command(flatten)]
    run: RunArgs,

    /// Preferences file (default: <config dir>/keytest/preferences.toml)
    #[arg(long, global = true)]
    prefs: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the keyboard and highlight keys as they are pressed (default)
    Run(RunArgs),

    /// Inspect or change saved preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Where key events come from
    #[arg(short, long, value_enum, default_value_t = InputMode::Auto)]
    input: InputMode,

    /// Never open the audio device
    #[arg(long)]
    mute: bool,

    /// Keep preference changes in memory only
    #[arg(long)]
    no_persist: bool,

    /// Log file (default: <cache dir>/keytest/keytest.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Print the current preferences
    Show,
    /// Print the preferences file location
    Path,
    /// Restore default preferences
    Reset,
    /// Change one or more preferences
    Set {
        /// Click sound on key press
        #[arg(long)]
        sound: Option<bool>,

        /// Click volume (0.0 - 1.0)
        #[arg(long, value_parser = parse_volume)]
        volume: Option<f32>,

        /// Color theme
        #[arg(long, value_enum)]
        theme: Option<Theme>,
    },
}

fn parse_volume(s: &str) -> Result<f32, String> {
    let v: f32 = s.parse().map_err(|_| format!("not a number: {s}"))?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("volume must be between 0.0 and 1.0, got {v}"))
    }
}

fn file_store(path: Option<PathBuf>) -> anyhow::Result<TomlFileStore> {
    match path {
        Some(path) => Ok(TomlFileStore::new(path)),
        None => TomlFileStore::at_default_location().context("locating preferences file"),
    }
}

fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keytest")
        .join("keytest.log")
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Log to a file; the keyboard view owns the terminal.
fn init_file_logging(path: &Path, debug: bool) {
    let file = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| File::options().create(true).append(true).open(path));
    // Without a writable log file we run unlogged rather than scribble on the screen
    let Ok(file) = file else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(if debug { "debug" } else { "info" }))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

fn init_stderr_logging(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(if debug { "debug" } else { "warn" }))
        .with_writer(std::io::stderr)
        .init();
}

fn run_prefs(action: PrefsAction, path: Option<PathBuf>) -> anyhow::Result<()> {
    let mut store = file_store(path)?;

    match action {
        PrefsAction::Path => println!("{}", store.path().display()),
        PrefsAction::Show => {
            let prefs = store.load();
            println!("# {}", store.path().display());
            print!("{}", prefs.to_toml()?);
        }
        PrefsAction::Reset => {
            store.save(&Preferences::default())?;
            println!("Preferences reset: {}", store.path().display());
        }
        PrefsAction::Set {
            sound,
            volume,
            theme,
        } => {
            let mut prefs = store.load();
            if let Some(sound) = sound {
                prefs.sound_enabled = sound;
            }
            if let Some(volume) = volume {
                prefs.set_volume(volume);
            }
            if let Some(theme) = theme {
                prefs.theme = theme;
            }
            store.save(&prefs)?;
            print!("{}", prefs.to_toml()?);
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run(cli.run)) {
        Commands::Run(args) => {
            let log_path = args.log_file.unwrap_or_else(default_log_path);
            init_file_logging(&log_path, cli.debug);

            let store: Box<dyn PreferencesStore> = if args.no_persist {
                Box::new(MemoryStore::new())
            } else {
                Box::new(file_store(cli.prefs)?)
            };
            info!(input = ?args.input, mute = args.mute, "starting");

            app::run(RunConfig {
                input: args.input,
                store,
                mute: args.mute,
            })?;
        }
        Commands::Prefs { action } => {
            init_stderr_logging(cli.debug);
            run_prefs(action, cli.prefs)?;
        }
    }

    Ok(())
}
