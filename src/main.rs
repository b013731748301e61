use anyhow::{anyhow, bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use indoc::indoc;
use kbmacro::adapter::HeadlessToolkit;
use kbmacro::{keysym, macro_file, Config, KbMacro, PlatformAdapter};
use log::{debug, info};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const AFTER_HELP: &str = indoc! {"
    Triggers are written like Ctrl-1, Alt-Shift-F5 or Ctrl--.
    Without a FILE argument the macro file from the configuration is used.
"};

#[derive(Parser, Debug)]
#[command(
    name = "kbmacro",
    version,
    about = "Inspect, tidy and replay keyboard macro files",
    after_help = AFTER_HELP
)]
struct Args {
    /// Configuration file (.toml, otherwise yaml)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// More logging; repeat for trace output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the macros in a file
    List { file: Option<PathBuf> },
    /// Report malformed blocks; exits with failure if there are any
    Check { file: Option<PathBuf> },
    /// Print a file in canonical form
    Fmt {
        file: Option<PathBuf>,
        /// Rewrite the file in place instead of printing it
        #[arg(long)]
        write: bool,
    },
    /// Replay one macro into a headless toolkit and print what was delivered
    Play {
        file: PathBuf,
        trigger: String,
        /// Widget to create before playback; defaults to every path the macros use
        #[arg(long = "widget", value_name = "PATH")]
        widgets: Vec<String>,
        /// Upper bound on queued macros run, for macros that trigger each other
        #[arg(long, default_value_t = 64)]
        max_passes: usize,
    },
    /// Print shell completions
    Completions { shell: Shell },
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    debug!("{config:?}");

    match args.command {
        Command::List { file } => {
            let path = macro_path(file, &config)?;
            let (table, _) = macro_file::read_file(&path)?;
            for map in &table {
                println!("{:<20} {}", map.description(), map.shorthand());
            }
        }
        Command::Check { file } => {
            let path = macro_path(file, &config)?;
            let (table, malformed) = macro_file::read_file(&path)?;
            println!("{}: {} macro(s), {malformed} malformed block(s)", path.display(), table.len());
            if malformed > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Fmt { file, write } => {
            let path = macro_path(file, &config)?;
            let (table, malformed) = macro_file::read_file(&path)?;
            if write {
                if malformed > 0 {
                    bail!("{}: refusing to rewrite, {malformed} block(s) would be lost", path.display());
                }
                macro_file::write_file(&path, &table, config.backup)?;
                info!("rewrote {}", path.display());
            } else {
                print!("{}", macro_file::print_table(&table));
            }
        }
        Command::Play {
            file,
            trigger,
            widgets,
            max_passes,
        } => play(&file, &trigger, widgets, max_passes)?,
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Args::command(), "kbmacro", &mut io::stdout());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn macro_path(file: Option<PathBuf>, config: &Config) -> anyhow::Result<PathBuf> {
    file.or_else(|| config.macro_file.clone())
        .ok_or_else(|| anyhow!("no macro file given and none configured"))
}

fn play(file: &Path, trigger: &str, widgets: Vec<String>, max_passes: usize) -> anyhow::Result<()> {
    let (code, state) = keysym::parse_trigger(trigger).with_context(|| format!("bad trigger {trigger:?}"))?;

    let mut engine = KbMacro::new(HeadlessToolkit::new(), Config::in_memory());
    engine.load_macro_file(file)?;

    let paths: BTreeSet<String> = if widgets.is_empty() {
        engine
            .table()
            .iter()
            .flat_map(|map| map.response().iter().map(|e| e.widget_path().to_string()))
            .filter(|path| !path.is_empty())
            .collect()
    } else {
        widgets.into_iter().collect()
    };
    for path in &paths {
        engine.adapter_mut().add_widget(path);
    }

    if !engine.macro_expand(code, state, false) {
        bail!("no macro bound to {}", keysym::describe(code, state));
    }
    let ran = engine.run_pending(max_passes);
    debug!("ran {ran} macro(s)");

    for delivery in engine.adapter().delivered() {
        println!("{:<24} {}", delivery.widget, delivery.event);
    }
    debug!("modifiers left held: {}", engine.adapter().query_modifier_state());
    Ok(())
}
