//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use propcrawl_core::{
    AddressesFoundEvent, BuildingChoice, BuildingsFoundEvent, EventBus, ErrorEvent, Orchestrator,
    StatusEvent, project_fields,
};
use propcrawl_driver::SnapshotDriver;
use propcrawl_shared::{
    AppConfig, Building, CrawlResult, PresetSource, ResolvedAddress, ResultSink, RunPreset,
    WaitBudget, init_config, load_config, load_config_from,
};
use propcrawl_storage::Storage;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// propcrawl — crawl building register details for an address.
#[derive(Parser)]
#[command(
    name = "propcrawl",
    version,
    about = "Look up an address, pick a building, and save its register details.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.propcrawl/propcrawl.toml.
    #[arg(long, env = "PROPCRAWL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Search an address and crawl one of its buildings.
    Run {
        /// Directory of captured site pages.
        #[arg(long, env = "PROPCRAWL_SNAPSHOTS")]
        snapshots: PathBuf,

        /// Address text to search for.
        #[arg(short, long)]
        query: String,

        /// Index of the address to choose (listed when omitted and ambiguous).
        #[arg(long)]
        address: Option<usize>,

        /// Index of the building to choose (listed when omitted and ambiguous).
        #[arg(long)]
        building: Option<usize>,

        /// Field titles to show (comma-separated). Defaults to the saved field preset.
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Override the element wait timeout from config.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Replay a saved run preset.
    Replay {
        /// Directory of captured site pages.
        #[arg(long, env = "PROPCRAWL_SNAPSHOTS")]
        snapshots: PathBuf,

        /// Name of the run preset.
        #[arg(long)]
        preset: String,
    },

    /// Run and field preset management.
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Preset subcommands.
#[derive(Subcommand)]
pub(crate) enum PresetAction {
    /// Save (or replace) a named run preset.
    SaveRun {
        /// Preset name.
        name: String,

        /// Address text to search for.
        #[arg(short, long)]
        query: String,

        /// Exact address label to choose (first candidate when omitted).
        #[arg(long)]
        address: Option<String>,

        /// Exact building label to choose (first candidate when omitted).
        #[arg(long)]
        building: Option<String>,

        /// Field titles to show (comma-separated).
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// List saved run presets.
    List,
    /// Show the saved field preset.
    Fields,
    /// Replace the saved field preset.
    SaveFields {
        /// Field titles (comma-separated).
        #[arg(value_delimiter = ',', required = true)]
        titles: Vec<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "propcrawl=warn",
        1 => "propcrawl=info",
        2 => "propcrawl=debug",
        _ => "propcrawl=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Run {
            snapshots,
            query,
            address,
            building,
            fields,
            timeout_ms,
        } => {
            let config = app_config(config_path.as_ref())?;
            cmd_run(
                &config,
                snapshots,
                &query,
                address,
                building,
                &fields,
                timeout_ms,
            )
        }
        Command::Replay { snapshots, preset } => {
            let config = app_config(config_path.as_ref())?;
            cmd_replay(&config, snapshots, &preset)
        }
        Command::Preset { action } => {
            let config = app_config(config_path.as_ref())?;
            let storage = open_storage(&config)?;
            match action {
                PresetAction::SaveRun {
                    name,
                    query,
                    address,
                    building,
                    fields,
                } => cmd_preset_save_run(
                    &storage,
                    RunPreset {
                        name,
                        query,
                        address,
                        building,
                        fields,
                    },
                ),
                PresetAction::List => cmd_preset_list(&storage),
                PresetAction::Fields => cmd_preset_fields(&storage),
                PresetAction::SaveFields { titles } => cmd_preset_save_fields(&storage, &titles),
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_ref()),
        },
    }
}

fn app_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

fn open_storage(config: &AppConfig) -> Result<Storage> {
    let data_dir = config.storage.resolve_data_dir()?;
    Ok(Storage::open(data_dir)?)
}

/// Open a snapshot session and wire the orchestrator to a progress spinner.
fn session(
    config: &AppConfig,
    snapshots: PathBuf,
    timeout_ms: Option<u64>,
) -> Result<(Orchestrator<SnapshotDriver>, CliProgress)> {
    let mut budget = WaitBudget::from(config);
    if let Some(ms) = timeout_ms {
        budget.timeout = Duration::from_millis(ms);
    }

    let driver = SnapshotDriver::open(&snapshots, budget)
        .wrap_err_with(|| format!("cannot open snapshots at '{}'", snapshots.display()))?;
    info!(
        snapshots = %snapshots.display(),
        headless = config.driver.headless,
        "driver session ready"
    );

    let bus = Arc::new(EventBus::new());
    let progress = CliProgress::new()?;
    progress.attach(&bus);
    Ok((Orchestrator::new(driver, bus, config.workflow), progress))
}

// ---------------------------------------------------------------------------
// Crawl commands
// ---------------------------------------------------------------------------

/// Where an interactive run stopped.
enum RunOutcome {
    Done(CrawlResult),
    NoAddresses,
    NoBuildings,
    ChooseAddress(Vec<ResolvedAddress>),
    ChooseBuilding(Vec<Building>),
}

fn cmd_run(
    config: &AppConfig,
    snapshots: PathBuf,
    query: &str,
    address: Option<usize>,
    building: Option<usize>,
    fields: &[String],
    timeout_ms: Option<u64>,
) -> Result<()> {
    let storage = open_storage(config)?;
    let (mut orch, progress) = session(config, snapshots, timeout_ms)?;

    info!(query, ?address, ?building, "starting crawl");
    let outcome = drive(&mut orch, query, address, building);
    progress.finish();

    match outcome.wrap_err("crawl failed")? {
        RunOutcome::Done(result) => report(&storage, &result, fields),
        RunOutcome::NoAddresses => {
            println!("No addresses found for '{query}'.");
            Ok(())
        }
        RunOutcome::NoBuildings => {
            println!("The chosen address has no buildings.");
            Ok(())
        }
        RunOutcome::ChooseAddress(addresses) => {
            println!("Several addresses match; rerun with --address <N>:");
            for (i, a) in addresses.iter().enumerate() {
                println!("  [{i}] {}", a.label);
            }
            Ok(())
        }
        RunOutcome::ChooseBuilding(buildings) => {
            println!("Several buildings found; rerun with --building <N>:");
            for (i, b) in buildings.iter().enumerate() {
                println!("  [{i}] {}", b.label);
            }
            Ok(())
        }
    }
}

fn drive(
    orch: &mut Orchestrator<SnapshotDriver>,
    query: &str,
    address: Option<usize>,
    building: Option<usize>,
) -> propcrawl_shared::Result<RunOutcome> {
    let addresses = orch.start_search(query)?;
    let address = match (address, addresses.len()) {
        (_, 0) => return Ok(RunOutcome::NoAddresses),
        (Some(i), _) => i,
        (None, 1) => 0,
        (None, _) => return Ok(RunOutcome::ChooseAddress(addresses)),
    };

    let buildings = match orch.choose_address_at(address)? {
        BuildingChoice::Crawled(result) => return Ok(RunOutcome::Done(result)),
        BuildingChoice::NoBuildings => return Ok(RunOutcome::NoBuildings),
        BuildingChoice::Pending(buildings) => buildings,
    };

    match building {
        Some(i) => Ok(RunOutcome::Done(orch.choose_building_at(i)?)),
        None if buildings.len() == 1 => Ok(RunOutcome::Done(orch.choose_building_at(0)?)),
        None => Ok(RunOutcome::ChooseBuilding(buildings)),
    }
}

fn cmd_replay(config: &AppConfig, snapshots: PathBuf, name: &str) -> Result<()> {
    let storage = open_storage(config)?;
    let preset = storage
        .run_preset(name)?
        .ok_or_else(|| eyre!("no run preset named '{name}' (see `propcrawl preset list`)"))?;

    let (mut orch, progress) = session(config, snapshots, None)?;
    info!(preset = %preset.name, query = %preset.query, "replaying preset");
    let outcome = orch.replay(&preset);
    progress.finish();

    let result = outcome.wrap_err_with(|| format!("replay of '{name}' failed"))?;
    report(&storage, &result, &preset.fields)
}

/// Print the result, projected onto `fields` (or the saved field preset),
/// and save it.
fn report(storage: &Storage, result: &CrawlResult, fields: &[String]) -> Result<()> {
    let titles = if fields.is_empty() {
        storage.field_titles()?
    } else {
        fields.to_vec()
    };

    println!();
    println!("  Address:  {}", result.address);
    println!("  Building: {}", result.building);
    println!("  Crawled:  {}", result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    if titles.is_empty() {
        for item in &result.items {
            println!("  {}: {}", item.title, item.content);
        }
    } else {
        for field in project_fields(&result.items, &titles) {
            println!("  {}: {}", field.title, field.display_content());
        }
    }

    let path = storage.save(result)?;
    println!();
    println!("  Saved:    {}", path.display());
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner driven by the event bus.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Ok(Self { spinner })
    }

    fn attach(&self, bus: &EventBus) {
        let spinner = self.spinner.clone();
        bus.on(move |event: &StatusEvent| {
            spinner.set_message(event.message.clone());
            Ok(())
        });

        let spinner = self.spinner.clone();
        bus.on(move |event: &AddressesFoundEvent| {
            spinner.set_message(format!("{} address(es) found", event.addresses.len()));
            Ok(())
        });

        let spinner = self.spinner.clone();
        bus.on(move |event: &BuildingsFoundEvent| {
            spinner.set_message(format!("{} building(s) found", event.buildings.len()));
            Ok(())
        });

        let spinner = self.spinner.clone();
        bus.on(move |event: &ErrorEvent| {
            spinner.suspend(|| eprintln!("[error] {}: {}", event.stage, event.message));
            Ok(())
        });
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Preset commands
// ---------------------------------------------------------------------------

fn cmd_preset_save_run(storage: &Storage, preset: RunPreset) -> Result<()> {
    let name = preset.name.clone();
    storage.save_run_preset(preset)?;
    println!("Run preset '{name}' saved.");
    Ok(())
}

fn cmd_preset_list(storage: &Storage) -> Result<()> {
    let presets = storage.list_run_presets()?;
    if presets.is_empty() {
        println!("No run presets saved.");
        return Ok(());
    }

    for p in presets {
        println!("{}", p.name);
        println!("  query:    {}", p.query);
        println!("  address:  {}", p.address.as_deref().unwrap_or("(first match)"));
        println!("  building: {}", p.building.as_deref().unwrap_or("(first match)"));
        if !p.fields.is_empty() {
            println!("  fields:   {}", p.fields.join(", "));
        }
    }
    Ok(())
}

fn cmd_preset_fields(storage: &Storage) -> Result<()> {
    let titles = storage.field_titles()?;
    if titles.is_empty() {
        println!("No field preset saved; all fields are shown.");
    } else {
        for title in titles {
            println!("{title}");
        }
    }
    Ok(())
}

fn cmd_preset_save_fields(storage: &Storage, titles: &[String]) -> Result<()> {
    match storage.save_field_titles(titles)? {
        0 => println!("No non-empty titles given; field preset unchanged."),
        n => println!("Field preset saved ({n} titles)."),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&PathBuf>) -> Result<()> {
    let config = app_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
