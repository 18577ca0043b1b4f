use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{error, info, LevelFilter};

use bmcflash::config::{get_global_config_path, load_config_from_file};
use bmcflash::models::DEFAULT_DEVICE_ID;
use bmcflash::{
    flush_all_logs, initialize_logging, CommandRunner, DeviceLock, Disposition, FlashConfig,
    Sequencer, StepParams, StepRegistry, SystemCommandRunner,
};

/// Exit code for failures before any step ran (usage, config, lock).
const EXIT_SETUP_FAILURE: u8 = 1;

/// Flash BMC firmware through an ordered pipeline of steps
///
/// Exit status: 0 on success, 42 when a step failed but the device may be
/// rebooted, 52 when the device must not be rebooted, 1 on setup errors.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Firmware image to flash
    #[arg(long)]
    image: PathBuf,

    /// Target device identifier, passed to every step (built-in steps ignore it)
    #[arg(long, default_value = DEFAULT_DEVICE_ID)]
    device: String,

    /// Partition name passed to every step (built-in steps ignore it)
    #[arg(long)]
    partition: Option<String>,

    /// Install flag passed to every step (built-in steps ignore it)
    #[arg(long)]
    install: bool,

    /// Force flag passed to every step (built-in steps ignore it)
    #[arg(long)]
    force: bool,

    /// Configuration file (default: ~/.config/bmcflash/config.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated step names, overriding the configured pipeline
    #[arg(long, value_delimiter = ',')]
    steps: Option<Vec<String>>,

    /// Retry bound for retryable step failures
    #[arg(long)]
    max_retries: Option<u32>,

    /// Lock file guarding the device
    #[arg(long)]
    lock_file: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<LevelFilter>,

    /// Print the pipeline result as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let code = match run(args).await {
        Ok(disposition) => disposition.exit_code() as u8,
        Err(e) => {
            if log::max_level() == LevelFilter::Off {
                eprintln!("bmcflash: {:#}", e);
            } else {
                error!("{:#}", e);
            }
            EXIT_SETUP_FAILURE
        }
    };

    flush_all_logs();
    ExitCode::from(code)
}

impl Args {
    fn step_params(&self) -> StepParams {
        let params = StepParams::new(self.image.clone(), self.device.clone())
            .with_install(self.install)
            .with_force(self.force);
        match &self.partition {
            Some(partition) => params.with_partition(partition.clone()),
            None => params,
        }
    }
}

async fn run(args: Args) -> anyhow::Result<Disposition> {
    let params = args.step_params();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(steps) = args.steps {
        config.pipeline.steps = steps;
    }
    if let Some(max_retries) = args.max_retries {
        config.pipeline.max_retries = max_retries;
    }
    if let Some(lock_file) = args.lock_file {
        config.pipeline.lock_file = lock_file;
    }

    let _collector = initialize_logging(&config.logging, args.log_level)
        .context("Failed to initialize logging")?;
    info!("bmcflash {} starting", bmcflash::VERSION);

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new());
    let registry = StepRegistry::with_builtin_steps(runner);
    config.validate(&registry).context("Invalid configuration")?;
    let steps = registry.build_pipeline(&config.pipeline.steps)?;

    let _lock = DeviceLock::acquire(&config.pipeline.lock_file)?;

    let sequencer = Sequencer::new(config.sequencer_config());
    let result = sequencer.run_pipeline(&steps, &params).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    }
    if result.reboot_permitted() {
        info!("Finished: {} (reboot permitted)", result.disposition);
    } else {
        error!("Finished: {} (DO NOT REBOOT)", result.disposition);
    }
    Ok(result.disposition)
}

/// Explicit path must exist; the global file is optional.
fn load_config(explicit: Option<&std::path::Path>) -> anyhow::Result<FlashConfig> {
    if let Some(path) = explicit {
        return load_config_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    match get_global_config_path() {
        Ok(path) if path.exists() => load_config_from_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        _ => Ok(FlashConfig::default()),
    }
}
