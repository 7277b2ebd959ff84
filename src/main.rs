use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, trace};

use nightshift::classify::dispatch;
use nightshift::clock::{Clock, SystemClock};
use nightshift::compress::{gzip_fits_files, record_backup};
use nightshift::config::{Config, ConfigLoader};
use nightshift::fits::FitsFileReader;
use nightshift::frame::read_frame;
use nightshift::night::default_night_dir;
use nightshift::session::{Collaborators, SessionDriver, SessionOptions};
use nightshift::solar::Site;

/// On-the-fly reduction of the nightly imaging stream
#[derive(Parser)]
#[command(name = "nightshift")]
#[command(about = "Reduce telescope frames as they arrive, from dusk to sunrise", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the on-the-fly reduction until sunrise
    Run {
        /// Night directory (default: <photpath>/<UT date>)
        #[arg(short = 'd', long)]
        photdir: Option<PathBuf>,

        /// Do not copy products to the remote archive
        #[arg(short = 'n', long)]
        nocopy: bool,

        /// Process NA image types
        #[arg(short = 'p', long)]
        proc_na: bool,

        /// Quick photometry of on-target products
        #[arg(long)]
        phot: bool,

        /// Process locally: no chat pushes or marshal updates
        #[arg(short = 'l', long)]
        local: bool,

        /// Make only one pass through the images
        #[arg(short = 'o', long)]
        one_pass: bool,
    },
    /// Classify frames and show what the loop would do with them
    Classify {
        /// FITS files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Reduce NA frames as `run --proc-na` would
        #[arg(short = 'p', long)]
        proc_na: bool,
    },
    /// Print the next sunrise at the configured site
    Sunrise,
    /// Compress a night's frames and record it for backup
    Gzip {
        /// Night directory (default: <photpath>/<UT date>)
        #[arg(short = 'd', long)]
        photdir: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ConfigLoader::new(cli.config.clone())
        .load()
        .await
        .context("loading configuration")?;
    let _guard = nightshift::logging::init(cli.verbose, config.paths.log_dir.as_deref())?;

    debug!("nightshift started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    match cli.command {
        Commands::Run {
            photdir,
            nocopy,
            proc_na,
            phot,
            local,
            one_pass,
        } => {
            let options = SessionOptions {
                nocopy,
                proc_na,
                do_phot: phot,
                local,
                one_pass,
            };
            run_session(config, options, photdir).await
        }
        Commands::Classify { files, proc_na } => run_classify(&config, files, proc_na).await,
        Commands::Sunrise => {
            let site = Site::from(&config.observatory);
            let sunrise = site.next_sunrise(SystemClock.now())?;
            println!("{} {}", config.observatory.name, sunrise.to_rfc3339());
            Ok(())
        }
        Commands::Gzip { photdir } => {
            let dir = photdir.unwrap_or_else(|| default_night_dir(&config, SystemClock.now()));
            let report = gzip_fits_files(&dir)
                .with_context(|| format!("compressing {}", dir.display()))?;
            let tag = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            record_backup(&config.backup.phot_backup_file, &tag)?;
            println!("{} raw, {} reduced", report.raw, report.reduced);
            Ok(())
        }
    }
}

async fn run_session(
    config: Config,
    options: SessionOptions,
    photdir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let tools = Collaborators::production(&config)?;
    let driver = SessionDriver::start(Arc::new(config), options, tools, photdir)
        .context("starting session")?;
    let summary = driver.run().await;
    println!(
        "{}: {} frames processed, {} skipped, {} products ({:?})",
        summary.night,
        summary.frames_processed,
        summary.frames_skipped,
        summary.products,
        summary.end_reason
    );
    Ok(())
}

async fn run_classify(config: &Config, files: Vec<PathBuf>, proc_na: bool) -> anyhow::Result<()> {
    let options = SessionOptions {
        proc_na,
        ..Default::default()
    };
    for path in files {
        match read_frame(
            &path,
            &FitsFileReader,
            &SystemClock,
            config.polling.header_retry_delay,
        )
        .await
        {
            Some(frame) => println!(
                "{}\t{}\t{:?}\tcosmic={}",
                path.display(),
                frame.category,
                dispatch(frame.category, options.dispatch_options()),
                frame.cosmic_ray_rejection()
            ),
            None => println!("{}\tunreadable", path.display()),
        }
    }
    Ok(())
}
