use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use timeline_archive::{init_tracing, level_for_verbosity, FetchOptions, TimelineArchive, DEFAULT_STORE};

#[derive(Parser)]
#[command(name = "timeline-archive", version)]
#[command(about = "Download an account's posts into a resumable JSON-lines store", long_about = None)]
pub struct Cli {
    /// More output: -v for progress, -vv for debug (RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch posts newer than the store's last record and append them
    Fetch {
        /// Account to fetch from
        account: String,

        /// Store to resume from and append to
        #[arg(default_value = DEFAULT_STORE)]
        store: PathBuf,

        /// Start fetching after this id [default: last id in STORE]
        watermark: Option<u64>,

        /// Posts per page request
        #[arg(long, default_value_t = timeline_archive::DEFAULT_PAGE_SIZE)]
        page_size: usize,

        /// Retries for a failed page request
        #[arg(long, default_value_t = 3)]
        retries: u32,

        /// Seconds to wait between retries
        #[arg(long, default_value_t = 5)]
        retry_delay_secs: u64,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Timeline API root [env: TIMELINE_API_BASE]
        #[arg(long)]
        api_base: Option<String>,

        /// Show a live counter while fetching
        #[arg(long)]
        progress: bool,
    },
    /// Report records whose id is lower than the one before
    Verify {
        store: PathBuf,

        /// Print reports as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Re-apply field pruning to a store, writing a new store
    Reprocess {
        input: PathBuf,
        output: PathBuf,

        #[arg(long)]
        progress: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(level_for_verbosity(cli.verbose));

    match cli.command {
        Commands::Fetch { account, store, watermark, page_size, retries, retry_delay_secs, timeout_secs, api_base, progress } => {
            let mut opts = FetchOptions::from_env()
                .with_page_size(page_size)
                .with_retry_count(retries)
                .with_retry_delay(Duration::from_secs(retry_delay_secs))
                .with_request_timeout(Duration::from_secs(timeout_secs))
                .with_progress(progress);
            if let Some(base) = api_base {
                opts = opts.with_api_base(base);
            }

            let mut archive = TimelineArchive::new().options(opts).store(&store);
            if let Some(id) = watermark {
                archive = archive.watermark(id.to_string());
            }
            archive.fetch(&account)?;
        }
        Commands::Verify { store, json } => {
            let reports = TimelineArchive::new().store(&store).verify()?;
            for r in &reports {
                if json {
                    println!("{}", serde_json::to_string(r)?);
                } else {
                    println!("{}", r);
                }
            }
        }
        Commands::Reprocess { input, output, progress } => {
            TimelineArchive::new().store(&input).progress(progress).reprocess_to(&output)?;
        }
    }

    Ok(())
}
