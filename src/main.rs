use clap::{Parser, Subcommand, ValueEnum};
use pdfstation_client::config::{load_config, Config, LogFormat, LoggingConfig};
use pdfstation_client::error::{ClientError, ClientResult};
use pdfstation_client::models::{
    CompletedJob, JobId, JobRequest, Operation, PageRanges, ProtectOptions, SplitMode, UploadFile,
    DEFAULT_COMPRESSION_QUALITY,
};
use pdfstation_client::services::validation::RequestValidator;
use pdfstation_client::services::{DownloadService, HttpJobClient, JobHandle, JobPhase, JobRunner, JobService};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_SPLIT_INTERVAL: u32 = 5;

#[derive(Parser)]
#[command(name = "pdfstation")]
#[command(about = "Run PDF jobs against a PDFStation service", version)]
struct Cli {
    /// Base URL of the job service (overrides PDFSTATION_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory results are saved to (overrides PDFSTATION_OUTPUT_DIR)
    #[arg(long, short = 'o', global = true)]
    output_dir: Option<PathBuf>,

    /// Milliseconds between status checks
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: Option<u64>,

    /// Status checks before giving up
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    max_polls: Option<u32>,

    /// Stop once the job is ready and print its download URL
    #[arg(long, global = true)]
    no_download: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce the size of a PDF
    Compress {
        file: PathBuf,

        /// 0 favours size, 100 favours quality
        #[arg(long, default_value_t = DEFAULT_COMPRESSION_QUALITY, value_parser = clap::value_parser!(u8).range(0..=100))]
        quality: u8,
    },

    /// Merge two or more PDFs in the given order
    Merge {
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,
    },

    /// Split a PDF by page ranges, fixed intervals, or into single pages
    Split {
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = SplitKind::Pages)]
        mode: SplitKind,

        /// Page ranges for `--mode pages`, e.g. 1-3,5,7-10
        #[arg(long)]
        ranges: Option<String>,

        /// Pages per document for `--mode interval`
        #[arg(long)]
        interval: Option<u32>,
    },

    /// Password-protect a PDF
    Protect {
        file: PathBuf,

        /// Password required to open the document
        #[arg(long)]
        user_password: String,

        /// Password required to change permissions
        #[arg(long)]
        owner_password: Option<String>,

        #[arg(long)]
        deny_printing: bool,

        #[arg(long)]
        deny_copying: bool,

        #[arg(long)]
        deny_modification: bool,

        #[arg(long)]
        deny_assembly: bool,
    },

    /// Remove password protection from a PDF
    Unprotect {
        file: PathBuf,

        /// Current document password
        #[arg(long)]
        password: String,
    },

    /// Convert a PDF to a Word document
    ToWord { file: PathBuf },

    /// Print the current status of a job as JSON
    Status { job_id: String },

    /// Watch an existing job until it finishes, then download its result
    Wait {
        job_id: String,

        /// Operation the job was created with (selects the download endpoint)
        #[arg(long)]
        operation: Operation,
    },

    /// Ask the service for the expected size after compression
    Estimate {
        file: PathBuf,

        #[arg(long, default_value_t = DEFAULT_COMPRESSION_QUALITY, value_parser = clap::value_parser!(u8).range(0..=100))]
        quality: u8,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitKind {
    Pages,
    Interval,
    All,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = apply_overrides(load_config(), &cli);

    init_logging(&config.logging);
    info!("Starting PDFStation client v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli, config).await {
        error!("{}", e);
        eprintln!("Error: {}", e.user_message());
        if let ClientError::PollTimeout { job_id, .. } = &e {
            eprintln!("Job {job_id} may still finish; check it later with `pdfstation status {job_id}`");
        }
        process::exit(1);
    }
}

fn apply_overrides(mut config: Config, cli: &Cli) -> Config {
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.download.output_dir = dir.clone();
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.polling.interval = Duration::from_millis(ms);
    }
    if let Some(max_polls) = cli.max_polls {
        config.polling.max_polls = max_polls;
    }
    config
}

async fn run(cli: Cli, config: Config) -> ClientResult<()> {
    config.validate()?;

    let client = HttpJobClient::from_config(&config)?;
    let service: Arc<dyn JobService> = Arc::new(client.clone());
    let runner = JobRunner::new(
        service.clone(),
        config.polling.clone(),
        RequestValidator::new(config.upload.max_file_size_mb),
    );
    let downloads = DownloadService::new(client.clone(), &config.download);

    let handle = match cli.command {
        Commands::Status { job_id } => {
            let snapshot = service.job_status(&JobId::from(job_id)).await?;
            let json = serde_json::to_string_pretty(&snapshot)
                .map_err(|e| ClientError::Service(format!("Failed to render status: {e}")))?;
            println!("{json}");
            return Ok(());
        }
        Commands::Estimate { file, quality } => {
            let original_size = tokio::fs::metadata(&file).await?.len();
            let estimate = client.estimate_size(original_size, quality).await?;
            println!("{estimate}");
            return Ok(());
        }
        Commands::Wait { job_id, operation } => runner.poller().spawn(JobId::from(job_id), operation),
        command => runner.start(build_request(command).await?),
    };

    let job = watch_job(handle, config.polling.max_polls).await?;

    if cli.no_download {
        println!("{}", downloads.download_url(&job)?);
        return Ok(());
    }

    let path = downloads.save(&job, &config.download.output_dir).await?;
    println!("{}", path.display());
    Ok(())
}

async fn build_request(command: Commands) -> ClientResult<JobRequest> {
    let request = match command {
        Commands::Compress { file, quality } => JobRequest::Compress {
            file: UploadFile::from_path(&file).await?,
            quality,
        },
        Commands::Merge { files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                uploads.push(UploadFile::from_path(path).await?);
            }
            JobRequest::Merge { files: uploads }
        }
        Commands::Split { file, mode, ranges, interval } => {
            let mode = match mode {
                SplitKind::Pages => {
                    let ranges: PageRanges = ranges.unwrap_or_default().parse()?;
                    SplitMode::Pages(ranges)
                }
                SplitKind::Interval => SplitMode::Interval(interval.unwrap_or(DEFAULT_SPLIT_INTERVAL)),
                SplitKind::All => SplitMode::All,
            };
            JobRequest::Split {
                file: UploadFile::from_path(&file).await?,
                mode,
            }
        }
        Commands::Protect {
            file,
            user_password,
            owner_password,
            deny_printing,
            deny_copying,
            deny_modification,
            deny_assembly,
        } => {
            let mut options = ProtectOptions::new(user_password);
            options.owner_password = owner_password;
            options.allow_printing = !deny_printing;
            options.allow_copying = !deny_copying;
            options.allow_modification = !deny_modification;
            options.allow_assembly = !deny_assembly;
            JobRequest::Protect {
                file: UploadFile::from_path(&file).await?,
                options,
            }
        }
        Commands::Unprotect { file, password } => JobRequest::RemoveProtection {
            file: UploadFile::from_path(&file).await?,
            password,
        },
        Commands::ToWord { file } => JobRequest::PdfToWord {
            file: UploadFile::from_path(&file).await?,
        },
        Commands::Status { .. } | Commands::Wait { .. } | Commands::Estimate { .. } => {
            return Err(ClientError::Validation("command does not create a job".to_string()));
        }
    };
    Ok(request)
}

/// Reports progress until the job settles. Ctrl-C drops the handle, which
/// stops the background polling.
async fn watch_job(handle: JobHandle, max_polls: u32) -> ClientResult<CompletedJob> {
    let mut phases = handle.subscribe();
    let reporter = tokio::spawn(async move {
        loop {
            let phase = phases.borrow_and_update().clone();
            report_phase(&phase, max_polls);
            if phase.is_terminal() || phases.changed().await.is_err() {
                break;
            }
        }
    });

    let result = tokio::select! {
        result = handle.wait() => result,
        _ = tokio::signal::ctrl_c() => Err(ClientError::Cancelled("interrupted".to_string())),
    };

    reporter.abort();
    result
}

fn report_phase(phase: &JobPhase, max_polls: u32) {
    match phase {
        JobPhase::Idle => {}
        JobPhase::Submitting { operation } => eprintln!("Uploading ({operation})..."),
        JobPhase::Polling { job_id, status, polls } => {
            eprintln!("Job {job_id}: {status} (check {polls}/{max_polls})")
        }
        JobPhase::Ready(job) => eprintln!("Job {} completed", job.id()),
        JobPhase::Failed { .. } | JobPhase::TimedOut { .. } | JobPhase::Cancelled { .. } => {}
    }
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    if config.format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }
}
