use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::error;
use tracing_subscriber::EnvFilter;

use taskplex_client::{
    api::{
        endpoints::{
            codes::{BarcodeInput, BarcodeType, GenerateBarcode},
            image::{CompressImage, ImageCompressInput},
            pdf::{MergePdf, PdfMergeInput, MIN_MERGE_FILES},
            units::{ConvertUnits, UnitConversionInput},
            video::{CompressVideo, VideoCompressInput},
            Quality,
        },
        tasks::OcrInput,
        ApiClient, ApiError, Endpoint, FileResponse, FileUpload, ProcessingResult, RawResponse,
    },
    config::{Config, ConfigError},
    mutation::{Mutation, MutationStatus},
    store::{PreferencesStore, StoreError},
    tracker::{next_update, TaskStatus, Tracker},
    utils::{download_filename, format_size},
};

#[derive(Parser, Debug)]
#[command(name = "taskplex", version, about = "File processing tools backed by a TaskPlex server")]
struct Cli {
    /// Server url, overrides config file and TASKPLEX_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress a JPEG/PNG/WebP image
    CompressImage {
        file: PathBuf,
        #[arg(long, default_value_t = Quality::Medium)]
        quality: Quality,
    },

    /// Compress a video file
    CompressVideo {
        file: PathBuf,
        #[arg(long, default_value_t = Quality::Medium)]
        quality: Quality,
    },

    /// Merge PDF documents in the given order
    MergePdf { files: Vec<PathBuf> },

    /// Generate a barcode image
    Barcode {
        data: String,
        #[arg(long = "type", default_value_t = BarcodeType::Code128)]
        barcode_type: BarcodeType,
        #[arg(long)]
        checksum: bool,
    },

    /// Convert a value between units
    ConvertUnits {
        #[arg(allow_negative_numbers = true)]
        value: f64,
        from: String,
        to: String,
    },

    /// Extract text from a scanned PDF, following the server task
    Ocr {
        file: PathBuf,
        #[arg(long, default_value = "eng")]
        language: String,
        /// Cancel once progress reaches this percentage
        #[arg(long)]
        cancel_after: Option<f64>,
    },

    /// Show or toggle favorite tools
    Favorite {
        tool: Option<String>,
        #[arg(long)]
        toggle_sidebar: bool,
        #[arg(long, conflicts_with_all = ["tool", "toggle_sidebar"])]
        clear: bool,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

type Result<T> = std::result::Result<T, CliError>;

const INCOMPLETE: &str = "input is incomplete";

#[async_std::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,taskplex_client=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::init().await?;
    if let Some(api_url) = cli.api_url {
        config = config.with_api_url(api_url);
    }

    let client = || ApiClient::from_config(&config);

    match cli.command {
        Command::CompressImage { file, quality } => {
            let input = ImageCompressInput {
                file: read_upload(file).await?,
                quality,
            };
            run_file_mutation::<CompressImage>(&client()?, input, INCOMPLETE).await
        }
        Command::CompressVideo { file, quality } => {
            let input = VideoCompressInput {
                file: read_upload(file).await?,
                quality,
            };
            run_file_mutation::<CompressVideo>(&client()?, input, INCOMPLETE).await
        }
        Command::MergePdf { files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for file in files {
                uploads.push(read_upload(file).await?);
            }
            let input = PdfMergeInput { files: uploads };
            let reason = format!("select at least {MIN_MERGE_FILES} files");
            run_file_mutation::<MergePdf>(&client()?, input, &reason).await
        }
        Command::Barcode {
            data,
            barcode_type,
            checksum,
        } => {
            let mut input = BarcodeInput::new(data);
            input.barcode_type = barcode_type;
            input.add_checksum = checksum.then_some(true);
            let reason = "barcode data must be 1 to 100 characters";
            run_file_mutation::<GenerateBarcode>(&client()?, input, reason).await
        }
        Command::ConvertUnits { value, from, to } => {
            let input = UnitConversionInput {
                value,
                from_unit: from,
                to_unit: to,
            };
            convert_units(&client()?, input).await
        }
        Command::Ocr {
            file,
            language,
            cancel_after,
        } => {
            let input = OcrInput::new(read_upload(file).await?, language);
            run_ocr(&client()?, input, cancel_after).await
        }
        Command::Favorite {
            tool,
            toggle_sidebar,
            clear,
        } => favorites(&config, tool, toggle_sidebar, clear),
    }
}

async fn read_upload(path: PathBuf) -> Result<FileUpload> {
    FileUpload::read(&path)
        .await
        .map_err(|source| CliError::Read { path, source })
}

fn not_ready(reason: &str) -> ExitCode {
    eprintln!("Cannot start: {reason}");
    ExitCode::from(2)
}

async fn run_file_mutation<E>(
    client: &ApiClient,
    input: E::Input,
    not_ready_reason: &str,
) -> Result<ExitCode>
where
    E: Endpoint + 'static,
    E::Input: Clone,
    E::Output: FileResponse + Clone,
{
    if !E::is_ready(&input) {
        return Ok(not_ready(not_ready_reason));
    }

    let mutation = Mutation::endpoint::<E>(client.clone());
    let handle = mutation.trigger(input).await;
    eprintln!("{}: {}", E::PATH, MutationStatus::Pending);
    handle.await;

    let state = mutation.snapshot().await;
    match (state.status, state.data, state.error) {
        (MutationStatus::Success, Some(data), _) => {
            print_result(client, &ProcessingResult::from_response(&data));
            Ok(ExitCode::SUCCESS)
        }
        (_, _, Some(error)) => {
            eprintln!("{}: {}", E::PATH, error.message());
            Ok(ExitCode::FAILURE)
        }
        (status, _, _) => {
            eprintln!("{}: ended as {status}", E::PATH);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_result(client: &ApiClient, result: &ProcessingResult) {
    if let Some(message) = &result.message {
        println!("{message}");
    }

    if let Some(download) = &result.download_url {
        match client.download_url(download) {
            Ok(url) => println!("Download: {url}"),
            Err(_) => println!("Download: {download}"),
        }

        if let Some(name) = result.filename.as_deref().or(download_filename(download)) {
            println!("File: {name}");
        }
    }

    if let (Some(original), Some(processed)) = (result.original_size, result.processed_size) {
        println!("Size: {} -> {}", format_size(original), format_size(processed));
    } else if let Some(processed) = result.processed_size {
        println!("Size: {}", format_size(processed));
    }

    if let Some(ratio) = result.compression_ratio {
        println!("Saved: {ratio:.1}%");
    }
}

async fn convert_units(client: &ApiClient, input: UnitConversionInput) -> Result<ExitCode> {
    if !ConvertUnits::is_ready(&input) {
        return Ok(not_ready("value and both units are required"));
    }

    let mutation = Mutation::endpoint::<ConvertUnits>(client.clone());
    match mutation.mutate(input).await {
        Ok(response) => {
            let value = response.converted_value.unwrap_or_default();
            let unit = response.converted_unit.unwrap_or_default();
            println!("{value} {unit}");
            if let Some(formula) = response.conversion_formula {
                println!("Formula: {formula}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_ocr(
    client: &ApiClient,
    input: OcrInput,
    cancel_after: Option<f64>,
) -> Result<ExitCode> {
    let tracker: Tracker<RawResponse> = Tracker::new();
    let mut updates = tracker.subscribe();

    let api = client.clone();
    let handle = tracker
        .start_task(move |signal| async move { api.ocr_task(input, signal).await })
        .await;

    while let Some(update) = next_update(&mut updates).await {
        let message = update.message.as_deref().unwrap_or_default();
        match update.progress.percent() {
            Some(percent) => eprintln!("[{percent:>5.1}%] {} {message}", update.status),
            None => eprintln!("[  ...  ] {} {message}", update.status),
        }

        if !update.status.is_active() {
            break;
        }

        if let (Some(limit), Some(percent)) = (cancel_after, update.progress.percent()) {
            if percent >= limit {
                tracker.cancel().await;
            }
        }
    }
    handle.await;

    let state = tracker.snapshot().await;
    match state.status {
        TaskStatus::Completed => {
            if let Some(result) = state.result {
                let result = ProcessingResult::from_response(&result);
                print_result(client, &result);
                if let Some(text) = result.extra.get("text").and_then(|t| t.as_str()) {
                    println!("{text}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        TaskStatus::Cancelled => {
            eprintln!("OCR cancelled");
            Ok(ExitCode::from(130))
        }
        _ => {
            let message = state
                .error
                .map(|e| e.message().to_string())
                .unwrap_or_else(|| format!("OCR ended as {}", state.status));
            eprintln!("{message}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn favorites(
    config: &Config,
    tool: Option<String>,
    toggle_sidebar: bool,
    clear: bool,
) -> Result<ExitCode> {
    let mut store = PreferencesStore::load(config.preferences_file());

    if clear {
        store.clear()?;
    }
    if let Some(tool) = tool {
        let added = store.toggle_favorite(&tool)?;
        println!("{tool} {}", if added { "added to favorites" } else { "removed from favorites" });
    }
    if toggle_sidebar {
        let collapsed = store.toggle_sidebar()?;
        println!("Sidebar {}", if collapsed { "collapsed" } else { "expanded" });
    }

    if store.favorites().is_empty() {
        println!("No favorites");
    } else {
        for favorite in store.favorites() {
            println!("* {favorite}");
        }
    }

    Ok(ExitCode::SUCCESS)
}
