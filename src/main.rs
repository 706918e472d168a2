use chrono::Local;
use clap::Parser;
use dotenv::dotenv;
use reach_combine::basin::DirectoryProbe;
use reach_combine::config::{CombineConfig, DEFAULT_CONT_FILE, UPLOAD_PREFIX_FORMAT};
use reach_combine::pipeline;
use reach_combine::upload::ObjectStoreLike;
use reach_combine::CombineError;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "combine_data")]
#[command(about = "Combine continent-level JSON files into global files", long_about = None)]
struct Cli {
    /// Directory that holds the continent-level JSON fragments
    #[arg(short = 'd', long)]
    datadir: PathBuf,
    /// Name of the continent manifest file
    #[arg(short = 'c', long, default_value = DEFAULT_CONT_FILE)]
    contfile: String,
    /// SWORD data version (e.g. 16 or v16)
    #[arg(short = 's', long = "sword_version", visible_alias = "sword-version")]
    sword_version: String,
    /// Delete continent-level fragments after the global files are written
    #[arg(short = 'x', long)]
    delete: bool,
    /// Combine the expanded reaches-of-interest sets only
    #[arg(short = 'e', long)]
    expanded: bool,
    /// S3 bucket to upload the global files to
    #[arg(short = 'u', long)]
    uploadbucket: Option<String>,
    /// Key prefix for the dated copy (defaults to the run start time)
    #[arg(long)]
    upload_prefix: Option<String>,
}

#[cfg(feature = "upload")]
fn open_store(config: &CombineConfig) -> Result<Option<Box<dyn ObjectStoreLike>>, CombineError> {
    use reach_combine::upload::{S3Store, S3StoreConfig};

    match &config.upload {
        Some(target) => {
            let store = S3Store::new(S3StoreConfig::from_env(&target.bucket))?;
            Ok(Some(Box::new(store)))
        }
        None => Ok(None),
    }
}

#[cfg(not(feature = "upload"))]
fn open_store(config: &CombineConfig) -> Result<Option<Box<dyn ObjectStoreLike>>, CombineError> {
    match &config.upload {
        Some(target) => Err(CombineError::Config(format!(
            "upload to {} requested but combine_data was built without the `upload` feature",
            target.bucket
        ))),
        None => Ok(None),
    }
}

fn combine(cli: Cli) -> Result<(), CombineError> {
    let mut config = CombineConfig::new(cli.datadir, &cli.sword_version)?
        .with_cont_file(&cli.contfile)?
        .expanded(cli.expanded)
        .delete(cli.delete);
    if let Some(bucket) = &cli.uploadbucket {
        let prefix = cli
            .upload_prefix
            .unwrap_or_else(|| Local::now().format(UPLOAD_PREFIX_FORMAT).to_string());
        config = config.upload_to(bucket, Some(prefix));
    }

    let probe = DirectoryProbe::new(&config.data_dir);
    let store = open_store(&config)?;
    let report = pipeline::run(&config, &probe, store.as_deref())?;

    info!(
        continents = report.continents.len(),
        written = report.written.len(),
        uploaded = report.uploaded,
        deleted = report.deleted,
        "Combine complete"
    );
    Ok(())
}

fn main() {
    dotenv().ok();
    reach_combine::init_tracing("combine_data");
    let cli = Cli::parse();

    if let Err(e) = combine(cli) {
        error!("Error encountered.");
        error!(error = %e, "{}", e);
        error!("System exiting.");
        std::process::exit(1);
    }
}
