//! Telegram CI Upload CLI - main entry point
//!
//! Build metadata comes from the environment, the files to upload from the
//! command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use telegram_ci_upload::{
    build_caption, upload, ApiCredentials, BuildContext, Error, UploadRequest,
};

#[derive(Parser)]
#[command(name = "telegram_ci_upload")]
#[command(about = "Upload CI build artifacts to a Telegram chat as one album", long_about = None)]
#[command(version)]
struct Cli {
    /// Files to upload, in album order
    files: Vec<PathBuf>,

    /// Validate configuration and print the caption without contacting Telegram
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// After a successful upload, write the session as a SESSION_STRING value to this file
    #[arg(long, value_name = "PATH")]
    save_session: Option<PathBuf>,
}

fn init_logging() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("telegram_ci_upload=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> telegram_ci_upload::Result<()> {
    println!("[+] Uploading to telegram");
    let ctx = BuildContext::from_env()?;
    let creds = ApiCredentials::load()?;

    println!("[+] Files: {:?}", cli.files);
    let caption = build_caption(&ctx);
    let request = UploadRequest::new(cli.files, &caption)?;

    println!("[+] Caption: ");
    println!("---");
    println!("{:?}", request.captions());
    println!("---");

    if cli.dry_run {
        println!("[+] Dry run, nothing sent");
        return Ok(());
    }

    upload(&ctx, &creds, &request, cli.save_session.as_deref()).await
}

fn report(err: &Error) {
    if err.is_config_error() {
        println!("[-] {}", err);
    } else {
        error!("upload failed: {}", err);
        println!("[-] An error occurred: {}", err);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env for local runs
    let _ = dotenvy::dotenv();

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}
