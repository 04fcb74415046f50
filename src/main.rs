mod cli;

use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command};
use slicer_handoff::api::{HttpDownloadHost, ProcessChannel, TriggerRequest};
use slicer_handoff::config::{self, HandoffConfig};
use slicer_handoff::{logging, resolve, DownloadDriver, NativeHandoffClient, Pipeline};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if logging::init_logging(cli.verbose).is_err() {
        logging::init_logging_stderr(cli.verbose);
    }

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::config_path()?,
    };
    let cfg = config::load_or_init_at(&config_path)?;

    match cli.command {
        Command::Open { href } => {
            let pipeline = build_pipeline(&cfg)?;
            let response = pipeline
                .handle(TriggerRequest::DownloadAndOpen { url: href })
                .await;
            println!("{}", serde_json::to_string(&response)?);
            Ok(exit_code(response.success))
        }
        Command::Resolve { href } => match resolve(&href) {
            Ok(url) => {
                println!("{url}");
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("{e}");
                Ok(ExitCode::FAILURE)
            }
        },
        Command::Ping => {
            let pipeline = build_pipeline(&cfg)?;
            let client = pipeline.handoff_client();
            match client.ping().await {
                Ok(()) => {
                    println!("{} is answering", client.host_name());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{}: {e}", client.host_name());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Config => {
            println!("# {}", config_path.display());
            print!("{}", toml::to_string_pretty(&cfg)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Trigger => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("reading trigger message")?;
            let request: TriggerRequest =
                serde_json::from_str(&input).context("parsing trigger message")?;

            let pipeline = build_pipeline(&cfg)?;
            let response = pipeline.handle(request).await;
            println!("{}", serde_json::to_string(&response)?);
            Ok(exit_code(response.success))
        }
    }
}

fn build_pipeline(cfg: &HandoffConfig) -> Result<Pipeline<HttpDownloadHost, ProcessChannel>> {
    let home = config::home_dir()?;

    let host = Arc::new(HttpDownloadHost::new(cfg.download_dir_in(&home)));
    let driver = DownloadDriver::new(host).with_timeout(cfg.download_timeout());

    let channel = match &cfg.host_command {
        Some(program) => ProcessChannel::from_command(program, cfg.host_args.clone()),
        None => ProcessChannel::from_manifests(cfg.manifest_search_dirs(&home)),
    };
    let client = NativeHandoffClient::new(Arc::new(channel), cfg.host_name.clone());

    Ok(Pipeline::new(driver, client))
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
