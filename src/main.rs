use clap::Parser;
use cli::{Args, Command};
use config::Config;
use metadata::Pipeline;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod config;
mod metadata;
mod scrape;
#[cfg(test)]
mod tests;
mod web;

fn init_logging() {
    // stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cmeta=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let args = Args::parse();
    let mut config = Config::load()?;

    match args.command {
        Command::Meta {
            url,
            report,
            strict,
            timeout_ms,
            no_cache,
            no_logo_service,
        } => {
            if strict {
                config.strict_validation = true;
            }
            if let Some(timeout_ms) = timeout_ms {
                config.request_timeout_ms = timeout_ms;
            }
            if no_cache {
                config.cache.enabled = false;
            }
            if no_logo_service {
                config.logo_service_base_url.clear();
            }
            config.validate()?;

            run_meta(&config, &url, report)
        }
        Command::Daemon { listen } => web::start_daemon(config, listen),
        Command::Config => {
            print!("{}", serde_yml::to_string(&config)?);
            Ok(())
        }
    }
}

fn run_meta(config: &Config, url: &str, with_report: bool) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let pipeline = Pipeline::new(config)?;

        let cancel = CancellationToken::new();
        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_ctrl_c.cancel();
            }
        });

        let (metadata, report) = pipeline
            .fetch_company_metadata_with_report(url, &cancel)
            .await?;

        if metadata.is_empty() {
            log::warn!("nothing found for {url}, details have to be entered manually");
        }

        let output = if with_report {
            json!({ "metadata": metadata, "report": report })
        } else {
            serde_json::to_value(&metadata)?
        };
        println!("{}", serde_json::to_string_pretty(&output)?);

        Ok(())
    })
}
