use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch title, description and a validated logo for a company url
    Meta {
        /// a url, scheme is optional (e.g. notion.so)
        url: String,

        /// Print the probe report next to the result
        #[clap(long, default_value = "false")]
        report: bool,

        /// Only accept logo service answers with an image content type
        #[clap(long, default_value = "false")]
        strict: bool,

        /// Per-request timeout in milliseconds
        #[clap(long)]
        timeout_ms: Option<u64>,

        /// Don't read or write the result cache
        #[clap(long, default_value = "false")]
        no_cache: bool,

        /// Don't ask the external logo service
        #[clap(long, default_value = "false")]
        no_logo_service: bool,
    },

    /// Serve /api/scrape-company-info over http
    Daemon {
        /// Address to listen on, overrides `listen` from config
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// Print the effective configuration
    Config,
}
