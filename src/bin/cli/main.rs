use std::time::Duration;

use clap::Parser;
use opptool::apis::opportunity_api::{self, ApiClient, FetchError};
use tracing::error;

mod fetch;
mod report;

#[derive(Parser, Debug)]
struct CliArgs {
    /// The command to perform.
    #[command(subcommand)]
    command: Subcommand,
}

fn main() {
    // set up tracing
    tracing_subscriber::fmt::init();

    let CliArgs { command } = CliArgs::parse();

    let result = match command {
        Subcommand::Report(report_args) => report::main(report_args),
        Subcommand::Fetch(fetch_args) => fetch::main(fetch_args),
    };
    if let Err(err) = result {
        if let Some(cli_err) = err.downcast_ref::<clap::Error>() {
            cli_err.exit();
        } else {
            error!("error during execution: {:#}", err);
            std::process::exit(1);
        }
    }
}

#[derive(clap::Subcommand, Debug)]
pub enum Subcommand {
    /// Generate an opportunity report with yearly summaries by division and
    /// lead type.
    Report(report::Args),
    /// Fetch one endpoint of the opportunity API and print its rows as JSON.
    Fetch(fetch::Args),
}

/// How to reach the opportunity API.
#[derive(clap::Args, Debug)]
pub struct ApiArgs {
    /// The base URL of the opportunity API.
    #[arg(long, env = "OPPTOOL_BASE_URL", default_value = opportunity_api::DEFAULT_BASE_URL)]
    base_url: String,

    /// The timeout of each HTTP request, in seconds. Without it, requests use
    /// the HTTP client's default.
    #[arg(long, env = "OPPTOOL_TIMEOUT")]
    timeout: Option<u64>,
}

impl ApiArgs {
    pub fn client(&self) -> Result<ApiClient, FetchError> {
        ApiClient::new(&self.base_url, self.timeout.map(Duration::from_secs))
    }
}
