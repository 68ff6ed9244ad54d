use std::io::Write as _;

use opptool::apis::opportunity_api;
use tracing::info;

use crate::ApiArgs;

#[derive(clap::Args, Debug)]
pub struct Args {
    #[command(flatten)]
    api: ApiArgs,

    /// The endpoint to fetch.
    #[arg(value_enum, default_value = "opportunity-detail")]
    endpoint: Endpoint,
}

#[derive(Debug, clap::ValueEnum, Clone, Copy, Eq, PartialEq)]
enum Endpoint {
    /// Every opportunity with its stage, dates and amounts.
    OpportunityDetail,
    /// The server's own opportunity counts per year and division.
    DivisionSummary,
    /// The server's own opportunity counts per year and lead type.
    LeadSummary,
}

impl Endpoint {
    fn path(&self) -> &'static str {
        match self {
            Endpoint::OpportunityDetail => opportunity_api::ENDPOINT_OPPORTUNITY_DETAIL,
            Endpoint::DivisionSummary => opportunity_api::ENDPOINT_DIVISION_SUMMARY,
            Endpoint::LeadSummary => opportunity_api::ENDPOINT_LEAD_SUMMARY,
        }
    }
}

pub fn main(args: Args) -> anyhow::Result<()> {
    let Args { api, endpoint } = args;

    let client = api.client()?;
    let rows = client.fetch_data(endpoint.path())?;
    info!("fetched {} rows from {}", rows.len(), endpoint.path());

    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &rows)?;
    writeln!(out)?;
    Ok(())
}
