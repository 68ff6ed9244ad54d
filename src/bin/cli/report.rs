use std::{io::Write as _, path::Path};

use anyhow::bail;
use clap::CommandFactory as _;
use opptool::{
    tools::{
        self,
        opportunity_report::ReportLayout,
        summary::{self, CategoryField},
    },
    utils,
    year_range::YearRange,
};
use tracing::{info, warn};

use crate::{ApiArgs, CliArgs};

#[derive(clap::Args, Debug)]
pub struct Args {
    #[command(flatten)]
    api: ApiArgs,

    /// The first year to include. Opportunities are reported under the year
    /// they were approved or lost in, or the year they were created in if
    /// they are still open. Valid options are a four-digit year, "Current"
    /// (indicating the current year), "Previous" (indicating last year), or
    /// "Forever" (indicating the beginning of time).
    #[arg(long = "from", default_value = "Forever")]
    from_year: String,
    /// The last year to include. Takes the same options as `--from`, with
    /// "Forever" indicating the end of time.
    #[arg(long = "to", default_value = "Forever")]
    to_year: String,

    /// The format in which to print the output.
    #[arg(long, value_enum, default_value = "xlsx")]
    format: CliOutputFormat,

    /// Only valid with `--format xlsx`. Which set of sheets the workbook
    /// gets. Defaults to "summary".
    #[arg(long, value_enum)]
    layout: Option<CliReportLayout>,

    /// The directory to write the output to. With `--format xlsx` this
    /// defaults to the working directory. With the other formats, "-" or
    /// unspecified will write concatenated file contents to stdout.
    #[arg(short, long, default_value = None)]
    output: Option<String>,

    /// Compare the computed opportunity counts with the server's own
    /// summaries and warn about every difference.
    #[arg(long)]
    validate: bool,

    /// Only valid with `--format xlsx`. Open the workbook once it is written.
    #[arg(long)]
    open: bool,
}

#[derive(Debug, clap::ValueEnum, Clone, Copy, Eq, PartialEq)]
enum CliOutputFormat {
    /// Writes a timestamped Excel workbook into the output directory.
    Xlsx,
    /// Prints a set of human-readable .txt files into the output directory (or
    /// into stdout). Each file corresponds to one summary table.
    Human,
    /// Prints a set of CSV files into the output directory (or into stdout).
    /// There is one file for the opportunities and one per summary table.
    Csv,
}

#[derive(Debug, clap::ValueEnum, Clone, Copy, Eq, PartialEq)]
enum CliReportLayout {
    /// Raw data, division and lead type summaries, and key metrics.
    Summary,
    /// Raw data and summaries as native Excel tables for building pivot
    /// tables, plus instructions.
    Pivot,
}

impl From<CliReportLayout> for ReportLayout {
    fn from(layout: CliReportLayout) -> Self {
        match layout {
            CliReportLayout::Summary => ReportLayout::Summary,
            CliReportLayout::Pivot => ReportLayout::Pivot,
        }
    }
}

pub enum OutputSpec<'s> {
    /// Writes a workbook into a directory.
    Xlsx { output_dir: &'s Path, layout: ReportLayout, open: bool },
    /// Prints a human-readable report into a write stream.
    HumanIntoSingleFile(Box<dyn std::io::Write + Send>),
    /// Prints a human-readable report into a directory, with one file per
    /// table.
    HumanIntoDirectory(&'s Path),
    /// Prints CSV tables into a write stream.
    CsvIntoSingleFile(Box<dyn std::io::Write + Send>),
    /// Prints CSV tables into a directory, with one file per table.
    CsvIntoDirectory(&'s Path),
}

pub fn main(args: Args) -> anyhow::Result<()> {
    let Args { api, from_year, to_year, format, layout, output, validate, open } = args;

    // parse the output format
    if format != CliOutputFormat::Xlsx && (layout.is_some() || open) {
        let err = CliArgs::command().error(
            clap::error::ErrorKind::ArgumentConflict,
            "The `--layout` and `--open` options can only be used with `--format xlsx`",
        );
        bail!(err);
    }
    let output_spec = match format {
        CliOutputFormat::Xlsx => OutputSpec::Xlsx {
            output_dir: Path::new(output.as_deref().unwrap_or(".")),
            layout: layout.map_or(ReportLayout::Summary, ReportLayout::from),
            open,
        },
        CliOutputFormat::Human => match output.as_deref() {
            Some("-") | None => OutputSpec::HumanIntoSingleFile(Box::new(std::io::stdout())),
            Some(dir) => OutputSpec::HumanIntoDirectory(Path::new(dir)),
        },
        CliOutputFormat::Csv => match output.as_deref() {
            Some("-") | None => OutputSpec::CsvIntoSingleFile(Box::new(std::io::stdout())),
            Some(dir) => OutputSpec::CsvIntoDirectory(Path::new(dir)),
        },
    };

    // parse the year range
    let year_range = match YearRange::from_strs(&from_year, &to_year) {
        Ok(year_range) => year_range,
        Err(e) => {
            let err =
                CliArgs::command().error(clap::error::ErrorKind::ValueValidation, e.to_string());
            bail!(err);
        }
    };

    // fetch everything before anything gets written
    let client = api.client()?;
    let records = client.get_opportunity_detail()?;
    let server_summaries = if validate {
        Some((client.get_division_summary()?, client.get_lead_summary()?))
    } else {
        None
    };

    // do the processing
    let report = tools::opportunity_report::calculate_report(records, year_range);

    if let Some((division_rows, lead_rows)) = server_summaries {
        for (field, server_rows) in
            [(CategoryField::Division, division_rows), (CategoryField::LeadType, lead_rows)]
        {
            let server_rows: Vec<_> =
                server_rows.into_iter().filter(|row| year_range.contains(Some(row.year))).collect();
            let mismatches = summary::compare_with_server(report.summary(field), &server_rows);
            if mismatches.is_empty() {
                info!("{} summary matches the server", field.display_name());
            }
            for mismatch in mismatches {
                warn!("{} summary differs from the server: {}", field.display_name(), mismatch);
            }
        }
    }

    // output the results
    use tools::opportunity_report::output;
    match output_spec {
        OutputSpec::Xlsx { output_dir, layout, open } => {
            let path = output::xlsx::write_report(&report, layout, output_dir)?;
            println!("Report written to {}", path.display());
            if open {
                utils::open_file(&path);
            }
        }
        OutputSpec::HumanIntoSingleFile(mut writer) => {
            output::human::print_entire_report_to_writer(&report, &mut writer)?;
            writer.flush()?;
        }
        OutputSpec::HumanIntoDirectory(dir) => {
            output::human::print_entire_report_directory(&report, dir)?;
            println!("Report written to {}", dir.display());
        }
        OutputSpec::CsvIntoSingleFile(mut writer) => {
            output::csv::print_entire_report_to_writer(&report, &mut writer)?;
            writer.flush()?;
        }
        OutputSpec::CsvIntoDirectory(dir) => {
            output::csv::print_entire_report_directory(&report, dir)?;
            println!("Report written to {}", dir.display());
        }
    }

    Ok(())
}
