use tracing::info;

use crate::{
    opportunities::{self, OpportunityRecord, PreparedOpportunity},
    tools::{
        key_metrics::{self, KeyMetrics},
        summary::{self, CategoryField, SummaryRow},
    },
    year_range::YearRange,
};
use csv as csv_crate;

pub struct ReportData {
    /// Every opportunity inside the year range, in the order received.
    pub opportunities: Vec<PreparedOpportunity>,
    pub division_summary: Vec<SummaryRow>,
    pub lead_summary: Vec<SummaryRow>,
    /// Derived from the division summary. `None` if there are no summary rows.
    pub key_metrics: Option<KeyMetrics>,
    /// How many of the received opportunities had no reporting year.
    pub yearless_count: usize,
}

impl ReportData {
    pub fn summary(&self, field: CategoryField) -> &[SummaryRow] {
        match field {
            CategoryField::Division => &self.division_summary,
            CategoryField::LeadType => &self.lead_summary,
        }
    }
}

/// Which set of sheets the workbook gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLayout {
    /// Raw data, one styled summary sheet per category and the key metrics.
    Summary,
    /// Raw data as a native table for building pivots by hand, the computed
    /// summaries as native tables and instructions for the end user.
    Pivot,
}

impl ReportLayout {
    pub fn report_name(&self) -> &'static str {
        match self {
            ReportLayout::Summary => "Opportunity_Real_Pivots",
            ReportLayout::Pivot => "Opportunity_Pivot",
        }
    }
}

pub fn calculate_report(
    records: impl IntoIterator<Item = OpportunityRecord>,
    year_range: YearRange,
) -> ReportData {
    info!("Processing opportunities reported in {}", year_range.describe());

    let opportunities::PreparedOpportunities { opportunities, yearless_count } =
        opportunities::prepare_opportunities(records);
    let opportunities: Vec<_> =
        opportunities.into_iter().filter(|opp| year_range.contains(opp.year)).collect();

    let division_summary = summary::summarize(&opportunities, CategoryField::Division);
    let lead_summary = summary::summarize(&opportunities, CategoryField::LeadType);
    let key_metrics = key_metrics::calculate_key_metrics(&division_summary);
    info!(
        "{} opportunities in range, {} division rows, {} lead type rows",
        opportunities.len(),
        division_summary.len(),
        lead_summary.len()
    );

    ReportData { opportunities, division_summary, lead_summary, key_metrics, yearless_count }
}

pub mod output {
    use std::{
        fs::File,
        io::{BufWriter, Write},
        path::Path,
    };

    use crate::tools::{
        key_metrics::{KeyMetrics, MetricValue},
        summary::{CategoryField, SummaryRow},
    };

    use super::{csv_crate, ReportData};

    pub mod xlsx {
        use std::path::{Path, PathBuf};

        use crate::{
            opportunities::PreparedOpportunity,
            tools::{
                key_metrics::{KeyMetrics, MetricValue},
                summary::{CategoryField, SummaryRow},
            },
            workbook::{
                self,
                spreadsheet::{
                    Block, Cell, CellStyle, CellValue, ColumnWidths, GridCoordinate, HeaderStyle,
                    Sheet, Spreadsheet, Table, TableStyle, TotalRowMarker, COLOR_HEADER_BLUE,
                    COLOR_TOTAL_GRAY, COLOR_WHITE,
                },
                WorkbookError,
            },
        };

        use super::super::{ReportData, ReportLayout};

        const DATA_HEADERS: [&str; 15] = [
            "Id",
            "Name",
            "Amount",
            "StageName",
            "Created_Date",
            "LastStageChangeDate",
            "Division",
            "LeadType",
            "Year",
            "IsApproved",
            "IsLost",
            "IsOpen",
            "ApprovedAmount",
            "LostAmount",
            "OpenAmount",
        ];
        const DATA_CURRENCY_COLUMNS: [usize; 4] = [2, 12, 13, 14];

        const KEY_METRICS_TITLE: &str = "KEY PERFORMANCE INDICATORS";

        const INSTRUCTIONS: [&str; 26] = [
            "HOW TO BUILD PIVOT TABLES WITH DRILL-THROUGH:",
            "",
            "1. Open this file in Microsoft Excel",
            "2. Go to the \"Data\" sheet, which holds every opportunity",
            "3. Click anywhere inside the OpportunityData table",
            "4. Go to Insert > PivotTable",
            "5. Set up the fields as follows:",
            "",
            "FOR A DIVISION PIVOT:",
            "   - Rows: Year, Division",
            "   - Values: Count of Id, Sum of Amount (per stage)",
            "   - Filters: StageName",
            "",
            "FOR A LEAD PIVOT:",
            "   - Rows: Year, LeadType",
            "   - Values: Count of Id, Sum of Amount (per stage)",
            "   - Filters: StageName",
            "",
            "DRILL-THROUGH:",
            "   - Double-click any value in the pivot table",
            "   - Excel lists the opportunities behind that value on a new sheet",
            "",
            "ADVANTAGES:",
            "   - Refreshable with \"Refresh All\"",
            "   - Native Excel drill-through",
            "   - Dynamic filters and flexible grouping",
        ];

        const PIVOT_NOTES: [&str; 3] = [
            "NOTE: The rows above are precomputed. For the detail behind any value, build a \
             pivot table from the Data sheet and double-click the value.",
            "Total Revenue is approved revenue. Close Rate % counts approved opportunities \
             against all of them; Close Rate % (No Lost) leaves lost ones out.",
            "Drill-through requires opening the file in Microsoft Excel.",
        ];

        /// Writes the report into `output_dir` and returns the path of the
        /// new workbook.
        pub fn write_report(
            data: &ReportData,
            layout: ReportLayout,
            output_dir: &Path,
        ) -> Result<PathBuf, WorkbookError> {
            workbook::write_report(&build_spreadsheet(data, layout), layout.report_name(), output_dir)
        }

        pub fn build_spreadsheet(data: &ReportData, layout: ReportLayout) -> Spreadsheet {
            let sheets = match layout {
                ReportLayout::Summary => vec![
                    data_sheet("Raw_Data", &data.opportunities, None),
                    summary_sheet("Division_Summary", CategoryField::Division, data),
                    summary_sheet("Lead_Summary", CategoryField::LeadType, data),
                    key_metrics_sheet(data.key_metrics.as_ref()),
                ],
                ReportLayout::Pivot => vec![
                    data_sheet("Data", &data.opportunities, Some("OpportunityData")),
                    pivot_sheet("Division Pivot", "DivisionPivot", CategoryField::Division, data),
                    pivot_sheet("Lead Pivot", "LeadPivot", CategoryField::LeadType, data),
                    instructions_sheet(),
                ],
            };
            Spreadsheet { sheets }
        }

        fn data_sheet(
            title: &str,
            opportunities: &[PreparedOpportunity],
            native_table_name: Option<&str>,
        ) -> Sheet {
            let style = TableStyle {
                currency_columns: DATA_CURRENCY_COLUMNS.to_vec(),
                native_table_name: native_table_name.map(str::to_owned),
                autofilter: true,
                ..Default::default()
            };
            let mut table = Table::new(DATA_HEADERS, style);
            for opp in opportunities {
                let record = &opp.record;
                let flag = |b: bool| CellValue::Number(if b { 1.0 } else { 0.0 });
                table.push_row(vec![
                    CellValue::text(&record.id),
                    CellValue::optional_text(record.name.as_deref()),
                    CellValue::optional_number(record.amount),
                    CellValue::text(record.stage.as_str()),
                    CellValue::optional_datetime(record.created_date),
                    CellValue::optional_datetime(record.last_stage_change_date),
                    CellValue::optional_text(record.division.as_deref()),
                    CellValue::optional_text(record.lead_type.as_deref()),
                    CellValue::optional_number(opp.year.map(f64::from)),
                    flag(opp.is_approved),
                    flag(opp.is_lost),
                    flag(opp.is_open),
                    CellValue::Number(opp.approved_amount),
                    CellValue::Number(opp.lost_amount),
                    CellValue::Number(opp.open_amount),
                ]);
            }
            Sheet::new(title).with_block(Block::Table { origin: GridCoordinate::ORIGIN, table })
        }

        const TOTAL_ROW_MARKER: TotalRowMarker = TotalRowMarker { background: COLOR_TOTAL_GRAY };

        fn push_summary_row(table: &mut Table, row: &SummaryRow, cells: Vec<CellValue>) {
            if row.category.is_total() {
                table.push_total_row(cells);
            } else {
                table.push_row(cells);
            }
        }

        fn summary_sheet(title: &str, field: CategoryField, data: &ReportData) -> Sheet {
            let headers = [
                "Year",
                field.column_name(),
                "Total_Opp",
                "Approved",
                "Lost",
                "Open",
                "Approved_Revenue",
                "Lost_Revenue",
                "Open_Revenue",
                "Total_Amount",
                "CloseRate_Std",
                "CloseRate_NoLost",
                "Average_Ticket",
            ];
            let style = TableStyle {
                header_style: HeaderStyle::Banner {
                    background: COLOR_HEADER_BLUE,
                    font: COLOR_WHITE,
                },
                currency_columns: vec![6, 7, 8, 9, 12],
                percent_columns: vec![10, 11],
                total_row_marker: Some(TOTAL_ROW_MARKER),
                native_table_name: None,
                autofilter: true,
            };
            let mut table = Table::new(headers, style);
            for row in data.summary(field) {
                let counts = &row.counts;
                push_summary_row(&mut table, row, vec![
                    CellValue::Number(f64::from(row.year)),
                    CellValue::text(row.category.as_str()),
                    CellValue::Number(counts.total_opp as f64),
                    CellValue::Number(counts.approved as f64),
                    CellValue::Number(counts.lost as f64),
                    CellValue::Number(counts.open as f64),
                    CellValue::Number(counts.approved_revenue),
                    CellValue::Number(counts.lost_revenue),
                    CellValue::Number(counts.open_revenue),
                    CellValue::Number(counts.total_amount),
                    CellValue::optional_number(row.close_rate_std),
                    CellValue::optional_number(row.close_rate_no_lost),
                    CellValue::Number(row.average_ticket),
                ]);
            }
            Sheet::new(title).with_block(Block::Table { origin: GridCoordinate::ORIGIN, table })
        }

        fn pivot_sheet(
            title: &str,
            table_name: &str,
            field: CategoryField,
            data: &ReportData,
        ) -> Sheet {
            let headers = [
                "Year",
                field.display_name(),
                "Total Opportunities",
                "Approved",
                "Lost",
                "Open",
                "Total Revenue",
                "Close Rate %",
                "Close Rate % (No Lost)",
                "Average Ticket",
                "Lost Revenue",
                "Open Revenue",
                "Total Amount",
            ];
            let style = TableStyle {
                currency_columns: vec![6, 9, 10, 11, 12],
                percent_columns: vec![7, 8],
                total_row_marker: Some(TOTAL_ROW_MARKER),
                native_table_name: Some(table_name.to_owned()),
                ..Default::default()
            };
            let rows = data.summary(field);
            let mut table = Table::new(headers, style);
            for row in rows {
                let counts = &row.counts;
                push_summary_row(&mut table, row, vec![
                    CellValue::Number(f64::from(row.year)),
                    CellValue::text(row.category.as_str()),
                    CellValue::Number(counts.total_opp as f64),
                    CellValue::Number(counts.approved as f64),
                    CellValue::Number(counts.lost as f64),
                    CellValue::Number(counts.open as f64),
                    CellValue::Number(counts.approved_revenue),
                    CellValue::optional_number(row.close_rate_std),
                    CellValue::optional_number(row.close_rate_no_lost),
                    CellValue::Number(row.average_ticket),
                    CellValue::Number(counts.lost_revenue),
                    CellValue::Number(counts.open_revenue),
                    CellValue::Number(counts.total_amount),
                ]);
            }

            // leave a blank row below the table, which always has at least one row
            let notes_row = 1 + rows.len().max(1) as u32 + 1;
            Sheet::new(title)
                .with_block(Block::Table { origin: GridCoordinate::ORIGIN, table })
                .with_block(Block::Cells {
                    origin: GridCoordinate::new(notes_row, 0),
                    rows: PIVOT_NOTES.iter().map(|note| vec![Cell::text(*note)]).collect(),
                })
        }

        fn metric_cell(value: MetricValue) -> Cell {
            match value {
                MetricValue::Count(n) => Cell::new(CellValue::Number(n as f64), CellStyle::Count),
                MetricValue::Currency(amount) => {
                    Cell::new(CellValue::Number(amount), CellStyle::Currency)
                }
                MetricValue::Percent(p) => {
                    Cell::new(CellValue::optional_number(p), CellStyle::Percent)
                }
            }
        }

        fn metric_rows(heading: String, metrics: Vec<(&'static str, MetricValue)>) -> Vec<Vec<Cell>> {
            let mut rows = vec![vec![Cell::bold(heading)]];
            rows.extend(
                metrics.into_iter().map(|(label, value)| vec![Cell::text(label), metric_cell(value)]),
            );
            rows
        }

        fn key_metrics_sheet(metrics: Option<&KeyMetrics>) -> Sheet {
            let sheet = Sheet::new("Key_Metrics")
                .with_block(Block::Cells {
                    origin: GridCoordinate::ORIGIN,
                    rows: vec![vec![Cell::title(KEY_METRICS_TITLE, 16.0)]],
                })
                .with_column_widths(ColumnWidths::Fixed(vec![
                    (0, 20.0),
                    (1, 15.0),
                    (3, 20.0),
                    (4, 15.0),
                ]));

            let Some(metrics) = metrics else {
                return sheet.with_block(Block::Cells {
                    origin: GridCoordinate::new(2, 0),
                    rows: vec![vec![Cell::text("No data")]],
                });
            };

            let sheet = sheet.with_block(Block::Cells {
                origin: GridCoordinate::new(2, 0),
                rows: metric_rows(
                    format!("Year {} Performance", metrics.current_year),
                    metrics.performance(),
                ),
            });
            match &metrics.year_over_year {
                Some(yoy) => sheet.with_block(Block::Cells {
                    origin: GridCoordinate::new(2, 3),
                    rows: metric_rows(
                        format!("Year-over-Year Comparison (vs {})", yoy.previous_year),
                        yoy.comparisons(),
                    ),
                }),
                None => sheet,
            }
        }

        fn instructions_sheet() -> Sheet {
            Sheet::new("Instructions")
                .with_block(Block::Cells {
                    origin: GridCoordinate::ORIGIN,
                    rows: INSTRUCTIONS.iter().map(|line| vec![Cell::text(*line)]).collect(),
                })
                .with_column_widths(ColumnWidths::Fixed(vec![(0, 80.0)]))
        }
    }

    pub mod human {
        use super::*;

        pub fn print_opportunity_count<W>(data: &ReportData, out: &mut W) -> std::io::Result<()>
        where
            W: Write,
        {
            writeln!(
                out,
                "Opportunities: {} in range | {} received without a year",
                data.opportunities.len(),
                data.yearless_count
            )
        }

        pub fn print_summary<W>(
            field: CategoryField,
            rows: &[SummaryRow],
            out: &mut W,
        ) -> std::io::Result<()>
        where
            W: Write,
        {
            writeln!(out, "{} Summary: ================", field.display_name())?;
            writeln!(
                out,
                "{:<6} {:<24} {:>6} {:>8} {:>6} {:>6} {:>14} {:>14} {:>14} {:>10} {:>10} {:>12}",
                "Year",
                field.display_name(),
                "Total",
                "Approved",
                "Lost",
                "Open",
                "Approved Rev",
                "Lost Rev",
                "Open Rev",
                "Close Std",
                "Close NL",
                "Avg Ticket",
            )?;
            for row in rows {
                let counts = &row.counts;
                writeln!(
                    out,
                    "{:<6} {:<24} {:>6} {:>8} {:>6} {:>6} {:>14} {:>14} {:>14} {:>10} {:>10} {:>12}",
                    row.year,
                    row.category.as_str(),
                    counts.total_opp,
                    counts.approved,
                    counts.lost,
                    counts.open,
                    format_currency(counts.approved_revenue),
                    format_currency(counts.lost_revenue),
                    format_currency(counts.open_revenue),
                    percent_or_na(row.close_rate_std),
                    percent_or_na(row.close_rate_no_lost),
                    format_currency(row.average_ticket),
                )?;
            }
            Ok(())
        }

        pub fn print_key_metrics<W>(metrics: Option<&KeyMetrics>, out: &mut W) -> std::io::Result<()>
        where
            W: Write,
        {
            writeln!(out, "Key Performance Indicators: ================")?;
            let Some(metrics) = metrics else {
                writeln!(out, "No data")?;
                return Ok(());
            };
            writeln!(out, "Year {} Performance", metrics.current_year)?;
            for (label, value) in metrics.performance() {
                writeln!(out, "    {:24} {:>14}", label, format_metric(value))?;
            }
            if let Some(yoy) = &metrics.year_over_year {
                writeln!(out, "Year-over-Year Comparison (vs {})", yoy.previous_year)?;
                for (label, value) in yoy.comparisons() {
                    writeln!(out, "    {:24} {:>14}", label, format_metric(value))?;
                }
            }
            Ok(())
        }

        fn format_metric(value: MetricValue) -> String {
            match value {
                MetricValue::Count(n) => n.to_string(),
                MetricValue::Currency(amount) => format_currency(amount),
                MetricValue::Percent(p) => percent_or_na(p),
            }
        }

        pub fn print_entire_report_directory(
            data: &ReportData,
            output_dir: &Path,
        ) -> std::io::Result<()> {
            super::print_entire_report_directory(
                data,
                output_dir,
                "txt",
                print_opportunity_count,
                print_summary,
                print_key_metrics,
            )
        }

        pub fn print_entire_report_to_writer<W>(data: &ReportData, out: W) -> std::io::Result<()>
        where
            W: Write,
        {
            super::print_entire_report_to_writer(
                data,
                out,
                print_opportunity_count,
                print_summary,
                print_key_metrics,
            )
        }
    }

    pub mod csv {
        use super::*;

        pub fn print_opportunities<W>(data: &ReportData, out: &mut W) -> std::io::Result<()>
        where
            W: Write,
        {
            let mut writer = csv_crate::Writer::from_writer(out);
            writer.write_record([
                "Id",
                "Name",
                "Amount",
                "StageName",
                "Created_Date",
                "LastStageChangeDate",
                "Division",
                "LeadType",
                "Year",
                "IsApproved",
                "IsLost",
                "IsOpen",
                "ApprovedAmount",
                "LostAmount",
                "OpenAmount",
            ])?;
            for opp in &data.opportunities {
                let record = &opp.record;
                let flag = |b: bool| if b { "1" } else { "0" }.to_owned();
                writer.write_record([
                    record.id.clone(),
                    record.name.clone().unwrap_or_default(),
                    optional(record.amount),
                    record.stage.to_string(),
                    optional(record.created_date),
                    optional(record.last_stage_change_date),
                    record.division.clone().unwrap_or_default(),
                    record.lead_type.clone().unwrap_or_default(),
                    optional(opp.year),
                    flag(opp.is_approved),
                    flag(opp.is_lost),
                    flag(opp.is_open),
                    opp.approved_amount.to_string(),
                    opp.lost_amount.to_string(),
                    opp.open_amount.to_string(),
                ])?;
            }
            writer.flush()?;
            Ok(())
        }

        pub fn print_summary<W>(
            field: CategoryField,
            rows: &[SummaryRow],
            out: &mut W,
        ) -> std::io::Result<()>
        where
            W: Write,
        {
            let mut writer = csv_crate::Writer::from_writer(out);
            writer.write_record([
                "Year",
                field.column_name(),
                "Total_Opp",
                "Approved",
                "Lost",
                "Open",
                "Approved_Revenue",
                "Lost_Revenue",
                "Open_Revenue",
                "Total_Amount",
                "CloseRate_Std",
                "CloseRate_NoLost",
                "Average_Ticket",
            ])?;
            for row in rows {
                let counts = &row.counts;
                writer.write_record([
                    row.year.to_string(),
                    row.category.to_string(),
                    counts.total_opp.to_string(),
                    counts.approved.to_string(),
                    counts.lost.to_string(),
                    counts.open.to_string(),
                    counts.approved_revenue.to_string(),
                    counts.lost_revenue.to_string(),
                    counts.open_revenue.to_string(),
                    counts.total_amount.to_string(),
                    optional(row.close_rate_std),
                    optional(row.close_rate_no_lost),
                    row.average_ticket.to_string(),
                ])?;
            }
            writer.flush()?;
            Ok(())
        }

        pub fn print_key_metrics<W>(metrics: Option<&KeyMetrics>, out: &mut W) -> std::io::Result<()>
        where
            W: Write,
        {
            let mut writer = csv_crate::Writer::from_writer(out);
            writer.write_record(["Year", "Metric", "Value"])?;
            if let Some(metrics) = metrics {
                let mut entries: Vec<_> = metrics
                    .performance()
                    .into_iter()
                    .map(|(label, value)| (metrics.current_year, label, value))
                    .collect();
                if let Some(yoy) = &metrics.year_over_year {
                    entries.extend(
                        yoy.comparisons()
                            .into_iter()
                            .map(|(label, value)| (metrics.current_year, label, value)),
                    );
                }
                for (year, label, value) in entries {
                    let value = match value {
                        MetricValue::Count(n) => n.to_string(),
                        MetricValue::Currency(amount) => amount.to_string(),
                        MetricValue::Percent(p) => optional(p),
                    };
                    writer.write_record([year.to_string(), label.to_owned(), value])?;
                }
            }
            writer.flush()?;
            Ok(())
        }

        fn optional<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        pub fn print_entire_report_directory(
            data: &ReportData,
            output_dir: &Path,
        ) -> std::io::Result<()> {
            super::print_entire_report_directory(
                data,
                output_dir,
                "csv",
                print_opportunities,
                print_summary,
                print_key_metrics,
            )
        }

        pub fn print_entire_report_to_writer<W>(data: &ReportData, out: W) -> std::io::Result<()>
        where
            W: Write,
        {
            super::print_entire_report_to_writer(
                data,
                out,
                print_opportunities,
                print_summary,
                print_key_metrics,
            )
        }
    }

    fn print_entire_report_directory<F0, F1, F2>(
        data: &ReportData,
        output_dir: &Path,
        extension: &str,
        print_opportunities: F0,
        print_summary: F1,
        print_key_metrics: F2,
    ) -> std::io::Result<()>
    where
        F0: Fn(&ReportData, &mut BufWriter<File>) -> std::io::Result<()>,
        F1: Fn(CategoryField, &[SummaryRow], &mut BufWriter<File>) -> std::io::Result<()>,
        F2: Fn(Option<&KeyMetrics>, &mut BufWriter<File>) -> std::io::Result<()>,
    {
        // make sure that the output directory exists
        std::fs::create_dir_all(output_dir)?;
        let create = |name: &str| -> std::io::Result<BufWriter<File>> {
            Ok(BufWriter::new(File::create(output_dir.join(format!("{name}.{extension}")))?))
        };

        let mut out_file = create("opportunities")?;
        print_opportunities(data, &mut out_file)?;
        out_file.flush()?;

        for (name, field) in
            [("division-summary", CategoryField::Division), ("lead-summary", CategoryField::LeadType)]
        {
            let mut out_file = create(name)?;
            print_summary(field, data.summary(field), &mut out_file)?;
            out_file.flush()?;
        }

        let mut out_file = create("key-metrics")?;
        print_key_metrics(data.key_metrics.as_ref(), &mut out_file)?;
        out_file.flush()?;

        Ok(())
    }

    fn print_entire_report_to_writer<W, F0, F1, F2>(
        data: &ReportData,
        mut out: W,
        print_opportunities: F0,
        print_summary: F1,
        print_key_metrics: F2,
    ) -> std::io::Result<()>
    where
        W: Write,
        F0: Fn(&ReportData, &mut W) -> std::io::Result<()>,
        F1: Fn(CategoryField, &[SummaryRow], &mut W) -> std::io::Result<()>,
        F2: Fn(Option<&KeyMetrics>, &mut W) -> std::io::Result<()>,
    {
        print_opportunities(data, &mut out)?;
        writeln!(out)?;
        for field in [CategoryField::Division, CategoryField::LeadType] {
            print_summary(field, data.summary(field), &mut out)?;
            writeln!(out)?;
        }
        print_key_metrics(data.key_metrics.as_ref(), &mut out)?;
        Ok(())
    }

    fn percent_or_na(rate: Option<f64>) -> String {
        rate.map(|r| format!("{:.2}%", r)).unwrap_or_else(|| "N/A".to_owned())
    }

    /// Whole dollars with thousands separators, e.g. `$1,234`.
    fn format_currency(amount: f64) -> String {
        let rounded = amount.round() as i64;
        let digits = rounded.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if rounded < 0 { "-" } else { "" };
        format!("{sign}${grouped}")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn currency_is_grouped_by_thousands() {
            assert_eq!(format_currency(0.0), "$0");
            assert_eq!(format_currency(999.4), "$999");
            assert_eq!(format_currency(1234.5), "$1,235");
            assert_eq!(format_currency(1_234_567.0), "$1,234,567");
            assert_eq!(format_currency(-4500.0), "-$4,500");
        }

        #[test]
        fn undefined_rates_print_as_na() {
            assert_eq!(percent_or_na(Some(2.0 / 3.0 * 100.0)), "66.67%");
            assert_eq!(percent_or_na(None), "N/A");
        }
    }
}
