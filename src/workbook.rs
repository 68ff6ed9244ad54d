pub mod spreadsheet;

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use rust_xlsxwriter::{
    Color, Format, FormatAlign, Table as XlsxTable, TableColumn, Workbook, Worksheet, XlsxError,
};
use tracing::{info, trace};

use spreadsheet::{
    Block, Cell, CellStyle, CellValue, ColumnWidths, GridCoordinate, HeaderStyle, Sheet,
    Spreadsheet, Table, COUNT_FORMAT, CURRENCY_FORMAT, DATE_FORMAT, PERCENT_FORMAT,
};

#[derive(Debug, thiserror::Error)]
pub enum WorkbookError {
    #[error("failed to build workbook: {0}")]
    Xlsx(#[from] XlsxError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The file name a report is saved under, e.g.
/// `Opportunity_Pivot_20240131_174502.xlsx`.
pub fn timestamped_filename(report_name: &str, now: NaiveDateTime) -> String {
    format!("{}_{}.xlsx", report_name, now.format("%Y%m%d_%H%M%S"))
}

/// Writes the spreadsheet into `output_dir` under a timestamped name and
/// returns the path of the new file.
pub fn write_report(
    spreadsheet: &Spreadsheet,
    report_name: &str,
    output_dir: &Path,
) -> Result<PathBuf, WorkbookError> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(timestamped_filename(report_name, Local::now().naive_local()));
    write_workbook(spreadsheet, &path)?;
    Ok(path)
}

pub fn write_workbook(spreadsheet: &Spreadsheet, path: &Path) -> Result<(), WorkbookError> {
    let mut workbook = build_workbook(spreadsheet)?;
    workbook.save(path)?;
    info!("Wrote workbook with {} sheets to {}", spreadsheet.sheets.len(), path.display());
    Ok(())
}

pub fn write_workbook_to_buffer(spreadsheet: &Spreadsheet) -> Result<Vec<u8>, WorkbookError> {
    let mut workbook = build_workbook(spreadsheet)?;
    Ok(workbook.save_to_buffer()?)
}

fn build_workbook(spreadsheet: &Spreadsheet) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    for sheet in &spreadsheet.sheets {
        trace!("Rendering sheet {}", sheet.title);
        let worksheet = workbook.add_worksheet();
        render_sheet(worksheet, sheet)?;
    }
    Ok(workbook)
}

fn render_sheet(worksheet: &mut Worksheet, sheet: &Sheet) -> Result<(), XlsxError> {
    worksheet.set_name(&sheet.title)?;

    for block in &sheet.blocks {
        match block {
            Block::Table { origin, table } => render_table(worksheet, *origin, table)?,
            Block::Cells { origin, rows } => render_cells(worksheet, *origin, rows)?,
        }
    }

    let widths: Vec<(u16, f64)> = match &sheet.column_widths {
        ColumnWidths::Auto => sheet.auto_column_widths().into_iter().collect(),
        ColumnWidths::Fixed(widths) => widths.clone(),
    };
    for (column, width) in widths {
        worksheet.set_column_width(column, width)?;
    }
    Ok(())
}

fn header_format(style: HeaderStyle) -> Format {
    match style {
        HeaderStyle::Plain => Format::new(),
        HeaderStyle::Bold => Format::new().set_bold(),
        HeaderStyle::Banner { background, font } => Format::new()
            .set_bold()
            .set_font_color(Color::RGB(font))
            .set_background_color(Color::RGB(background))
            .set_align(FormatAlign::Center),
    }
}

fn render_table(
    worksheet: &mut Worksheet,
    origin: GridCoordinate,
    table: &Table,
) -> Result<(), XlsxError> {
    let headers = header_cells(table);
    for (i, (header, format)) in headers.iter().enumerate() {
        worksheet.write_string_with_format(origin.row, origin.column + i as u16, *header, format)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let row_num = origin.row + 1 + r as u32;
        for (c, value) in row.iter().enumerate() {
            let (value, format) = table_cell(table, r, c, value);
            write_value(worksheet, row_num, origin.column + c as u16, &value, &format)?;
        }
    }

    if table.headers.is_empty() {
        return Ok(());
    }
    let last_column = origin.column + table.headers.len() as u16 - 1;
    if let Some(name) = &table.style.native_table_name {
        // a native table needs at least one data row, even if it is blank
        let last_row = origin.row + table.rows.len().max(1) as u32;
        // the table rewrites its header row, so the header format goes with it
        let columns: Vec<_> = headers
            .into_iter()
            .map(|(header, format)| TableColumn::new().set_header(header).set_header_format(format))
            .collect();
        let native = XlsxTable::new().set_name(name).set_columns(&columns);
        worksheet.add_table(origin.row, origin.column, last_row, last_column, &native)?;
    } else if table.style.autofilter {
        let last_row = origin.row + table.rows.len() as u32;
        worksheet.autofilter(origin.row, origin.column, last_row, last_column)?;
    }
    Ok(())
}

fn header_cells(table: &Table) -> Vec<(&str, Format)> {
    let format = header_format(table.style.header_style);
    table.headers.iter().map(|header| (header.as_str(), format.clone())).collect()
}

/// The value and format that data cell (`row`, `column`) of `table` is
/// written with.
fn table_cell(table: &Table, row: usize, column: usize, value: &CellValue) -> (CellValue, Format) {
    let mut format = Format::new();
    if let Some(marker) = table.style.total_row_marker.filter(|_| table.is_total_row(row)) {
        format = format.set_bold().set_background_color(Color::RGB(marker.background));
    }
    let value = if table.style.is_percent(column) {
        format = format.set_num_format(PERCENT_FORMAT);
        percent_to_fraction(value)
    } else {
        if table.style.is_currency(column) {
            format = format.set_num_format(CURRENCY_FORMAT);
        }
        value.clone()
    };
    let format = with_date_format(&value, format);
    (value, format)
}

fn styled_cell(cell: &Cell) -> (CellValue, Format) {
    let (value, format) = match cell.style {
        CellStyle::Normal => (cell.value.clone(), Format::new()),
        CellStyle::Bold => (cell.value.clone(), Format::new().set_bold()),
        CellStyle::Title { size } => {
            (cell.value.clone(), Format::new().set_bold().set_font_size(size))
        }
        CellStyle::Count => (cell.value.clone(), Format::new().set_num_format(COUNT_FORMAT)),
        CellStyle::Currency => (cell.value.clone(), Format::new().set_num_format(CURRENCY_FORMAT)),
        CellStyle::Percent => {
            (percent_to_fraction(&cell.value), Format::new().set_num_format(PERCENT_FORMAT))
        }
    };
    let format = with_date_format(&value, format);
    (value, format)
}

/// Percent formats multiply by 100, so 0-100 values are stored as fractions.
fn percent_to_fraction(value: &CellValue) -> CellValue {
    match value {
        CellValue::Number(n) => CellValue::Number(n / 100.0),
        other => other.clone(),
    }
}

fn with_date_format(value: &CellValue, format: Format) -> Format {
    match value {
        CellValue::DateTime(_) => format.set_num_format(DATE_FORMAT),
        _ => format,
    }
}

fn render_cells(
    worksheet: &mut Worksheet,
    origin: GridCoordinate,
    rows: &[Vec<Cell>],
) -> Result<(), XlsxError> {
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (value, format) = styled_cell(cell);
            write_value(worksheet, origin.row + r as u32, origin.column + c as u16, &value, &format)?;
        }
    }
    Ok(())
}

fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    column: u16,
    value: &CellValue,
    format: &Format,
) -> Result<(), XlsxError> {
    match value {
        CellValue::Empty => {
            worksheet.write_blank(row, column, format)?;
        }
        CellValue::Text(s) => {
            worksheet.write_string_with_format(row, column, s, format)?;
        }
        CellValue::Number(n) => {
            worksheet.write_number_with_format(row, column, *n, format)?;
        }
        CellValue::DateTime(dt) => {
            worksheet.write_datetime_with_format(row, column, dt, format)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::spreadsheet::{TableStyle, TotalRowMarker, COLOR_TOTAL_GRAY};
    use super::*;

    fn sample_spreadsheet(with_rows: bool) -> Spreadsheet {
        let style = TableStyle {
            header_style: HeaderStyle::Banner { background: 0x366092, font: 0xFFFFFF },
            currency_columns: vec![2],
            percent_columns: vec![3],
            total_row_marker: Some(TotalRowMarker { background: COLOR_TOTAL_GRAY }),
            native_table_name: None,
            autofilter: true,
        };
        let mut summary = Table::new(["Year", "Division", "Revenue", "Close Rate"], style);
        let mut data = Table::new(
            ["Id", "Created_Date"],
            TableStyle {
                native_table_name: Some("OpportunityData".to_owned()),
                ..Default::default()
            },
        );
        if with_rows {
            summary.push_total_row(vec![
                CellValue::Number(2024.0),
                CellValue::text("TOTAL"),
                CellValue::Number(1500.0),
                CellValue::Empty,
            ]);
            data.push_row(vec![
                CellValue::text("006A"),
                CellValue::DateTime(
                    NaiveDate::from_ymd_opt(2024, 1, 10).unwrap().and_hms_opt(8, 0, 0).unwrap(),
                ),
            ]);
        }
        Spreadsheet {
            sheets: vec![
                Sheet::new("Data")
                    .with_block(Block::Table { origin: GridCoordinate::ORIGIN, table: data }),
                Sheet::new("Summary")
                    .with_block(Block::Table { origin: GridCoordinate::ORIGIN, table: summary })
                    .with_block(Block::Cells {
                        origin: GridCoordinate::new(4, 0),
                        rows: vec![vec![
                            Cell::title("KPIs", 14.0),
                            Cell::new(CellValue::Number(40.0), CellStyle::Percent),
                        ]],
                    }),
            ],
        }
    }

    #[test]
    fn filename_carries_a_timestamp() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(17, 45, 2).unwrap();
        assert_eq!(
            timestamped_filename("Opportunity_Pivot", now),
            "Opportunity_Pivot_20240131_174502.xlsx"
        );
    }

    #[test]
    fn renders_to_an_xlsx_container() {
        for with_rows in [true, false] {
            let bytes = write_workbook_to_buffer(&sample_spreadsheet(with_rows)).unwrap();
            assert!(bytes.starts_with(b"PK"), "xlsx files are zip archives");
        }
    }

    #[test]
    fn writes_report_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("reports");
        let path = write_report(&sample_spreadsheet(true), "Opportunity_Test", &out_dir).unwrap();

        assert_eq!(path.parent(), Some(out_dir.as_path()));
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("Opportunity_Test_"));
        assert!(file_name.ends_with(".xlsx"));
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn invalid_sheet_names_are_errors() {
        let spreadsheet = Spreadsheet { sheets: vec![Sheet::new("bad/name?")] };
        assert!(matches!(write_workbook_to_buffer(&spreadsheet), Err(WorkbookError::Xlsx(_))));
    }

    fn table_with_rows() -> Table {
        let mut table = sample_spreadsheet(false)
            .sheets
            .into_iter()
            .nth(1)
            .and_then(|sheet| sheet.blocks.into_iter().next())
            .map(|block| match block {
                Block::Table { table, .. } => table,
                Block::Cells { .. } => panic!("expected a table"),
            })
            .unwrap();
        table.push_row(vec![
            CellValue::Number(2024.0),
            CellValue::text("TOTAL (division)"),
            CellValue::Number(1000.0),
            CellValue::Number(40.0),
        ]);
        table.push_total_row(vec![
            CellValue::Number(2024.0),
            CellValue::text("TOTAL"),
            CellValue::Number(1500.0),
            CellValue::Empty,
        ]);
        table
    }

    #[test]
    fn percent_columns_are_written_as_fractions() {
        let table = table_with_rows();
        let (value, format) = table_cell(&table, 0, 3, &table.rows[0][3]);
        assert_eq!(value, CellValue::Number(0.4));
        assert_eq!(format, Format::new().set_num_format(PERCENT_FORMAT));

        // a missing rate stays blank instead of becoming zero
        let (value, _) = table_cell(&table, 1, 3, &table.rows[1][3]);
        assert_eq!(value, CellValue::Empty);

        let (value, format) = styled_cell(&Cell::new(CellValue::Number(12.5), CellStyle::Percent));
        assert_eq!(value, CellValue::Number(0.125));
        assert_eq!(format, Format::new().set_num_format("0.00%"));
    }

    #[test]
    fn currency_and_count_formats() {
        let table = table_with_rows();
        let (value, format) = table_cell(&table, 0, 2, &table.rows[0][2]);
        assert_eq!(value, CellValue::Number(1000.0));
        assert_eq!(format, Format::new().set_num_format("$#,##0"));

        // columns without a rule are left alone
        let (_, format) = table_cell(&table, 0, 0, &table.rows[0][0]);
        assert_eq!(format, Format::new());

        let (_, format) = styled_cell(&Cell::new(CellValue::Number(3.0), CellStyle::Count));
        assert_eq!(format, Format::new().set_num_format(COUNT_FORMAT));
        let (_, format) = styled_cell(&Cell::new(CellValue::Number(3.0), CellStyle::Currency));
        assert_eq!(format, Format::new().set_num_format(CURRENCY_FORMAT));
    }

    #[test]
    fn only_flagged_total_rows_are_bold_and_filled() {
        let table = table_with_rows();
        let total_fill = Format::new().set_bold().set_background_color(Color::RGB(COLOR_TOTAL_GRAY));

        let (_, format) = table_cell(&table, 1, 1, &table.rows[1][1]);
        assert_eq!(format, total_fill);
        let (_, format) = table_cell(&table, 1, 2, &table.rows[1][2]);
        assert_eq!(format, total_fill.clone().set_num_format(CURRENCY_FORMAT));

        // a named row whose label mentions TOTAL is an ordinary row
        let (_, format) = table_cell(&table, 0, 1, &table.rows[0][1]);
        assert_eq!(format, Format::new());

        // without a marker total rows are not emphasized
        let mut plain = table.clone();
        plain.style.total_row_marker = None;
        let (_, format) = table_cell(&plain, 1, 1, &plain.rows[1][1]);
        assert_eq!(format, Format::new());
    }

    #[test]
    fn dates_are_written_with_a_date_format() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let table = Table::new(["Created_Date"], TableStyle::default());
        let (value, format) = table_cell(&table, 0, 0, &CellValue::DateTime(date));
        assert_eq!(value, CellValue::DateTime(date));
        assert_eq!(format, Format::new().set_num_format(DATE_FORMAT));

        let (_, format) = styled_cell(&Cell::new(CellValue::DateTime(date), CellStyle::Bold));
        assert_eq!(format, Format::new().set_bold().set_num_format("yyyy-mm-dd"));
    }

    #[test]
    fn native_table_headers_keep_their_style() {
        let table = Table::new(
            ["Id", "Amount"],
            TableStyle {
                header_style: HeaderStyle::Banner { background: 0x366092, font: 0xFFFFFF },
                native_table_name: Some("OpportunityData".to_owned()),
                ..Default::default()
            },
        );
        let banner = Format::new()
            .set_bold()
            .set_font_color(Color::RGB(0xFFFFFF))
            .set_background_color(Color::RGB(0x366092))
            .set_align(FormatAlign::Center);
        assert_eq!(header_cells(&table), vec![("Id", banner.clone()), ("Amount", banner)]);
    }
}
