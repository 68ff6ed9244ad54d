//! An in-memory description of a workbook. Reports are assembled as these
//! values first and only turned into a file by [`super::write_workbook`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;

/// Columns are never made wider than this by automatic sizing.
pub const MAX_AUTO_WIDTH: f64 = 30.0;
/// How many data rows of a table are looked at when sizing its columns.
pub const WIDTH_SAMPLE_ROWS: usize = 100;

pub const COLOR_HEADER_BLUE: u32 = 0x366092;
pub const COLOR_WHITE: u32 = 0xFFFFFF;
pub const COLOR_TOTAL_GRAY: u32 = 0xE7E6E6;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spreadsheet {
    pub sheets: Vec<Sheet>,
}

impl Spreadsheet {
    pub fn sheet(&self, title: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.title == title)
    }

    pub fn sheet_titles(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.title.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub title: String,
    pub blocks: Vec<Block>,
    pub column_widths: ColumnWidths,
}

impl Sheet {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), blocks: Vec::new(), column_widths: ColumnWidths::Auto }
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_column_widths(mut self, column_widths: ColumnWidths) -> Self {
        self.column_widths = column_widths;
        self
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Table { table, .. } => Some(table),
            Block::Cells { .. } => None,
        })
    }

    /// The width of every column that holds something, sized to the longest
    /// sampled value plus padding.
    pub fn auto_column_widths(&self) -> BTreeMap<u16, f64> {
        let mut longest: BTreeMap<u16, usize> = BTreeMap::new();
        let mut observe = |column: u16, len: usize| {
            let entry = longest.entry(column).or_default();
            *entry = (*entry).max(len);
        };
        for block in &self.blocks {
            match block {
                Block::Table { origin, table } => {
                    for (i, header) in table.headers.iter().enumerate() {
                        observe(origin.column + i as u16, header.chars().count());
                    }
                    for row in table.rows.iter().take(WIDTH_SAMPLE_ROWS) {
                        for (i, value) in row.iter().enumerate() {
                            observe(origin.column + i as u16, value.display_len());
                        }
                    }
                }
                Block::Cells { origin, rows } => {
                    for row in rows {
                        for (i, cell) in row.iter().enumerate() {
                            observe(origin.column + i as u16, cell.value.display_len());
                        }
                    }
                }
            }
        }
        longest
            .into_iter()
            .map(|(column, len)| (column, (len as f64 + 2.0).min(MAX_AUTO_WIDTH)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnWidths {
    /// Size each column from its content.
    Auto,
    /// Explicit widths; columns not listed keep the default width.
    Fixed(Vec<(u16, f64)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridCoordinate {
    pub row: u32,
    pub column: u16,
}

impl GridCoordinate {
    pub const ORIGIN: Self = Self { row: 0, column: 0 };

    pub fn new(row: u32, column: u16) -> Self {
        Self { row, column }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A header row followed by data rows, styled as a unit.
    Table { origin: GridCoordinate, table: Table },
    /// Free-form cells, each with its own style.
    Cells { origin: GridCoordinate, rows: Vec<Vec<Cell>> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn optional_number(n: Option<f64>) -> Self {
        n.map_or(CellValue::Empty, CellValue::Number)
    }

    pub fn optional_text(s: Option<&str>) -> Self {
        s.map_or(CellValue::Empty, |s| CellValue::Text(s.to_owned()))
    }

    pub fn optional_datetime(dt: Option<NaiveDateTime>) -> Self {
        dt.map_or(CellValue::Empty, CellValue::DateTime)
    }

    /// Length of the value as it would be typed into a cell.
    fn display_len(&self) -> usize {
        match self {
            CellValue::Empty => 0,
            CellValue::Text(s) => s.chars().count(),
            CellValue::Number(n) => n.to_string().len(),
            CellValue::DateTime(_) => DATE_FORMAT.len(),
        }
    }
}

pub const DATE_FORMAT: &str = "yyyy-mm-dd";
pub const CURRENCY_FORMAT: &str = "$#,##0";
pub const PERCENT_FORMAT: &str = "0.00%";
pub const COUNT_FORMAT: &str = "#,##0";

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    /// Indices into `rows` of the rows pushed with [`Table::push_total_row`].
    pub total_rows: BTreeSet<usize>,
    pub style: TableStyle,
}

impl Table {
    pub fn new(headers: impl IntoIterator<Item = impl Into<String>>, style: TableStyle) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            total_rows: BTreeSet::new(),
            style,
        }
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }

    /// Pushes a row that is emphasized according to the style's
    /// `total_row_marker`.
    pub fn push_total_row(&mut self, row: Vec<CellValue>) {
        self.total_rows.insert(self.rows.len());
        self.rows.push(row);
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    pub fn is_total_row(&self, index: usize) -> bool {
        self.total_rows.contains(&index)
    }
}

/// How a table is rendered.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableStyle {
    pub header_style: HeaderStyle,
    /// Columns that hold money.
    pub currency_columns: Vec<usize>,
    /// Columns that hold percentages on the 0-100 scale. They are scaled to
    /// fractions when written because percent formats multiply by 100.
    pub percent_columns: Vec<usize>,
    /// Rows to emphasize.
    pub total_row_marker: Option<TotalRowMarker>,
    /// When set, the range is declared as a native spreadsheet table with
    /// this name instead of a plain range.
    pub native_table_name: Option<String>,
    /// Whether to put filter buttons on the header row. Native tables always
    /// have them.
    pub autofilter: bool,
}

impl TableStyle {
    pub fn is_currency(&self, column: usize) -> bool {
        self.currency_columns.contains(&column)
    }

    pub fn is_percent(&self, column: usize) -> bool {
        self.percent_columns.contains(&column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderStyle {
    Plain,
    #[default]
    Bold,
    Banner {
        background: u32,
        font: u32,
    },
}

/// How total rows are emphasized. Without a marker they look like any
/// other row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalRowMarker {
    pub background: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    pub fn new(value: CellValue, style: CellStyle) -> Self {
        Self { value, style }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::new(CellValue::text(s), CellStyle::Normal)
    }

    pub fn bold(s: impl Into<String>) -> Self {
        Self::new(CellValue::text(s), CellStyle::Bold)
    }

    pub fn title(s: impl Into<String>, size: f64) -> Self {
        Self::new(CellValue::text(s), CellStyle::Title { size })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellStyle {
    Normal,
    Bold,
    Title { size: f64 },
    Count,
    Currency,
    /// A 0-100 value shown as a percentage.
    Percent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_rows_are_flagged_when_pushed() {
        let mut table = Table::new(["Year", "Division"], TableStyle::default());
        table.push_row(vec![CellValue::Number(2024.0), CellValue::text("TOTAL")]);
        table.push_total_row(vec![CellValue::Number(2024.0), CellValue::text("TOTAL")]);
        assert!(!table.is_total_row(0), "text alone does not make a total row");
        assert!(table.is_total_row(1));
        assert!(!table.is_total_row(2));
        assert_eq!(table.column_index("Division"), Some(1));
    }

    #[test]
    fn auto_widths_pad_and_cap() {
        let mut table = Table::new(["Id", "Name"], TableStyle::default());
        table.push_row(vec![CellValue::text("006"), CellValue::text("x".repeat(80))]);
        let sheet = Sheet::new("Data")
            .with_block(Block::Table { origin: GridCoordinate::ORIGIN, table })
            .with_block(Block::Cells {
                origin: GridCoordinate::new(5, 3),
                rows: vec![vec![Cell::text("Notes")]],
            });

        let widths = sheet.auto_column_widths();
        assert_eq!(widths.get(&0), Some(&5.0));
        assert_eq!(widths.get(&1), Some(&MAX_AUTO_WIDTH));
        assert_eq!(widths.get(&2), None);
        assert_eq!(widths.get(&3), Some(&7.0));
    }

    #[test]
    fn auto_widths_only_sample_leading_rows() {
        let mut table = Table::new(["A"], TableStyle::default());
        for _ in 0..WIDTH_SAMPLE_ROWS {
            table.push_row(vec![CellValue::text("ab")]);
        }
        table.push_row(vec![CellValue::text("a much longer value")]);
        let sheet =
            Sheet::new("S").with_block(Block::Table { origin: GridCoordinate::ORIGIN, table });
        assert_eq!(sheet.auto_column_widths().get(&0), Some(&4.0));
    }
}
