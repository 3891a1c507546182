use crate::error::{ReportError, Result};
use crate::schema::RevenueRecord;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Days, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use std::path::Path;

pub const TENANT_COLUMN: &str = "tenant";
pub const PROPERTY_COLUMN: &str = "property";

static EMPTY_CELL: CellValue = CellValue::Empty;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    /// Identifier text for the tenant/property columns.
    pub fn as_label(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Revenue value; blanks and anything non-numeric become `None`.
    pub fn as_amount(&self) -> Option<f64> {
        let value = match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => parse_amount(s),
            CellValue::Empty | CellValue::Date(_) => None,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::Number(n) => year_to_date(*n).or_else(|| excel_serial_to_date(*n)),
            CellValue::Text(s) => parse_date_header(s),
            CellValue::Empty => None,
        }
    }
}

/// The source sheet as read: one header row, then data rows.
#[derive(Debug, Clone, Default)]
pub struct WideTable {
    pub headers: Vec<CellValue>,
    pub rows: Vec<Vec<CellValue>>,
}

impl WideTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.as_label().eq_ignore_ascii_case(name))
    }

    pub fn validate(&self) -> Result<(usize, usize)> {
        let tenant = self
            .column_index(TENANT_COLUMN)
            .ok_or_else(|| ReportError::MissingColumn(TENANT_COLUMN.to_string()))?;
        let property = self
            .column_index(PROPERTY_COLUMN)
            .ok_or_else(|| ReportError::MissingColumn(PROPERTY_COLUMN.to_string()))?;
        Ok((tenant, property))
    }
}

pub fn load_wide_table(path: &Path) -> Result<WideTable> {
    if !path.exists() {
        return Err(ReportError::Load(format!(
            "File not found at {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let table = match extension.as_str() {
        "csv" => read_csv_table(path)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_spreadsheet_table(path)?,
        other => {
            return Err(ReportError::Load(format!(
                "Unsupported input format '{}' for {}",
                other,
                path.display()
            )))
        }
    };

    debug!(
        "Read {} columns and {} rows from {}",
        table.headers.len(),
        table.rows.len(),
        path.display()
    );
    Ok(table)
}

fn read_csv_table(path: &Path) -> Result<WideTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader
        .headers()?
        .iter()
        .map(text_cell)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(text_cell).collect());
    }

    Ok(WideTable { headers, rows })
}

fn read_spreadsheet_table(path: &Path) -> Result<WideTable> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ReportError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| {
            ReportError::Spreadsheet(format!("{} contains no worksheets", path.display()))
        })?
        .map_err(|e| ReportError::Spreadsheet(e.to_string()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(spreadsheet_cell).collect::<Vec<_>>());

    let headers = rows.next().unwrap_or_default();
    let rows = rows
        .filter(|row| row.iter().any(|c| *c != CellValue::Empty))
        .collect();

    Ok(WideTable { headers, rows })
}

fn text_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(trimmed.to_string())
    }
}

fn spreadsheet_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => text_cell(s),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => CellValue::Date(ndt.date()),
            None => CellValue::Number(dt.as_f64()),
        },
    }
}

/// Melts the wide table into one record per (tenant, property, date column).
///
/// Columns whose header is not a recognisable date still produce records,
/// with `date: None`; year-keyed analysis skips them.
pub fn reshape_to_long(table: &WideTable) -> Result<Vec<RevenueRecord>> {
    let (tenant_idx, property_idx) = table.validate()?;

    let date_columns: Vec<(usize, Option<NaiveDate>)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != tenant_idx && *idx != property_idx)
        .map(|(idx, header)| {
            let date = header.as_date();
            if date.is_none() {
                warn!(
                    "Column '{}' is not a date; its values are excluded from yearly analysis",
                    header.as_label()
                );
            }
            (idx, date)
        })
        .collect();

    let mut records = Vec::with_capacity(table.rows.len() * date_columns.len());
    let mut coerced = 0usize;

    for row in &table.rows {
        let cell = |idx: usize| row.get(idx).unwrap_or(&EMPTY_CELL);
        let tenant = cell(tenant_idx).as_label();
        let property = cell(property_idx).as_label();

        for &(idx, date) in &date_columns {
            let revenue = match cell(idx).as_amount() {
                Some(v) => v,
                None => {
                    coerced += 1;
                    0.0
                }
            };
            records.push(RevenueRecord::new(tenant.clone(), property.clone(), date, revenue));
        }
    }

    if coerced > 0 {
        debug!("{} blank or non-numeric revenue cells counted as 0", coerced);
    }

    Ok(records)
}

/// Loads the source file and reshapes it. Any failure here means there is
/// nothing to report on.
pub fn load_revenue_records(path: &Path) -> Result<Vec<RevenueRecord>> {
    let table = load_wide_table(path)?;
    if table.rows.is_empty() {
        return Err(ReportError::EmptyInput(path.display().to_string()));
    }

    let records = reshape_to_long(&table)?;
    info!(
        "Loaded {} revenue records from {} ({} rows)",
        records.len(),
        path.display(),
        table.rows.len()
    );
    Ok(records)
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Reads a column header as a date. Month-only headers ("2023-01",
/// "Jan 2023", "January 2023") resolve to the first day of the month.
pub fn parse_date_header(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    let month_start = format!("{}-01", s);
    for fmt in ["%Y-%m-%d", "%b %Y-%d", "%B %Y-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(&month_start, fmt) {
            return Some(date);
        }
    }

    if let Ok(number) = s.parse::<f64>() {
        return year_to_date(number).or_else(|| excel_serial_to_date(number));
    }

    None
}

/// A bare year header ("2023") is read as January 1st of that year.
fn year_to_date(value: f64) -> Option<NaiveDate> {
    if value.fract() != 0.0 || !(1900.0..=2200.0).contains(&value) {
        return None;
    }
    NaiveDate::from_ymd_opt(value as i32, 1, 1)
}

/// Excel stores dates as days since 1899-12-30. Only values that land in a
/// plausible reporting range are accepted so ordinary numbers are not
/// mistaken for dates.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(20_000.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.trunc() as u64))
}

fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Some(inner) = cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        return inner.parse::<f64>().ok().map(|v| -v);
    }
    cleaned.parse::<f64>().ok()
}
