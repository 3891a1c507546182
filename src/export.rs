use crate::error::{ReportError, Result};
use crate::schema::{AnnualRevenueRow, ChangeKey, TenantChangeRow, TenantChangeSet};
use log::{error, info};
use rust_xlsxwriter::{Format, FormatBorder, Workbook, Worksheet, XlsxError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const WORKBOOK_FILE: &str = "analysis_results.xlsx";
pub const ANNUAL_SHEET: &str = "Annual_Revenue";
const MAX_SHEET_NAME: usize = 31;

/// Sheet name for a change entry: spaces removed, `:` and characters Excel
/// rejects become `_`, cut to 31 characters. Excel also refuses a leading or
/// trailing apostrophe, so those are trimmed after the cut.
pub fn sheet_name_for(key: &ChangeKey) -> String {
    let cut: String = key
        .to_string()
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| match c {
            ':' | '[' | ']' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .take(MAX_SHEET_NAME)
        .collect();

    let trimmed = cut.trim_matches('\'');
    if trimmed.is_empty() {
        format!("Changes_{}to{}", key.previous_year, key.current_year)
    } else {
        trimmed.to_string()
    }
}

fn unique_sheet_name(base: String, used: &mut BTreeSet<String>) -> String {
    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate.to_lowercase()) {
        let suffix = format!("_{}", n);
        let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
        candidate = base.chars().take(keep).chain(suffix.chars()).collect();
        n += 1;
    }
    used.insert(candidate.to_lowercase());
    candidate
}

struct Formats {
    header: Format,
    currency: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold().set_border(FormatBorder::Thin),
            currency: Format::new().set_num_format("#,##0.00"),
        }
    }
}

/// Writes the annual table and every tenant change table to
/// `output_dir/analysis_results.xlsx`.
pub fn export_analysis_results(
    annual: &[AnnualRevenueRow],
    changes: &TenantChangeSet,
    output_dir: &Path,
) -> Result<PathBuf> {
    export_analysis_results_to(annual, changes, &output_dir.join(WORKBOOK_FILE))
}

pub fn export_analysis_results_to(
    annual: &[AnnualRevenueRow],
    changes: &TenantChangeSet,
    path: &Path,
) -> Result<PathBuf> {
    build_and_save(annual, changes, path).map_err(|e| {
        error!("Error exporting results to {}: {}", path.display(), e);
        match e {
            ReportError::Xlsx(inner) => ReportError::Export(inner.to_string()),
            other => other,
        }
    })?;

    info!(
        "Exported annual revenue and {} change tables to {}",
        changes.len(),
        path.display()
    );
    Ok(path.to_path_buf())
}

fn build_and_save(
    annual: &[AnnualRevenueRow],
    changes: &TenantChangeSet,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let formats = Formats::new();
    let mut workbook = Workbook::new();
    let mut used = BTreeSet::new();
    used.insert(ANNUAL_SHEET.to_lowercase());

    let sheet = workbook.add_worksheet();
    sheet.set_name(ANNUAL_SHEET)?;
    write_annual_sheet(sheet, annual, &formats)?;

    for (key, rows) in changes {
        let name = unique_sheet_name(sheet_name_for(key), &mut used);
        let sheet = workbook.add_worksheet();
        sheet.set_name(&name)?;
        write_change_sheet(sheet, rows, &formats)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn write_headers(
    sheet: &mut Worksheet,
    headers: &[&str],
    format: &Format,
) -> std::result::Result<(), XlsxError> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_with_format(0, col as u16, *header, format)?;
    }
    Ok(())
}

fn write_annual_sheet(
    sheet: &mut Worksheet,
    annual: &[AnnualRevenueRow],
    formats: &Formats,
) -> std::result::Result<(), XlsxError> {
    write_headers(
        sheet,
        &["property", "Year", "Revenue", "Revenue_Change"],
        &formats.header,
    )?;
    sheet.set_column_width(0, 30)?;
    sheet.set_column_width(2, 15)?;
    sheet.set_column_width(3, 15)?;

    for (i, row) in annual.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write(r, 0, row.property.as_str())?;
        sheet.write(r, 1, row.year)?;
        sheet.write_with_format(r, 2, row.revenue, &formats.currency)?;
        if let Some(change) = row.revenue_change {
            sheet.write_with_format(r, 3, change, &formats.currency)?;
        }
    }
    Ok(())
}

fn write_change_sheet(
    sheet: &mut Worksheet,
    rows: &[TenantChangeRow],
    formats: &Formats,
) -> std::result::Result<(), XlsxError> {
    write_headers(
        sheet,
        &["tenant", "Revenue_curr", "Revenue_prev", "Revenue_Change"],
        &formats.header,
    )?;
    sheet.set_column_width(0, 30)?;

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write(r, 0, row.tenant.as_str())?;
        sheet.write_with_format(r, 1, row.revenue_curr, &formats.currency)?;
        sheet.write_with_format(r, 2, row.revenue_prev, &formats.currency)?;
        sheet.write_with_format(r, 3, row.revenue_change, &formats.currency)?;
    }
    Ok(())
}

/// Writes the markup report, creating the parent directory if needed.
pub fn write_markdown_report(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text).map_err(|e| {
        error!("Error writing report {}: {}", path.display(), e);
        ReportError::Export(format!("{}: {}", path.display(), e))
    })?;
    info!("Report saved to {}", path.display());
    Ok(())
}
