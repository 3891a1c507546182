//! Bar charts for the report, written as PNG files under the image directory.
//!
//! Charts are drawn as SVG documents and rasterised with `resvg`, so no
//! plotting backend or native graphics library is needed.

use crate::aggregation::{descending, top_tenants};
use crate::error::{ReportError, Result};
use crate::schema::{
    AnnualRevenueRow, ChangeKey, ChartCategory, ChartReferences, TenantChangeRow,
    TenantChangeSet, TenantRevenueRow,
};
use crate::utils::{file_safe, format_thousands};
use log::{debug, info};
use resvg::tiny_skia;
use resvg::usvg::{fontdb, Options, Tree};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

/// Produces chart images for the analysis tables and reports where they went.
pub trait ChartRenderer {
    fn render(
        &self,
        annual: &[AnnualRevenueRow],
        tenants: &[TenantRevenueRow],
        changes: &TenantChangeSet,
        output_dir: &Path,
    ) -> Result<ChartReferences>;
}

/// Renderer that writes nothing; used when charts are not wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCharts;

impl ChartRenderer for NoCharts {
    fn render(
        &self,
        _annual: &[AnnualRevenueRow],
        _tenants: &[TenantRevenueRow],
        _changes: &TenantChangeSet,
        _output_dir: &Path,
    ) -> Result<ChartReferences> {
        Ok(ChartReferences::default())
    }
}

pub fn annual_chart_file() -> String {
    "annual_revenue.png".to_string()
}

pub fn top_tenants_chart_file(property: &str) -> String {
    format!("top_tenants_{}.png", property.replace(' ', "_"))
}

pub fn change_chart_file(key: &ChangeKey) -> String {
    format!(
        "top10_changes_{}_{}.png",
        file_safe(&key.property),
        file_safe(&key.years_label())
    )
}

const FONT_FAMILY: &str = "Calibri, Arial, Helvetica, 'DejaVu Sans', sans-serif";
const YEAR_PALETTE: &[&str] = &[
    "#440154", "#3b528b", "#21918c", "#5ec962", "#fde725", "#482878", "#2c728e", "#95d840",
];
const TENANT_COLOR: &str = "#b23a48";
const GAIN_COLOR: &str = "#3b6fb6";
const LOSS_COLOR: &str = "#c0392b";

pub struct SvgChartRenderer {
    image_dir: String,
    top_n: usize,
    fontdb: Arc<fontdb::Database>,
}

impl SvgChartRenderer {
    pub fn new(image_dir: impl Into<String>, top_n: usize) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        debug!("Loaded {} font faces for chart rendering", db.len());

        Self {
            image_dir: image_dir.into(),
            top_n,
            fontdb: Arc::new(db),
        }
    }

    fn relative_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.image_dir, file_name)
    }

    fn rasterize(&self, svg: &str, path: &Path) -> Result<()> {
        let mut options = Options::default();
        options.fontdb = self.fontdb.clone();

        let tree = Tree::from_str(svg, &options)
            .map_err(|e| ReportError::Chart(format!("invalid chart SVG: {}", e)))?;
        let size = tree.size().to_int_size();

        let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
            .ok_or_else(|| ReportError::Chart("failed to allocate chart canvas".to_string()))?;
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        pixmap
            .save_png(path)
            .map_err(|e| ReportError::Chart(format!("{}: {}", path.display(), e)))
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn render(
        &self,
        annual: &[AnnualRevenueRow],
        tenants: &[TenantRevenueRow],
        changes: &TenantChangeSet,
        output_dir: &Path,
    ) -> Result<ChartReferences> {
        let chart_dir = output_dir.join(&self.image_dir);
        std::fs::create_dir_all(&chart_dir)?;

        let mut references = ChartReferences::default();

        let file_name = annual_chart_file();
        self.rasterize(&annual_revenue_svg(annual), &chart_dir.join(&file_name))?;
        references.push(ChartCategory::AnnualRevenue, self.relative_path(&file_name));

        let properties: BTreeSet<&str> = tenants.iter().map(|t| t.property.as_str()).collect();
        for property in properties {
            let top = top_tenants(tenants, property, self.top_n);
            let file_name = top_tenants_chart_file(property);
            self.rasterize(
                &top_tenants_svg(property, &top),
                &chart_dir.join(&file_name),
            )?;
            references.push(ChartCategory::TopTenants, self.relative_path(&file_name));
        }

        for (key, rows) in changes {
            let largest = largest_changes(rows, self.top_n);
            if largest.is_empty() {
                continue;
            }
            let file_name = change_chart_file(key);
            self.rasterize(&changes_svg(key, &largest), &chart_dir.join(&file_name))?;
            references.push(ChartCategory::RevenueChanges, self.relative_path(&file_name));
        }

        info!(
            "Rendered {} charts into {}",
            references.len(),
            chart_dir.display()
        );
        Ok(references)
    }
}

/// The `n` rows with the largest absolute change, ordered by signed change
/// descending.
pub fn largest_changes(rows: &[TenantChangeRow], n: usize) -> Vec<&TenantChangeRow> {
    let mut by_magnitude: Vec<&TenantChangeRow> = rows.iter().collect();
    by_magnitude.sort_by(|a, b| descending(a.revenue_change.abs(), b.revenue_change.abs()));
    by_magnitude.truncate(n);
    by_magnitude.sort_by(|a, b| descending(a.revenue_change, b.revenue_change));
    by_magnitude
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn svg_open(width: u32, height: u32, title: &str) -> String {
    let mut svg = String::new();
    let _ = write!(
        svg,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="{font}">
<rect x="0" y="0" width="{w}" height="{h}" fill="#ffffff"/>
<text x="{cx}" y="32" font-size="20" text-anchor="middle" fill="#222222">{title}</text>
"##,
        w = width,
        h = height,
        font = FONT_FAMILY,
        cx = width / 2,
        title = escape_xml(title),
    );
    svg
}

/// Grouped vertical bars: one group per property, one bar per year.
pub fn annual_revenue_svg(annual: &[AnnualRevenueRow]) -> String {
    const WIDTH: u32 = 1200;
    const HEIGHT: u32 = 600;
    let (left, right, top, bottom) = (110.0, 140.0, 60.0, 150.0);
    let plot_w = WIDTH as f64 - left - right;
    let plot_h = HEIGHT as f64 - top - bottom;

    let mut grouped: BTreeMap<&str, BTreeMap<i32, f64>> = BTreeMap::new();
    let mut years = BTreeSet::new();
    for row in annual {
        grouped
            .entry(row.property.as_str())
            .or_default()
            .insert(row.year, row.revenue);
        years.insert(row.year);
    }
    let years: Vec<i32> = years.into_iter().collect();
    let max_value = annual
        .iter()
        .map(|r| r.revenue)
        .fold(0.0_f64, f64::max)
        .max(1.0);

    let mut svg = svg_open(WIDTH, HEIGHT, "Annual Revenue by Property");
    write_value_axis(&mut svg, left, top, plot_w, plot_h, max_value);

    let group_w = plot_w / grouped.len().max(1) as f64;
    let bar_w = (group_w * 0.8) / years.len().max(1) as f64;

    for (gi, (property, by_year)) in grouped.iter().enumerate() {
        let group_x = left + gi as f64 * group_w + group_w * 0.1;
        for (yi, year) in years.iter().enumerate() {
            let Some(value) = by_year.get(year) else {
                continue;
            };
            let h = (value.max(0.0) / max_value) * plot_h;
            let _ = writeln!(
                svg,
                r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"##,
                group_x + yi as f64 * bar_w,
                top + plot_h - h,
                bar_w,
                h,
                YEAR_PALETTE[yi % YEAR_PALETTE.len()]
            );
        }
        let label_x = left + gi as f64 * group_w + group_w / 2.0;
        let label_y = top + plot_h + 16.0;
        let _ = writeln!(
            svg,
            r##"<text x="{lx:.1}" y="{ly:.1}" font-size="12" text-anchor="end" transform="rotate(-45 {lx:.1} {ly:.1})" fill="#333333">{}</text>"##,
            escape_xml(property),
            lx = label_x,
            ly = label_y,
        );
    }

    for (yi, year) in years.iter().enumerate() {
        let y = top + 10.0 + yi as f64 * 22.0;
        let x = WIDTH as f64 - right + 20.0;
        let _ = writeln!(
            svg,
            r##"<rect x="{:.1}" y="{:.1}" width="14" height="14" fill="{}"/><text x="{:.1}" y="{:.1}" font-size="13" fill="#333333">{}</text>"##,
            x,
            y,
            YEAR_PALETTE[yi % YEAR_PALETTE.len()],
            x + 20.0,
            y + 12.0,
            year
        );
    }

    let _ = writeln!(
        svg,
        r##"<text x="{:.1}" y="{}" font-size="14" text-anchor="middle" fill="#333333">Property</text>"##,
        left + plot_w / 2.0,
        HEIGHT - 12
    );
    let _ = writeln!(
        svg,
        r##"<text x="22" y="{y:.1}" font-size="14" text-anchor="middle" transform="rotate(-90 22 {y:.1})" fill="#333333">Revenue (USD)</text>"##,
        y = top + plot_h / 2.0
    );
    svg.push_str("</svg>\n");
    svg
}

pub fn top_tenants_svg(property: &str, tenants: &[&TenantRevenueRow]) -> String {
    let bars: Vec<(String, f64, &str)> = tenants
        .iter()
        .map(|t| (t.tenant.clone(), t.revenue, TENANT_COLOR))
        .collect();
    horizontal_bars_svg(
        &format!("Top 10 Tenants - {}", property),
        "Total Revenue (USD)",
        &bars,
    )
}

pub fn changes_svg(key: &ChangeKey, rows: &[&TenantChangeRow]) -> String {
    let bars: Vec<(String, f64, &str)> = rows
        .iter()
        .map(|r| {
            let color = if r.revenue_change >= 0.0 {
                GAIN_COLOR
            } else {
                LOSS_COLOR
            };
            (r.tenant.clone(), r.revenue_change, color)
        })
        .collect();
    horizontal_bars_svg(
        &format!(
            "Top 10 Revenue Changes: {} ({})",
            key.property,
            key.years_label()
        ),
        "Revenue Change (USD)",
        &bars,
    )
}

/// One horizontal bar per label. Negative values extend left of the zero
/// line.
fn horizontal_bars_svg(title: &str, x_label: &str, bars: &[(String, f64, &str)]) -> String {
    const WIDTH: u32 = 1000;
    const HEIGHT: u32 = 600;
    let (left, right, top, bottom) = (230.0, 40.0, 60.0, 70.0);
    let plot_w = WIDTH as f64 - left - right;
    let plot_h = HEIGHT as f64 - top - bottom;

    let min_value = bars.iter().map(|b| b.1).fold(0.0_f64, f64::min);
    let max_value = bars.iter().map(|b| b.1).fold(0.0_f64, f64::max);
    let span = (max_value - min_value).max(1.0);
    let x_of = |v: f64| left + (v - min_value) / span * plot_w;

    let mut svg = svg_open(WIDTH, HEIGHT, title);
    let row_h = plot_h / bars.len().max(1) as f64;

    for (i, (label, value, color)) in bars.iter().enumerate() {
        let y = top + i as f64 * row_h;
        let (x0, x1) = (x_of(0.0), x_of(*value));
        let _ = writeln!(
            svg,
            r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"##,
            x0.min(x1),
            y + row_h * 0.15,
            (x1 - x0).abs(),
            row_h * 0.7,
            color
        );
        let _ = writeln!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" font-size="12" text-anchor="end" fill="#333333">{}</text>"##,
            left - 8.0,
            y + row_h / 2.0 + 4.0,
            escape_xml(label)
        );
    }

    let zero = x_of(0.0);
    let _ = writeln!(
        svg,
        "<line x1=\"{z:.1}\" y1=\"{t:.1}\" x2=\"{z:.1}\" y2=\"{b:.1}\" stroke=\"#555555\" stroke-width=\"1\"/>",
        z = zero,
        t = top,
        b = top + plot_h
    );
    for step in 0..=4 {
        let value = min_value + span * step as f64 / 4.0;
        let _ = writeln!(
            svg,
            "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"11\" text-anchor=\"middle\" fill=\"#555555\">{}</text>",
            x_of(value),
            top + plot_h + 18.0,
            format_thousands(value, 0)
        );
    }
    let _ = writeln!(
        svg,
        "<text x=\"{:.1}\" y=\"{}\" font-size=\"14\" text-anchor=\"middle\" fill=\"#333333\">{}</text>",
        left + plot_w / 2.0,
        HEIGHT - 16,
        escape_xml(x_label)
    );
    svg.push_str("</svg>\n");
    svg
}

fn write_value_axis(svg: &mut String, left: f64, top: f64, plot_w: f64, plot_h: f64, max: f64) {
    for step in 0..=5 {
        let value = max * step as f64 / 5.0;
        let y = top + plot_h - plot_h * step as f64 / 5.0;
        let _ = writeln!(
            svg,
            "<line x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"#dddddd\" stroke-width=\"1\"/><text x=\"{:.1}\" y=\"{:.1}\" font-size=\"11\" text-anchor=\"end\" fill=\"#555555\">{}</text>",
            left,
            left + plot_w,
            left - 6.0,
            y + 4.0,
            format_thousands(value, 0),
            y = y
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(tenant: &str, delta: f64) -> TenantChangeRow {
        TenantChangeRow {
            tenant: tenant.to_string(),
            revenue_curr: delta.max(0.0),
            revenue_prev: (-delta).max(0.0),
            revenue_change: delta,
        }
    }

    #[test]
    fn test_chart_file_names() {
        assert_eq!(top_tenants_chart_file("Harbor Plaza"), "top_tenants_Harbor_Plaza.png");
        assert_eq!(top_tenants_chart_file("Unit: A"), "top_tenants_Unit:_A.png");
        assert_eq!(
            change_chart_file(&ChangeKey::new("Harbor Plaza", 2022, 2023)),
            "top10_changes_Harbor_Plaza_2022_to_2023.png"
        );
    }

    #[test]
    fn test_largest_changes_by_magnitude() {
        let rows = vec![
            change("a", 500.0),
            change("b", 10.0),
            change("c", -900.0),
            change("d", -5.0),
        ];
        let picked = largest_changes(&rows, 3);
        let names: Vec<&str> = picked.iter().map(|r| r.tenant.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_svg_escapes_labels() {
        let row = TenantRevenueRow {
            property: "P".to_string(),
            tenant: "Smith & <Sons>".to_string(),
            revenue: 10.0,
        };
        let svg = top_tenants_svg("P", &[&row]);
        assert!(svg.contains("Smith &amp; &lt;Sons&gt;"));
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_render_writes_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let annual = vec![AnnualRevenueRow {
            property: "Harbor Plaza".to_string(),
            year: 2023,
            revenue: 1200.0,
            revenue_change: None,
        }];
        let tenants = vec![TenantRevenueRow {
            property: "Harbor Plaza".to_string(),
            tenant: "Acme".to_string(),
            revenue: 1200.0,
        }];
        let mut changes = TenantChangeSet::new();
        changes.insert(ChangeKey::new("Harbor Plaza", 2022, 2023), vec![change("Acme", 200.0)]);
        changes.insert(ChangeKey::new("Empty", 2022, 2023), vec![]);

        let renderer = SvgChartRenderer::new("visualizations", 10);
        let charts = renderer
            .render(&annual, &tenants, &changes, dir.path())
            .unwrap();

        assert_eq!(charts.annual_revenue, vec!["visualizations/annual_revenue.png"]);
        assert_eq!(
            charts.top_tenants,
            vec!["visualizations/top_tenants_Harbor_Plaza.png"]
        );
        assert_eq!(charts.revenue_changes.len(), 1);
        for path in charts
            .annual_revenue
            .iter()
            .chain(&charts.top_tenants)
            .chain(&charts.revenue_changes)
        {
            let bytes = std::fs::read(dir.path().join(path)).unwrap();
            assert_eq!(&bytes[1..4], b"PNG");
        }
    }
}
