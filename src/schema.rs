use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One observation of the long-format table: a tenant's revenue at one
/// property for one reporting column of the source sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueRecord {
    pub tenant: String,
    pub property: String,
    /// `None` when the column header could not be read as a date.
    pub date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub revenue: f64,
}

impl RevenueRecord {
    pub fn new(
        tenant: impl Into<String>,
        property: impl Into<String>,
        date: Option<NaiveDate>,
        revenue: f64,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            property: property.into(),
            date,
            year: date.map(|d| d.year()),
            revenue,
        }
    }

    pub fn is_dated(&self) -> bool {
        self.year.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualRevenueRow {
    pub property: String,
    pub year: i32,
    pub revenue: f64,
    /// Difference from the previous year present for the same property.
    /// `None` for the first year of each property.
    pub revenue_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRevenueRow {
    pub property: String,
    pub tenant: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantChangeRow {
    pub tenant: String,
    pub revenue_curr: f64,
    pub revenue_prev: f64,
    pub revenue_change: f64,
}

/// Identifies one (property, year pair) entry of the change analysis.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangeKey {
    pub property: String,
    pub previous_year: i32,
    pub current_year: i32,
}

impl ChangeKey {
    pub fn new(property: impl Into<String>, previous_year: i32, current_year: i32) -> Self {
        Self {
            property: property.into(),
            previous_year,
            current_year,
        }
    }

    /// The "2022 to 2023" part of the key.
    pub fn years_label(&self) -> String {
        format!("{} to {}", self.previous_year, self.current_year)
    }
}

impl fmt::Display for ChangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.years_label())
    }
}

pub type TenantChangeSet = BTreeMap<ChangeKey, Vec<TenantChangeRow>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartCategory {
    AnnualRevenue,
    TopTenants,
    RevenueChanges,
}

impl ChartCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartCategory::AnnualRevenue => "annual_revenue",
            ChartCategory::TopTenants => "top_tenants",
            ChartCategory::RevenueChanges => "revenue_changes",
        }
    }
}

/// Relative chart paths (e.g. `visualizations/annual_revenue.png`) grouped by
/// chart category, in the order the renderer produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartReferences {
    #[serde(default)]
    pub annual_revenue: Vec<String>,
    #[serde(default)]
    pub top_tenants: Vec<String>,
    #[serde(default)]
    pub revenue_changes: Vec<String>,
}

impl ChartReferences {
    pub fn paths(&self, category: ChartCategory) -> &[String] {
        match category {
            ChartCategory::AnnualRevenue => &self.annual_revenue,
            ChartCategory::TopTenants => &self.top_tenants,
            ChartCategory::RevenueChanges => &self.revenue_changes,
        }
    }

    pub fn push(&mut self, category: ChartCategory, path: impl Into<String>) {
        let path = path.into();
        match category {
            ChartCategory::AnnualRevenue => self.annual_revenue.push(path),
            ChartCategory::TopTenants => self.top_tenants.push(path),
            ChartCategory::RevenueChanges => self.revenue_changes.push(path),
        }
    }

    pub fn len(&self) -> usize {
        self.annual_revenue.len() + self.top_tenants.len() + self.revenue_changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
