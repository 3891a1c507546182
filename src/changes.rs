use crate::aggregation::descending;
use crate::schema::{ChangeKey, RevenueRecord, TenantChangeRow, TenantChangeSet};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Revenue summed per property, then year, then tenant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenantAnnualRevenue {
    by_property: BTreeMap<String, BTreeMap<i32, BTreeMap<String, f64>>>,
}

impl TenantAnnualRevenue {
    pub fn from_records(records: &[RevenueRecord]) -> Self {
        let mut by_property: BTreeMap<String, BTreeMap<i32, BTreeMap<String, f64>>> =
            BTreeMap::new();

        for record in records {
            let Some(year) = record.year else {
                continue;
            };
            *by_property
                .entry(record.property.clone())
                .or_default()
                .entry(year)
                .or_default()
                .entry(record.tenant.clone())
                .or_insert(0.0) += record.revenue;
        }

        Self { by_property }
    }

    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.by_property.keys().map(String::as_str)
    }

    /// Sorted distinct years with data for `property`.
    pub fn years(&self, property: &str) -> Vec<i32> {
        self.by_property
            .get(property)
            .map(|years| years.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn tenants(&self, property: &str, year: i32) -> Option<&BTreeMap<String, f64>> {
        self.by_property.get(property)?.get(&year)
    }
}

pub fn tenant_annual_revenue(records: &[RevenueRecord]) -> TenantAnnualRevenue {
    TenantAnnualRevenue::from_records(records)
}

/// Compares `year` against `year - 1` for one property. Tenants present in
/// either year appear once, with the missing side counted as zero. Rows are
/// ordered by descending change.
pub fn change_for_year_pair(
    tenant_annual: &TenantAnnualRevenue,
    property: &str,
    year: i32,
) -> Vec<TenantChangeRow> {
    let empty = BTreeMap::new();
    let current = tenant_annual.tenants(property, year).unwrap_or(&empty);
    let previous = tenant_annual.tenants(property, year - 1).unwrap_or(&empty);

    let tenants: BTreeSet<&String> = current.keys().chain(previous.keys()).collect();

    let mut rows: Vec<TenantChangeRow> = tenants
        .into_iter()
        .map(|tenant| {
            let revenue_curr = current.get(tenant).copied().unwrap_or(0.0);
            let revenue_prev = previous.get(tenant).copied().unwrap_or(0.0);
            TenantChangeRow {
                tenant: tenant.clone(),
                revenue_curr,
                revenue_prev,
                revenue_change: revenue_curr - revenue_prev,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        descending(a.revenue_change, b.revenue_change).then_with(|| a.tenant.cmp(&b.tenant))
    });
    rows
}

/// One change table per property and consecutive pair of its sorted
/// distinct years.
pub fn compute_all_changes(records: &[RevenueRecord]) -> TenantChangeSet {
    let tenant_annual = tenant_annual_revenue(records);
    let mut results = TenantChangeSet::new();

    for property in tenant_annual.properties() {
        let years = tenant_annual.years(property);
        for pair in years.windows(2) {
            let key = ChangeKey::new(property, pair[0], pair[1]);
            let rows = change_for_year_pair(&tenant_annual, property, pair[1]);
            debug!("{}: {} tenants compared", key, rows.len());
            results.insert(key, rows);
        }
    }

    results
}
