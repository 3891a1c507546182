use crate::schema::{AnnualRevenueRow, RevenueRecord, TenantRevenueRow};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Revenue per (property, year), ascending, with the change against the
/// previous year present for that property.
pub fn compute_annual_revenue(records: &[RevenueRecord]) -> Vec<AnnualRevenueRow> {
    let mut totals: BTreeMap<(&str, i32), f64> = BTreeMap::new();

    for record in records {
        if let Some(year) = record.year {
            *totals.entry((record.property.as_str(), year)).or_insert(0.0) += record.revenue;
        }
    }

    let mut rows = Vec::with_capacity(totals.len());
    let mut previous: Option<(&str, f64)> = None;

    for ((property, year), revenue) in totals {
        let revenue_change = match previous {
            Some((prev_property, prev_revenue)) if prev_property == property => {
                Some(revenue - prev_revenue)
            }
            _ => None,
        };

        rows.push(AnnualRevenueRow {
            property: property.to_string(),
            year,
            revenue,
            revenue_change,
        });
        previous = Some((property, revenue));
    }

    rows
}

/// Revenue per (property, tenant) across every record, including records
/// whose date column could not be parsed.
pub fn compute_tenant_revenue(records: &[RevenueRecord]) -> Vec<TenantRevenueRow> {
    let mut totals: BTreeMap<(&str, &str), f64> = BTreeMap::new();

    for record in records {
        *totals
            .entry((record.property.as_str(), record.tenant.as_str()))
            .or_insert(0.0) += record.revenue;
    }

    totals
        .into_iter()
        .map(|((property, tenant), revenue)| TenantRevenueRow {
            property: property.to_string(),
            tenant: tenant.to_string(),
            revenue,
        })
        .collect()
}

pub fn total_revenue_by_year(annual: &[AnnualRevenueRow]) -> BTreeMap<i32, f64> {
    let mut totals = BTreeMap::new();
    for row in annual {
        *totals.entry(row.year).or_insert(0.0) += row.revenue;
    }
    totals
}

/// The `n` properties with the highest revenue over all years.
pub fn top_properties(annual: &[AnnualRevenueRow], n: usize) -> Vec<(String, f64)> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for row in annual {
        *totals.entry(row.property.as_str()).or_insert(0.0) += row.revenue;
    }

    let mut ranked: Vec<(String, f64)> = totals
        .into_iter()
        .map(|(property, total)| (property.to_string(), total))
        .collect();
    ranked.sort_by(|a, b| descending(a.1, b.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// The `n` highest-revenue tenants of one property.
pub fn top_tenants<'a>(
    tenant_revenue: &'a [TenantRevenueRow],
    property: &str,
    n: usize,
) -> Vec<&'a TenantRevenueRow> {
    let mut rows: Vec<&TenantRevenueRow> = tenant_revenue
        .iter()
        .filter(|row| row.property == property)
        .collect();
    rows.sort_by(|a, b| descending(a.revenue, b.revenue).then_with(|| a.tenant.cmp(&b.tenant)));
    rows.truncate(n);
    rows
}

/// Largest first, as a total order. A positive NaN sorts ahead of `+inf`.
pub(crate) fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_descending_is_total_with_nan() {
        let mut values = vec![1.0, f64::NAN, f64::INFINITY, -5.0, f64::NAN, 3.0];
        values.sort_by(|a, b| descending(*a, *b));

        assert!(values[0].is_nan() && values[1].is_nan());
        assert_eq!(&values[2..], &[f64::INFINITY, 3.0, 1.0, -5.0]);
    }

    fn record(tenant: &str, property: &str, year: i32, month: u32, revenue: f64) -> RevenueRecord {
        RevenueRecord::new(
            tenant,
            property,
            NaiveDate::from_ymd_opt(year, month, 1),
            revenue,
        )
    }

    #[test]
    fn test_single_property_two_years() {
        let records = vec![
            record("T1", "A", 2022, 1, 60.0),
            record("T2", "A", 2022, 6, 40.0),
            record("T1", "A", 2023, 1, 150.0),
        ];

        let annual = compute_annual_revenue(&records);
        assert_eq!(
            annual,
            vec![
                AnnualRevenueRow {
                    property: "A".to_string(),
                    year: 2022,
                    revenue: 100.0,
                    revenue_change: None,
                },
                AnnualRevenueRow {
                    property: "A".to_string(),
                    year: 2023,
                    revenue: 150.0,
                    revenue_change: Some(50.0),
                },
            ]
        );
    }

    #[test]
    fn test_change_resets_per_property() {
        let records = vec![
            record("T1", "B", 2021, 1, 10.0),
            record("T1", "A", 2020, 1, 5.0),
            record("T1", "A", 2022, 1, 25.0),
            record("T1", "B", 2022, 1, 30.0),
        ];

        let annual = compute_annual_revenue(&records);
        let summary: Vec<(&str, i32, Option<f64>)> = annual
            .iter()
            .map(|r| (r.property.as_str(), r.year, r.revenue_change))
            .collect();

        // Year gaps are compared against the previous year present.
        assert_eq!(
            summary,
            vec![
                ("A", 2020, None),
                ("A", 2022, Some(20.0)),
                ("B", 2021, None),
                ("B", 2022, Some(20.0)),
            ]
        );

        for pair in annual.windows(2) {
            if pair[0].property == pair[1].property {
                assert_eq!(
                    pair[1].revenue_change,
                    Some(pair[1].revenue - pair[0].revenue)
                );
            }
        }
    }

    #[test]
    fn test_undated_records() {
        let records = vec![
            record("T1", "A", 2022, 1, 100.0),
            RevenueRecord::new("T1", "A", None, 7.0),
        ];

        let annual = compute_annual_revenue(&records);
        assert_eq!(annual.len(), 1);
        assert_eq!(annual[0].revenue, 100.0);

        let tenants = compute_tenant_revenue(&records);
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].revenue, 107.0);
    }

    #[test]
    fn test_tenant_revenue_groups_across_years() {
        let records = vec![
            record("T1", "A", 2022, 1, 10.0),
            record("T1", "A", 2023, 1, 15.0),
            record("T2", "A", 2023, 1, 3.0),
            record("T1", "B", 2023, 1, 1.0),
        ];

        let tenants = compute_tenant_revenue(&records);
        assert_eq!(tenants.len(), 3);

        let t1_a = tenants
            .iter()
            .find(|r| r.property == "A" && r.tenant == "T1")
            .unwrap();
        assert_eq!(t1_a.revenue, 25.0);

        let top = top_tenants(&tenants, "A", 10);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].tenant, "T1");
        assert!(top_tenants(&tenants, "Missing", 10).is_empty());
    }

    #[test]
    fn test_totals_and_top_properties() {
        let records = vec![
            record("T1", "A", 2022, 1, 10.0),
            record("T1", "B", 2022, 1, 50.0),
            record("T1", "C", 2023, 1, 30.0),
            record("T1", "A", 2023, 1, 5.0),
        ];
        let annual = compute_annual_revenue(&records);

        let by_year = total_revenue_by_year(&annual);
        assert_eq!(by_year.get(&2022), Some(&60.0));
        assert_eq!(by_year.get(&2023), Some(&35.0));

        let top = top_properties(&annual, 2);
        assert_eq!(top, vec![("B".to_string(), 50.0), ("C".to_string(), 30.0)]);
    }
}
