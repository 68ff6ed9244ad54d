use super::summary::SummaryRow;

/// Headline figures for the most recent year in a summary.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMetrics {
    pub current_year: i32,
    /// The `TOTAL` row of the current year.
    pub current: SummaryRow,
    /// Present when the year before the current year has a `TOTAL` row.
    pub year_over_year: Option<YearOverYear>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearOverYear {
    pub previous_year: i32,
    /// Percent change in the number of opportunities. `None` if the
    /// previous year had none.
    pub opportunity_growth: Option<f64>,
    /// Percent change in approved revenue. `None` if the previous year had
    /// no approved revenue.
    pub revenue_growth: Option<f64>,
}

impl KeyMetrics {
    /// Labelled values of the current year, in display order. Monetary
    /// values are flagged so that outputs can format them as currency.
    pub fn performance(&self) -> Vec<(&'static str, MetricValue)> {
        let counts = &self.current.counts;
        vec![
            ("Total Opportunities", MetricValue::Count(counts.total_opp)),
            ("Approved Deals", MetricValue::Count(counts.approved)),
            ("Close Rate Standard", MetricValue::Percent(self.current.close_rate_std)),
            ("Average Ticket", MetricValue::Currency(self.current.average_ticket)),
            ("Total Revenue", MetricValue::Currency(counts.approved_revenue)),
            ("Lost Revenue", MetricValue::Currency(counts.lost_revenue)),
            ("Open Pipeline", MetricValue::Currency(counts.open_revenue)),
        ]
    }
}

impl YearOverYear {
    pub fn comparisons(&self) -> Vec<(&'static str, MetricValue)> {
        vec![
            ("Opportunity Growth", MetricValue::Percent(self.opportunity_growth)),
            ("Revenue Growth", MetricValue::Percent(self.revenue_growth)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Count(u64),
    Currency(f64),
    /// A percentage on the 0-100 scale. `None` when it is undefined.
    Percent(Option<f64>),
}

/// Picks the latest year that has a `TOTAL` row. Returns `None` for an empty
/// summary.
pub fn calculate_key_metrics(summary: &[SummaryRow]) -> Option<KeyMetrics> {
    let total_for = |year: i32| {
        summary.iter().find(|row| row.year == year && row.category.is_total())
    };

    let current = summary
        .iter()
        .filter(|row| row.category.is_total())
        .max_by_key(|row| row.year)?
        .clone();
    let current_year = current.year;

    let year_over_year = total_for(current_year - 1).map(|previous| YearOverYear {
        previous_year: previous.year,
        opportunity_growth: growth(
            previous.counts.total_opp as f64,
            current.counts.total_opp as f64,
        ),
        revenue_growth: growth(previous.counts.approved_revenue, current.counts.approved_revenue),
    });

    Some(KeyMetrics { current_year, current, year_over_year })
}

fn growth(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::summary::{SummaryCategory, SummaryCounts};

    fn total(year: i32, total_opp: u64, approved: u64, approved_revenue: f64) -> SummaryRow {
        let counts = SummaryCounts {
            total_opp,
            approved,
            open: total_opp - approved,
            approved_revenue,
            total_amount: approved_revenue,
            ..Default::default()
        };
        SummaryRow {
            year,
            category: SummaryCategory::Total,
            close_rate_std: counts.close_rate_std(),
            close_rate_no_lost: counts.close_rate_no_lost(),
            average_ticket: counts.average_ticket(),
            counts,
        }
    }

    #[test]
    fn empty_summary_has_no_metrics() {
        assert_eq!(calculate_key_metrics(&[]), None);
    }

    #[test]
    fn picks_latest_year_and_compares_with_previous() {
        let mut named = total(2025, 99, 1, 1.0);
        named.category = SummaryCategory::Named("Roofing".to_owned());
        let summary = vec![total(2023, 10, 5, 1000.0), total(2024, 15, 6, 1500.0), named];

        let metrics = calculate_key_metrics(&summary).unwrap();
        assert_eq!(metrics.current_year, 2024);
        assert_eq!(metrics.current.counts.total_opp, 15);

        let yoy = metrics.year_over_year.clone().unwrap();
        assert_eq!(yoy.previous_year, 2023);
        assert_eq!(yoy.opportunity_growth, Some(50.0));
        assert_eq!(yoy.revenue_growth, Some(50.0));

        let performance = metrics.performance();
        assert_eq!(performance[0], ("Total Opportunities", MetricValue::Count(15)));
        assert_eq!(performance[3], ("Average Ticket", MetricValue::Currency(250.0)));
        assert_eq!(performance[2], ("Close Rate Standard", MetricValue::Percent(Some(40.0))));
    }

    #[test]
    fn no_comparison_without_the_immediately_previous_year() {
        let summary = vec![total(2021, 10, 5, 1000.0), total(2024, 15, 6, 1500.0)];
        let metrics = calculate_key_metrics(&summary).unwrap();
        assert_eq!(metrics.year_over_year, None);
    }

    #[test]
    fn growth_from_zero_is_undefined() {
        let summary = vec![total(2023, 4, 0, 0.0), total(2024, 2, 1, 10.0)];
        let yoy = calculate_key_metrics(&summary).unwrap().year_over_year.unwrap();
        assert_eq!(yoy.opportunity_growth, Some(-50.0));
        assert_eq!(yoy.revenue_growth, None);
    }
}
