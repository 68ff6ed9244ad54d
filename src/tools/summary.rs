use std::collections::BTreeMap;
use std::fmt::Display;

use crate::opportunities::PreparedOpportunity;

/// The column opportunities are grouped by within a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryField {
    Division,
    LeadType,
}

impl CategoryField {
    /// The column name used in data-oriented sheets and CSV headers.
    pub fn column_name(&self) -> &'static str {
        match self {
            CategoryField::Division => "Division",
            CategoryField::LeadType => "LeadType",
        }
    }

    /// The column name shown to people.
    pub fn display_name(&self) -> &'static str {
        match self {
            CategoryField::Division => "Division",
            CategoryField::LeadType => "Lead Type",
        }
    }

    fn category_of(&self, opp: &PreparedOpportunity) -> SummaryCategory {
        let value = match self {
            CategoryField::Division => opp.record.division.as_ref(),
            CategoryField::LeadType => opp.record.lead_type.as_ref(),
        };
        match value {
            // a real category must never read like the synthetic rows
            Some(name) if SummaryCategory::is_reserved_label(name) => SummaryCategory::Named(
                format!("{} ({})", name, self.display_name().to_lowercase()),
            ),
            Some(name) => SummaryCategory::Named(name.clone()),
            None => SummaryCategory::Unknown,
        }
    }
}

/// Variant order matters: within a year, named categories come first, then
/// the unknown bucket, then the synthetic total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SummaryCategory {
    Named(String),
    Unknown,
    Total,
}

impl SummaryCategory {
    pub const TOTAL_LABEL: &'static str = "TOTAL";
    pub const UNKNOWN_LABEL: &'static str = "[Unknown]";

    fn is_reserved_label(name: &str) -> bool {
        name == Self::TOTAL_LABEL || name == Self::UNKNOWN_LABEL
    }

    pub fn as_str(&self) -> &str {
        match self {
            SummaryCategory::Named(name) => name,
            SummaryCategory::Unknown => Self::UNKNOWN_LABEL,
            SummaryCategory::Total => Self::TOTAL_LABEL,
        }
    }

    pub fn is_total(&self) -> bool {
        *self == SummaryCategory::Total
    }
}

impl Display for SummaryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryCounts {
    pub total_opp: u64,
    pub approved: u64,
    pub lost: u64,
    pub open: u64,
    pub approved_revenue: f64,
    pub lost_revenue: f64,
    pub open_revenue: f64,
    pub total_amount: f64,
}

impl SummaryCounts {
    fn add(&mut self, opp: &PreparedOpportunity) {
        self.total_opp += 1;
        self.approved += opp.is_approved as u64;
        self.lost += opp.is_lost as u64;
        self.open += opp.is_open as u64;
        self.approved_revenue += opp.approved_amount;
        self.lost_revenue += opp.lost_amount;
        self.open_revenue += opp.open_amount;
        self.total_amount += opp.amount_or_zero();
    }

    /// Approved opportunities as a percentage of all opportunities. `None`
    /// if there are no opportunities.
    pub fn close_rate_std(&self) -> Option<f64> {
        percentage(self.approved, self.total_opp)
    }

    /// Approved opportunities as a percentage of the opportunities that were
    /// not lost. `None` if every opportunity was lost.
    pub fn close_rate_no_lost(&self) -> Option<f64> {
        percentage(self.approved, self.total_opp - self.lost)
    }

    /// Approved revenue per approved opportunity. Zero if nothing was
    /// approved.
    pub fn average_ticket(&self) -> f64 {
        if self.approved == 0 {
            0.0
        } else {
            self.approved_revenue / self.approved as f64
        }
    }
}

fn percentage(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64 * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub year: i32,
    pub category: SummaryCategory,
    pub counts: SummaryCounts,
    pub close_rate_std: Option<f64>,
    pub close_rate_no_lost: Option<f64>,
    pub average_ticket: f64,
}

impl SummaryRow {
    fn new(year: i32, category: SummaryCategory, counts: SummaryCounts) -> Self {
        Self {
            year,
            category,
            close_rate_std: counts.close_rate_std(),
            close_rate_no_lost: counts.close_rate_no_lost(),
            average_ticket: counts.average_ticket(),
            counts,
        }
    }
}

/// Groups opportunities by year and category. Every year that has at least
/// one opportunity also gets a `TOTAL` row, which is sorted after the
/// categories of its year. Opportunities without a year are skipped.
pub fn summarize<'a>(
    opportunities: impl IntoIterator<Item = &'a PreparedOpportunity>,
    field: CategoryField,
) -> Vec<SummaryRow> {
    let mut groups: BTreeMap<(i32, SummaryCategory), SummaryCounts> = BTreeMap::new();
    for opp in opportunities {
        let Some(year) = opp.year else {
            continue;
        };
        groups.entry((year, field.category_of(opp))).or_default().add(opp);
        groups.entry((year, SummaryCategory::Total)).or_default().add(opp);
    }
    groups
        .into_iter()
        .map(|((year, category), counts)| SummaryRow::new(year, category, counts))
        .collect()
}

/// A per-category total as reported by the server's own summary endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSummaryRow {
    pub year: i32,
    pub category: SummaryCategory,
    pub total_opp: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryMismatch {
    pub year: i32,
    pub category: SummaryCategory,
    pub computed: u64,
    pub server: u64,
}

impl Display for SummaryMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / {}: computed {} opportunities but the server reports {}",
            self.year, self.category, self.computed, self.server
        )
    }
}

/// Compares opportunity counts per (year, category) with the server's
/// summaries. A group missing from one side counts as zero there.
pub fn compare_with_server(
    computed: &[SummaryRow],
    server: &[ServerSummaryRow],
) -> Vec<SummaryMismatch> {
    let mut counts: BTreeMap<(i32, SummaryCategory), (u64, u64)> = BTreeMap::new();
    for row in computed {
        counts.entry((row.year, row.category.clone())).or_default().0 += row.counts.total_opp;
    }
    for row in server {
        counts.entry((row.year, row.category.clone())).or_default().1 += row.total_opp;
    }
    counts
        .into_iter()
        .filter(|(_, (computed, server))| computed != server)
        .map(|((year, category), (computed, server))| SummaryMismatch {
            year,
            category,
            computed,
            server,
        })
        .collect()
}
