use anyhow::bail;
use chrono::{Datelike as _, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    /// The first year to include. If `None`, the range is from the beginning
    /// of time.
    pub from_year: Option<i32>,
    /// The last year to include. If `None`, the range is until the end of
    /// time.
    pub to_year: Option<i32>,
}

impl YearRange {
    pub const ALL_TIME: Self = Self { from_year: None, to_year: None };

    pub fn from_strs(from_year: &str, to_year: &str) -> anyhow::Result<Self> {
        let range = Self { from_year: parse_year(from_year)?, to_year: parse_year(to_year)? };
        if let (Some(from), Some(to)) = (range.from_year, range.to_year) {
            if from > to {
                bail!("the first year ({from}) is after the last year ({to})");
            }
        }
        Ok(range)
    }

    pub fn is_all_time(&self) -> bool {
        self.from_year.is_none() && self.to_year.is_none()
    }

    /// Whether an opportunity reported under `year` belongs in this range.
    /// Opportunities without a year only belong to the unbounded range.
    pub fn contains(&self, year: Option<i32>) -> bool {
        match year {
            Some(year) => {
                self.from_year.map_or(true, |from| year >= from)
                    && self.to_year.map_or(true, |to| year <= to)
            }
            None => self.is_all_time(),
        }
    }

    pub fn describe(&self) -> String {
        match (self.from_year, self.to_year) {
            (None, None) => "all years".to_owned(),
            (Some(from), None) => format!("{from} onward"),
            (None, Some(to)) => format!("up to {to}"),
            (Some(from), Some(to)) if from == to => format!("{from}"),
            (Some(from), Some(to)) => format!("{from} through {to}"),
        }
    }
}

fn parse_year(year: &str) -> anyhow::Result<Option<i32>> {
    match year {
        "Forever" => Ok(None),
        "Current" => Ok(Some(current_year())),
        "Previous" => Ok(Some(current_year() - 1)),
        year_string => match year_string.parse::<i32>() {
            Ok(year) if (1000..=9999).contains(&year) => Ok(Some(year)),
            _ => bail!(
                "invalid year \"{year_string}\". Use 'Forever', 'Current', 'Previous', or a four-digit year"
            ),
        },
    }
}

pub fn current_year() -> i32 {
    Utc::now().year()
}
