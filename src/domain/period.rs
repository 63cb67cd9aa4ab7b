use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Width of the calendar buckets a balance history is sampled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Weekly,
    Monthly,
    Yearly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
            PeriodType::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "weekly" => Some(PeriodType::Weekly),
            "monthly" => Some(PeriodType::Monthly),
            "yearly" => Some(PeriodType::Yearly),
            _ => None,
        }
    }

    /// First day of the period containing `date`. Weeks start on Monday.
    fn start_of(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            PeriodType::Weekly => {
                let weekday = date.weekday().num_days_from_monday();
                date.checked_sub_days(Days::new(weekday as u64))
            }
            PeriodType::Monthly => date.with_day(1),
            PeriodType::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        }
    }

    fn step_forward(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            PeriodType::Weekly => start.checked_add_days(Days::new(7)),
            PeriodType::Monthly => start.checked_add_months(Months::new(1)),
            PeriodType::Yearly => start.checked_add_months(Months::new(12)),
        }
    }

    fn step_back(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            PeriodType::Weekly => start.checked_sub_days(Days::new(7)),
            PeriodType::Monthly => start.checked_sub_months(Months::new(1)),
            PeriodType::Yearly => start.checked_sub_months(Months::new(12)),
        }
    }

    /// Get the period containing the given instant.
    pub fn period_containing(&self, instant: DateTime<Utc>) -> Option<Period> {
        let start = self.start_of(instant.date_naive())?;
        Period::from_start(*self, start)
    }
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A half-open calendar window `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub period_type: PeriodType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    fn from_start(period_type: PeriodType, start: NaiveDate) -> Option<Self> {
        let end = period_type.step_forward(start)?;
        Some(Self {
            period_type,
            start: start.and_hms_opt(0, 0, 0)?.and_utc(),
            end: end.and_hms_opt(0, 0, 0)?.and_utc(),
        })
    }

    /// The period immediately before this one.
    pub fn previous(&self) -> Option<Self> {
        let start = self.period_type.step_back(self.start.date_naive())?;
        Self::from_start(self.period_type, start)
    }

    /// Chart label: "Jan 2024", "2024-W03" or "2024".
    pub fn label(&self) -> String {
        let format = match self.period_type {
            PeriodType::Weekly => "%G-W%V",
            PeriodType::Monthly => "%b %Y",
            PeriodType::Yearly => "%Y",
        };
        self.start.format(format).to_string()
    }
}
