//! Calendar data requests: the value every cache key and backend query is derived from.

use crate::errors::CalendarError;
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarView {
    Day,
    Week,
    Month,
}

impl CalendarView {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CalendarView::Day => "day",
            CalendarView::Week => "week",
            CalendarView::Month => "month",
        }
    }
}

impl fmt::Display for CalendarView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalendarView {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(CalendarView::Day),
            "week" => Ok(CalendarView::Week),
            "month" => Ok(CalendarView::Month),
            other => Err(CalendarError::InvalidRequest(format!("unknown view: {other}"))),
        }
    }
}

/// Which neighbouring range to derive for prefetching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A request for calendar data over a date range.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarDataRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub view: CalendarView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barber_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default)]
    pub include_details: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

impl CalendarDataRequest {
    #[must_use]
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, view: CalendarView) -> Self {
        Self {
            start_date,
            end_date,
            view,
            barber_id: None,
            location_id: None,
            include_details: false,
            filters: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_barber(mut self, barber_id: impl Into<String>) -> Self {
        self.barber_id = Some(barber_id.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, include: bool) -> Self {
        self.include_details = include;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Rejects inverted ranges.
    ///
    /// # Errors
    /// Returns `InvalidRequest` when `start_date` is after `end_date`.
    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.start_date > self.end_date {
            return Err(CalendarError::InvalidRequest(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }

    /// Deterministic cache key.
    ///
    /// Every field is encoded as one JSON array, so two requests share a key
    /// only when they are equal. Filters are a `BTreeMap` and always encode in
    /// key order.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let parts = (
            self.start_date.format(DATE_FMT).to_string(),
            self.end_date.format(DATE_FMT).to_string(),
            self.view.as_str(),
            self.barber_id.as_deref(),
            self.location_id.as_deref(),
            self.include_details,
            &self.filters,
        );
        // Tuples of strings, options, bools and string maps always serialize.
        let encoded = serde_json::to_string(&parts).unwrap_or_default();
        format!("calendar:{encoded}")
    }

    /// Query parameters for the backend endpoint.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("start_date".to_string(), self.start_date.format(DATE_FMT).to_string()),
            ("end_date".to_string(), self.end_date.format(DATE_FMT).to_string()),
            ("view".to_string(), self.view.as_str().to_string()),
        ];
        if let Some(b) = &self.barber_id {
            pairs.push(("barber_id".to_string(), b.clone()));
        }
        if let Some(l) = &self.location_id {
            pairs.push(("location_id".to_string(), l.clone()));
        }
        pairs.push(("include_details".to_string(), self.include_details.to_string()));
        for (k, v) in &self.filters {
            pairs.push((k.clone(), v.clone()));
        }
        pairs
    }

    /// Number of days covered, inclusive of both ends.
    #[must_use]
    pub fn span_days(&self) -> u64 {
        let days = (self.end_date - self.start_date).num_days();
        if days < 0 { 1 } else { days as u64 + 1 }
    }

    /// The neighbouring range for the same view and filters.
    ///
    /// Day and week views move by the range length; month views move by one
    /// calendar month and cover that whole month. Returns `None` when the
    /// shifted range falls outside chrono's supported dates.
    #[must_use]
    pub fn adjacent(&self, direction: Direction) -> Option<Self> {
        let (start, end) = match self.view {
            CalendarView::Day | CalendarView::Week => {
                let step = Days::new(self.span_days());
                match direction {
                    Direction::Forward => (
                        self.start_date.checked_add_days(step)?,
                        self.end_date.checked_add_days(step)?,
                    ),
                    Direction::Backward => (
                        self.start_date.checked_sub_days(step)?,
                        self.end_date.checked_sub_days(step)?,
                    ),
                }
            }
            CalendarView::Month => {
                let start = match direction {
                    Direction::Forward => self.start_date.checked_add_months(Months::new(1))?,
                    Direction::Backward => self.start_date.checked_sub_months(Months::new(1))?,
                };
                let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
                (start, end)
            }
        };
        let mut next = self.clone();
        next.start_date = start;
        next.end_date = end;
        Some(next)
    }

    /// Whether this request's range intersects `[start, end]`.
    #[must_use]
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

/// Parses `YYYY-MM-DD`.
///
/// # Errors
/// Returns `InvalidRequest` for anything else.
pub fn parse_date(s: &str) -> Result<NaiveDate, CalendarError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FMT)
        .map_err(|e| CalendarError::InvalidRequest(format!("bad date {s:?}: {e}")))
}
