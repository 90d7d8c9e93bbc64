// Lead calendar: appointments grouped by day.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::database::models::lead::Lead;
use crate::leads::view::{display_name, format_address};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("start date must not be after end date")]
    Inverted,
    #[error("calendar range cannot exceed {0} days")]
    TooLong(i64),
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CalendarRange {
    /// Missing bounds default to the current month view: today and the following 30 days.
    pub fn parse(
        start: Option<&str>,
        end: Option<&str>,
        today: NaiveDate,
        max_days: i64,
    ) -> Result<Self, CalendarError> {
        let parse = |raw: &str| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| CalendarError::InvalidDate(raw.to_string()))
        };

        let (start, start_raw) = match start {
            Some(raw) => (parse(raw)?, raw.to_string()),
            None => (today, today.to_string()),
        };
        let end = match end {
            Some(raw) => parse(raw)?,
            None => start
                .checked_add_days(Days::new(30))
                .ok_or_else(|| CalendarError::InvalidDate(start_raw.clone()))?,
        };

        if start > end {
            return Err(CalendarError::Inverted);
        }
        if (end - start).num_days() + 1 > max_days {
            return Err(CalendarError::TooLong(max_days));
        }

        let range = Self { start, end };
        range.bounds()?;
        Ok(range)
    }

    /// Half-open UTC instant bounds covering every day in the range
    pub fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), CalendarError> {
        let from = self.start.and_time(NaiveTime::MIN).and_utc();
        let after_end = self
            .end
            .succ_opt()
            .ok_or_else(|| CalendarError::InvalidDate(self.end.to_string()))?;
        Ok((from, after_end.and_time(NaiveTime::MIN).and_utc()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub lead_id: String,
    pub title: String,
    pub status: String,
    pub address: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub sales_rep_id: Option<String>,
}

impl CalendarEvent {
    pub fn from_lead(lead: &Lead) -> Option<Self> {
        Some(Self {
            lead_id: lead.external_id.clone(),
            title: display_name(lead.first_name.as_deref(), lead.last_name.as_deref()),
            status: lead.status.clone(),
            address: format_address(
                lead.street.as_deref(),
                lead.city.as_deref(),
                lead.state.as_deref(),
                lead.postal_code.as_deref(),
            ),
            starts_at: lead.appointment_at?,
            sales_rep_id: lead.sales_rep_id.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub events: Vec<CalendarEvent>,
}

/// Group events by UTC date, days ascending and events by start time within a day.
pub fn group_by_day(events: Vec<CalendarEvent>) -> Vec<CalendarDay> {
    let mut days: BTreeMap<NaiveDate, Vec<CalendarEvent>> = BTreeMap::new();
    for event in events {
        days.entry(event.starts_at.date_naive()).or_default().push(event);
    }

    days.into_iter()
        .map(|(date, mut events)| {
            events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.lead_id.cmp(&b.lead_id)));
            CalendarDay { date, events }
        })
        .collect()
}
