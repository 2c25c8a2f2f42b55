use chrono::{DateTime, TimeZone};
use log::warn;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::record::AttendanceRecord;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    #[error("No attendance data available")]
    NoData,
}

/// Records inside a gateway read envelope: `{ success, data: { data: { Items } } }`.
/// Items that are not well-formed records are skipped.
pub fn records_from_envelope(envelope: &Value) -> Result<Vec<AttendanceRecord>, DashboardError> {
    let success = envelope.get("success").and_then(Value::as_bool).unwrap_or(false);
    let items = envelope
        .pointer("/data/data/Items")
        .and_then(Value::as_array)
        .filter(|_| success)
        .ok_or(DashboardError::NoData)?;

    Ok(items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            match serde_json::from_value::<AttendanceRecord>(item.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable attendance item {}: {}", index, e);
                    None
                }
            }
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub total: usize,
    /// Check-ins whose timestamp falls on the reference day
    pub today: usize,
    /// Count per department, sorted by department name
    pub departments: BTreeMap<String, usize>,
}

impl DashboardSummary {
    pub fn department_count(&self) -> usize {
        self.departments.len()
    }
}

/// Aggregate records relative to `now`, comparing calendar days in `now`'s
/// time zone. Unparseable timestamps count toward the total only.
pub fn summarize<Tz: TimeZone>(records: &[AttendanceRecord], now: &DateTime<Tz>) -> DashboardSummary {
    let today = now.date_naive();
    let mut departments = BTreeMap::new();
    let mut today_count = 0;

    for record in records {
        *departments.entry(record.department.clone()).or_insert(0) += 1;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&record.timestamp) {
            if ts.with_timezone(&now.timezone()).date_naive() == today {
                today_count += 1;
            }
        }
    }

    DashboardSummary {
        total: records.len(),
        today: today_count,
        departments,
    }
}

/// "lat, lng" back into numbers
pub fn parse_location(location: &str) -> Option<(f64, f64)> {
    let (lat, lng) = location.split_once(',')?;
    Some((lat.trim().parse().ok()?, lng.trim().parse().ok()?))
}

/// Coordinates to four decimals; unparseable locations are shown as stored
pub fn format_coordinates(location: &str) -> String {
    match parse_location(location) {
        Some((lat, lng)) => format!("{:.4}, {:.4}", lat, lng),
        None => location.to_string(),
    }
}

/// Short display form, e.g. "Oct 17, 02:30 PM", in the given zone
pub fn format_timestamp<Tz: TimeZone>(timestamp: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(ts) => ts.with_timezone(tz).format("%b %-d, %I:%M %p").to_string(),
        Err(_) => timestamp.to_string(),
    }
}

/// Horizontal bar chart of check-ins per department
pub fn render_department_chart(summary: &DashboardSummary, width: usize) -> String {
    let max = summary.departments.values().copied().max().unwrap_or(0);
    let label_width = summary
        .departments
        .keys()
        .map(|k| k.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (department, count) in &summary.departments {
        let bar = if max == 0 { 0 } else { (count * width).div_ceil(max) };
        out.push_str(&format!(
            "{:<label_width$} | {} {}\n",
            department,
            "#".repeat(bar),
            count,
        ));
    }
    out
}
