//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use anyhow::{Context, Result};
use chrono::NaiveDate;

/// Convert a "HH:MM" clock-time string to minutes since midnight
pub fn time_string_to_minutes(time_str: &str) -> Result<u32> {
    let (hours, minutes) = time_str
        .split_once(':')
        .with_context(|| format!("Invalid clock time: {time_str}"))?;

    let hours: u32 = hours
        .trim()
        .parse()
        .with_context(|| format!("Invalid hour in clock time: {time_str}"))?;
    let minutes: u32 = minutes
        .trim()
        .parse()
        .with_context(|| format!("Invalid minute in clock time: {time_str}"))?;

    if hours > 23 || minutes > 59 {
        anyhow::bail!("Clock time out of range: {time_str}");
    }

    Ok(hours * 60 + minutes)
}

/// Format a date as the compact "YYYYMMDD" used in composite tee time ids
pub fn compact_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}
