//! ChronoGolf/Lightspeed source adapter and fan-out merger
//!
//! The upstream reports capacity per player-count query rather than one
//! canonical availability record, so a single (course, date, holes) search
//! fans out into four concurrent sub-queries (players 4,3,2,1). The merge
//! reconciles those overlapping views into one canonical record per start
//! time without losing the distinct bookable player counts.
//!
//! Merge rules, in fixed descending player-count order regardless of which
//! sub-query resolves first:
//! - entries flagged out-of-capacity or carrying restrictions are dropped
//! - the first entry seen for a start time becomes the canonical record
//!   (its green-fee count seeds `players_available` and the price)
//! - later entries for the same start time only append their green-fee
//!   count to `available_participants`

use chrono::NaiveDate;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;
use crate::harvest::fetcher::TeeTimeFetcher;
use crate::models::{CanonicalTeeTime, Course, TaskResult, UpstreamApi};
use crate::utils::compact_date;

/// Player counts queried per holes configuration, in issue order
const PLAYER_COUNTS: [u32; 4] = [4, 3, 2, 1];

/// Typed view of a course's `external_api_attributes` bag
#[derive(Debug, Clone, Deserialize)]
pub struct ChronoAttributes {
    pub club_id: i64,
    pub course_id: i64,
    pub affiliation_type_id: i64,
    pub club_link_name: String,
    pub course_holes: Vec<u32>,
}

impl ChronoAttributes {
    /// Parse the attribute bag at the adapter boundary
    pub fn from_course(course: &Course) -> Result<Self> {
        serde_json::from_value(course.external_api_attributes.clone()).map_err(|e| {
            crate::error::Error::Other(format!(
                "course {} has malformed ChronoGolf attributes: {e}",
                course.id
            ))
        })
    }
}

/// One upstream availability entry, as returned per player-count query
#[derive(Debug, Clone, Deserialize)]
pub struct RawAvailabilityEntry {
    pub id: i64,
    pub date: String,
    pub start_time: String,
    #[serde(default)]
    pub green_fees: Vec<GreenFee>,
    #[serde(default)]
    pub out_of_capacity: bool,
    #[serde(default)]
    pub restrictions: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GreenFee {
    pub green_fee: f64,
}

/// Canonical slot under construction during the merge
#[derive(Debug)]
struct MergedSlot {
    canonical: RawAvailabilityEntry,
    available_participants: Vec<u32>,
    /// Insertion rank, to keep a deterministic tiebreak before the final sort
    seen_at: usize,
}

/// Host-relative teetimes query for one (date, holes, players) sub-query
fn teetimes_path(attrs: &ChronoAttributes, date: NaiveDate, holes: u32, players: u32) -> String {
    let mut path = format!(
        "/marketplace/clubs/{}/teetimes?date={}&course_id={}&nb_holes={}",
        attrs.club_id,
        date.format("%Y-%m-%d"),
        attrs.course_id,
        holes
    );
    for _ in 0..players {
        path.push_str(&format!(
            "&affiliation_type_ids%5B%5D={}",
            attrs.affiliation_type_id
        ));
    }
    path
}

/// Booking URL for a specific player count at a specific tee time
fn booking_link(
    attrs: &ChronoAttributes,
    holes: u32,
    date: NaiveDate,
    players: u32,
    teetime_id: i64,
) -> String {
    let affiliation_ids = vec![attrs.affiliation_type_id.to_string(); players as usize].join(",");
    format!(
        "https://www.chronogolf.ca/club/{}/booking/?source=club&medium=widget#/teetime/review?course_id={}&nb_holes={}&date={}&affiliation_type_ids={}&teetime_id={}&is_deal=false&new_user=false",
        attrs.club_link_name,
        attrs.course_id,
        holes,
        date.format("%Y-%m-%d"),
        affiliation_ids,
        teetime_id
    )
}

/// Merge per-player-count sub-query results into canonical slots
///
/// `subquery_results` must be in the order the sub-queries were issued
/// (descending player count); the first occurrence of a start time wins.
fn merge_subqueries(subquery_results: Vec<Vec<RawAvailabilityEntry>>) -> Vec<MergedSlot> {
    let mut slots: HashMap<String, MergedSlot> = HashMap::new();
    let mut rank = 0usize;

    for entries in subquery_results {
        for entry in entries {
            if entry.out_of_capacity || !entry.restrictions.is_empty() {
                continue;
            }
            // Entries with no green fees carry neither capacity nor price
            if entry.green_fees.is_empty() {
                continue;
            }

            let participants = entry.green_fees.len() as u32;
            match slots.get_mut(&entry.start_time) {
                Some(slot) => {
                    slot.available_participants.push(participants);
                }
                None => {
                    let key = entry.start_time.clone();
                    slots.insert(
                        key,
                        MergedSlot {
                            canonical: entry,
                            available_participants: vec![participants],
                            seen_at: rank,
                        },
                    );
                    rank += 1;
                }
            }
        }
    }

    let mut merged: Vec<MergedSlot> = slots.into_values().collect();
    merged.sort_by_key(|s| s.seen_at);
    merged
}

/// Turn merged slots into canonical tee times for one holes configuration
fn canonicalize(
    attrs: &ChronoAttributes,
    db_course_id: i64,
    date: NaiveDate,
    holes: u32,
    merged: Vec<MergedSlot>,
) -> Vec<CanonicalTeeTime> {
    let mut tee_times: Vec<CanonicalTeeTime> = merged
        .into_iter()
        .map(|mut slot| {
            slot.available_participants.sort_unstable();
            slot.available_participants.dedup();

            let players_available = slot.canonical.green_fees.len() as u32;
            let price = slot.canonical.green_fees[0].green_fee;

            let booking_links = slot
                .available_participants
                .iter()
                .map(|&players| {
                    (
                        players,
                        booking_link(attrs, holes, date, players, slot.canonical.id),
                    )
                })
                .collect();

            let time_compact = slot.canonical.start_time.replace(':', "");
            let tee_time_id = format!(
                "{}{}{}-{}",
                db_course_id,
                compact_date(date),
                time_compact,
                holes
            );

            CanonicalTeeTime {
                start_datetime: format!("{}T{}", slot.canonical.date, slot.canonical.start_time),
                players_available,
                available_participants: slot.available_participants,
                holes,
                price,
                booking_link: booking_link(attrs, holes, date, players_available, slot.canonical.id),
                booking_links,
                tee_time_id,
            }
        })
        .collect();

    tee_times.sort_by(|a, b| a.start_datetime.cmp(&b.start_datetime));
    tee_times
}

/// Fetch and merge one holes configuration
///
/// A sub-query that exhausts its retries contributes zero entries rather
/// than aborting the configuration; the error count is reported alongside
/// the merged output.
async fn fetch_holes_config(
    fetcher: &TeeTimeFetcher,
    attrs: &ChronoAttributes,
    db_course_id: i64,
    date: NaiveDate,
    holes: u32,
) -> (Vec<CanonicalTeeTime>, u32) {
    let fetches = PLAYER_COUNTS.iter().map(|&players| {
        let path = teetimes_path(attrs, date, holes, players);
        async move { fetcher.fetch_availability(&path, attrs.club_id).await }
    });

    let raw_results = join_all(fetches).await;

    let mut subquery_errors = 0u32;
    let mut parsed: Vec<Vec<RawAvailabilityEntry>> = Vec::with_capacity(PLAYER_COUNTS.len());

    for (players, result) in PLAYER_COUNTS.iter().zip(raw_results) {
        match result {
            Ok(entries) => {
                let entries = entries
                    .into_iter()
                    .filter_map(|value| match serde_json::from_value(value) {
                        Ok(entry) => Some(entry),
                        Err(e) => {
                            tracing::warn!(
                                course_id = db_course_id,
                                players = players,
                                error = %e,
                                "Skipping malformed availability entry"
                            );
                            None
                        }
                    })
                    .collect();
                parsed.push(entries);
            }
            Err(e) => {
                tracing::warn!(
                    course_id = db_course_id,
                    date = %date,
                    holes = holes,
                    players = players,
                    error = %e,
                    "Sub-query failed, contributing zero entries"
                );
                subquery_errors += 1;
                parsed.push(Vec::new());
            }
        }
    }

    let merged = merge_subqueries(parsed);
    (canonicalize(attrs, db_course_id, date, holes, merged), subquery_errors)
}

/// Fetch, merge and canonicalize all tee times for one search task
///
/// Never returns an error: unsupported sources and malformed attribute
/// bags are captured as a failed [`TaskResult`] so a single bad course
/// cannot take down a worker.
pub async fn fetch_course_tee_times(
    course: &Course,
    date: NaiveDate,
    fetcher: &TeeTimeFetcher,
) -> TaskResult {
    if course.external_api != UpstreamApi::ChronoLightspeed {
        return TaskResult::failed(
            course.id,
            date,
            format!(
                "Unsupported external API {} for course {}",
                course.external_api, course.name
            ),
        );
    }

    let attrs = match ChronoAttributes::from_course(course) {
        Ok(attrs) => attrs,
        Err(e) => return TaskResult::failed(course.id, date, e.to_string()),
    };

    let configs = attrs
        .course_holes
        .iter()
        .map(|&holes| fetch_holes_config(fetcher, &attrs, course.id, date, holes));

    let per_config = join_all(configs).await;

    let mut tee_times = Vec::new();
    let mut subquery_errors = 0u32;
    for (times, errors) in per_config {
        tee_times.extend(times);
        subquery_errors += errors;
    }

    let mut result = TaskResult::ok(course.id, date, tee_times);
    result.subquery_errors = subquery_errors;
    result
}
