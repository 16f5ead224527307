//! Denormalized, aggregated listings
//!
//! SQLite is used here as a plain indexed key/value store: every listing is
//! built without joins by
//!
//! 1. scanning one index for a set of candidate ids,
//! 2. issuing per-candidate counts against the `(status, series_id)` and
//!    `(status, series_id, status_date)` episode indexes,
//! 3. assembling the records in memory, and
//! 4. sorting them deterministically.
//!
//! Counts are never stored. Ordering never depends on scan order: names
//! compare case-insensitively with the id as the final tiebreaker.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rusqlite::Connection;

use super::error::StorageResult;
use super::{episodes, programs, series};
use crate::dates;
use crate::models::{
    Episode, EpisodeCounts, EpisodeListing, EpisodeStatus, ProgramListing, Series, SeriesListing,
};

/// Inclusive start and exclusive end of the status warning range
pub type WarningRange = (NaiveDate, NaiveDate);

/// Looks up program names once per listing
#[derive(Default)]
struct ProgramNames(HashMap<String, String>);

impl ProgramNames {
    fn get(&mut self, conn: &Connection, id: &str) -> StorageResult<String> {
        if let Some(name) = self.0.get(id) {
            return Ok(name.clone());
        }
        let name = programs::name(conn, id)?.unwrap_or_default();
        self.0.insert(id.to_string(), name.clone());
        Ok(name)
    }
}

fn by_name(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn by_program_then_series(a: &SeriesListing, b: &SeriesListing) -> Ordering {
    by_name(&a.program_name, &b.program_name)
        .then_with(|| by_name(&a.name, &b.name))
        .then_with(|| a.id.cmp(&b.id))
}

fn series_listing(
    conn: &Connection,
    series: Series,
    warning: WarningRange,
    names: &mut ProgramNames,
) -> StorageResult<SeriesListing> {
    let counts = episodes::counts_for_series(conn, &series.id, warning)?;
    let program_name = names.get(conn, &series.program_id)?;
    Ok(SeriesListing {
        id: series.id,
        name: series.name,
        program_id: series.program_id,
        program_name,
        now_showing: series.now_showing,
        counts,
    })
}

/// Build listings for candidate ids, skipping ids whose series no longer exists
fn listings_for_ids(
    conn: &Connection,
    ids: impl IntoIterator<Item = String>,
    warning: WarningRange,
) -> StorageResult<Vec<SeriesListing>> {
    let mut names = ProgramNames::default();
    let mut listings = Vec::new();
    // One connection, so counts run in turn; the final sort fixes the order.
    for id in ids {
        if let Some(found) = series::find(conn, &id)? {
            listings.push(series_listing(conn, found, warning, &mut names)?);
        }
    }
    Ok(listings)
}

/// Every program with its series count and rolled-up episode counts
pub fn all_programs(conn: &Connection, warning: WarningRange) -> StorageResult<Vec<ProgramListing>> {
    let mut listings = Vec::new();
    for program in programs::list(conn)? {
        let series_ids = series::ids_by_program(conn, &program.id)?;
        let mut counts = EpisodeCounts::default();
        for series_id in &series_ids {
            counts.add(&episodes::counts_for_series(conn, series_id, warning)?);
        }
        listings.push(ProgramListing {
            id: program.id,
            name: program.name,
            series_count: series_ids.len() as i64,
            counts,
        });
    }

    listings.sort_by(|a, b| by_name(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(listings)
}

/// Series of one program, sorted by name
pub fn series_by_program(
    conn: &Connection,
    program_id: &str,
    warning: WarningRange,
) -> StorageResult<Vec<SeriesListing>> {
    let mut names = ProgramNames::default();
    let mut listings = Vec::new();
    for found in series::list_by_program(conn, program_id)? {
        listings.push(series_listing(conn, found, warning, &mut names)?);
    }

    listings.sort_by(|a, b| by_name(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(listings)
}

/// The schedule: series showing on a weekday, plus any series with recorded
/// or expected episodes. Sorted by weekday (not showing last), program, series.
pub fn series_by_now_showing(
    conn: &Connection,
    warning: WarningRange,
) -> StorageResult<Vec<SeriesListing>> {
    let mut candidates: BTreeSet<String> = series::list_now_showing(conn)?
        .into_iter()
        .map(|s| s.id)
        .collect();
    candidates.extend(episodes::series_ids_with_status(conn, EpisodeStatus::Recorded)?);
    candidates.extend(episodes::series_ids_with_status(conn, EpisodeStatus::Expected)?);

    let mut listings = listings_for_ids(conn, candidates, warning)?;
    listings.sort_by(|a, b| {
        a.now_showing
            .is_none()
            .cmp(&b.now_showing.is_none())
            .then_with(|| a.now_showing.cmp(&b.now_showing))
            .then_with(|| by_program_then_series(a, b))
    });
    Ok(listings)
}

/// Series with at least one episode of `status`
pub fn series_by_status(
    conn: &Connection,
    status: EpisodeStatus,
    warning: WarningRange,
) -> StorageResult<Vec<SeriesListing>> {
    let candidates = episodes::series_ids_with_status(conn, status)?;
    let mut listings = listings_for_ids(conn, candidates, warning)?;
    listings.sort_by(by_program_then_series);
    Ok(listings)
}

/// Series that are partly, but not fully, watched
pub fn series_by_incomplete(
    conn: &Connection,
    warning: WarningRange,
) -> StorageResult<Vec<SeriesListing>> {
    let candidates = episodes::series_ids_with_status(conn, EpisodeStatus::Watched)?;
    let mut listings: Vec<_> = listings_for_ids(conn, candidates, warning)?
        .into_iter()
        .filter(|l| l.counts.watched_count > 0 && l.counts.episode_count > l.counts.watched_count)
        .collect();
    listings.sort_by(by_program_then_series);
    Ok(listings)
}

/// Resolved date of an episode for display and ordering
fn resolved_date(episode: &Episode, today: NaiveDate) -> NaiveDate {
    match episode.status_date {
        Some(date) if episode.has_usable_date() => dates::reresolve(date, today),
        _ => today,
    }
}

/// Episodes of one series, in manual order
pub fn episodes_by_series(
    conn: &Connection,
    series_id: &str,
    today: NaiveDate,
) -> StorageResult<Vec<EpisodeListing>> {
    let owner = series::find(conn, series_id)?;
    let (series_name, program_name) = match &owner {
        Some(owner) => (
            owner.name.clone(),
            programs::name(conn, &owner.program_id)?.unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    };

    let mut listings: Vec<EpisodeListing> = episodes::list_by_series(conn, series_id)?
        .into_iter()
        .map(|episode| EpisodeListing {
            resolved_date: resolved_date(&episode, today),
            episode,
            series_name: series_name.clone(),
            program_name: program_name.clone(),
        })
        .collect();

    listings.sort_by(|a, b| {
        a.episode
            .sequence
            .cmp(&b.episode.sequence)
            .then_with(|| by_name(&a.episode.name, &b.episode.name))
            .then_with(|| a.episode.id.cmp(&b.episode.id))
    });
    Ok(listings)
}

/// Unscheduled episodes by resolved date; episodes without a usable date
/// resolve to today and come first
pub fn unscheduled(conn: &Connection, today: NaiveDate) -> StorageResult<Vec<EpisodeListing>> {
    let mut names = ProgramNames::default();
    let mut owners: HashMap<String, (String, String)> = HashMap::new();
    let mut listings = Vec::new();

    for episode in episodes::list_unscheduled(conn)? {
        if !owners.contains_key(&episode.series_id) {
            let names_for = match series::find(conn, &episode.series_id)? {
                Some(owner) => {
                    let program_name = names.get(conn, &owner.program_id)?;
                    (owner.name, program_name)
                }
                None => (String::new(), String::new()),
            };
            owners.insert(episode.series_id.clone(), names_for);
        }
        let (series_name, program_name) = owners
            .get(&episode.series_id)
            .cloned()
            .unwrap_or_default();

        listings.push(EpisodeListing {
            resolved_date: resolved_date(&episode, today),
            episode,
            series_name,
            program_name,
        });
    }

    listings.sort_by(|a, b| {
        a.episode
            .has_usable_date()
            .cmp(&b.episode.has_usable_date())
            .then_with(|| a.resolved_date.cmp(&b.resolved_date))
            .then_with(|| by_name(&a.program_name, &b.program_name))
            .then_with(|| by_name(&a.series_name, &b.series_name))
            .then_with(|| a.episode.id.cmp(&b.episode.id))
    });
    Ok(listings)
}
