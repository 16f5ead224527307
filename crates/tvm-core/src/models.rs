//! Data models for tvm
//!
//! Programs own Series, Series own Episodes. Ownership is expressed with
//! explicit id fields (`program_id`, `series_id`); rows live in separate
//! tables keyed by string id.
//!
//! The serde representation of these types is the sync wire format:
//! camelCase fields, `statusDate` as "DD-Mon", and an internally tagged
//! [`Entity`] enum carrying the `type` discriminator.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Display names for `Series::now_showing` weekday codes
const WEEKDAYS: [&str; 7] = [
    "Sundays",
    "Mondays",
    "Tuesdays",
    "Wednesdays",
    "Thursdays",
    "Fridays",
    "Saturdays",
];

/// A top-level show
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Program {
    pub id: String,
    #[serde(rename = "programName")]
    pub name: String,
}

impl Program {
    /// Create a new program with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
        }
    }
}

/// A season or strand of a program
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Series {
    pub id: String,
    #[serde(rename = "seriesName")]
    pub name: String,
    pub program_id: String,
    /// Weekday code 0 (Sunday) to 6 (Saturday); `None` when not showing
    pub now_showing: Option<u8>,
}

impl Series {
    /// Create a new series under a program
    pub fn new(program_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            program_id: program_id.into(),
            now_showing: None,
        }
    }

    /// Set the weekday this series is showing on (codes outside 0-6 clear it)
    pub fn set_now_showing(&mut self, weekday: Option<u8>) {
        self.now_showing = weekday.filter(|day| (*day as usize) < WEEKDAYS.len());
    }

    /// Human-readable schedule, e.g. "Tuesdays" or "Not Showing"
    pub fn now_showing_display(&self) -> &'static str {
        now_showing_display(self.now_showing)
    }
}

/// Display name for a weekday code
pub fn now_showing_display(code: Option<u8>) -> &'static str {
    code.and_then(|day| WEEKDAYS.get(day as usize).copied())
        .unwrap_or("Not Showing")
}

/// Watch/record state of an episode
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EpisodeStatus {
    #[default]
    #[serde(rename = "")]
    Unset,
    Watched,
    Recorded,
    Expected,
    Missed,
}

impl EpisodeStatus {
    pub const ALL: [EpisodeStatus; 5] = [
        EpisodeStatus::Unset,
        EpisodeStatus::Watched,
        EpisodeStatus::Recorded,
        EpisodeStatus::Expected,
        EpisodeStatus::Missed,
    ];

    /// The stored and wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeStatus::Unset => "",
            EpisodeStatus::Watched => "Watched",
            EpisodeStatus::Recorded => "Recorded",
            EpisodeStatus::Expected => "Expected",
            EpisodeStatus::Missed => "Missed",
        }
    }
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown episode status '{0}'")]
pub struct ParseStatusError(pub String);

impl FromStr for EpisodeStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EpisodeStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// A single installment of a series
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Episode {
    pub id: String,
    #[serde(rename = "episodeName")]
    pub name: String,
    pub series_id: String,
    pub status: EpisodeStatus,
    /// Absolute locally, "DD-Mon" on the wire
    #[serde(with = "crate::dates::partial_date")]
    pub status_date: Option<NaiveDate>,
    pub unverified: bool,
    pub unscheduled: bool,
    /// Manual ordering within the series
    pub sequence: i64,
}

impl Episode {
    /// Create a new episode under a series
    pub fn new(series_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            series_id: series_id.into(),
            ..Self::default()
        }
    }

    /// Whether the status date takes part in scheduling.
    ///
    /// Watched episodes and episodes without a date have none.
    pub fn has_usable_date(&self) -> bool {
        self.status_date.is_some() && self.status != EpisodeStatus::Watched
    }
}

/// A process-wide key/value setting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Setting {
    pub name: String,
    pub value: String,
}

/// The kinds of entity tracked by the change ledger
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityType {
    Program,
    Series,
    Episode,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Program => "Program",
            EntityType::Series => "Series",
            EntityType::Episode => "Episode",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown entity type '{0}'")]
pub struct ParseEntityTypeError(pub String);

impl FromStr for EntityType {
    type Err = ParseEntityTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Program" => Ok(EntityType::Program),
            "Series" => Ok(EntityType::Series),
            "Episode" => Ok(EntityType::Episode),
            other => Err(ParseEntityTypeError(other.to_string())),
        }
    }
}

/// Any syncable entity, tagged by `type` on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Entity {
    Program(Program),
    Series(Series),
    Episode(Episode),
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::Program(_) => EntityType::Program,
            Entity::Series(_) => EntityType::Series,
            Entity::Episode(_) => EntityType::Episode,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Program(program) => &program.id,
            Entity::Series(series) => &series.id,
            Entity::Episode(episode) => &episode.id,
        }
    }
}

impl From<Program> for Entity {
    fn from(program: Program) -> Self {
        Entity::Program(program)
    }
}

impl From<Series> for Entity {
    fn from(series: Series) -> Self {
        Entity::Series(series)
    }
}

impl From<Episode> for Entity {
    fn from(episode: Episode) -> Self {
        Entity::Episode(episode)
    }
}

// ==================== Listings ====================

/// Episode counts for a series or program, recomputed on every read
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeCounts {
    pub episode_count: i64,
    pub watched_count: i64,
    pub recorded_count: i64,
    pub expected_count: i64,
    pub missed_count: i64,
    /// An expected episode falls inside the warning window
    pub status_warning: bool,
}

impl EpisodeCounts {
    /// The count for one status (`Unset` is whatever is left over)
    pub fn for_status(&self, status: EpisodeStatus) -> i64 {
        match status {
            EpisodeStatus::Watched => self.watched_count,
            EpisodeStatus::Recorded => self.recorded_count,
            EpisodeStatus::Expected => self.expected_count,
            EpisodeStatus::Missed => self.missed_count,
            EpisodeStatus::Unset => {
                self.episode_count
                    - self.watched_count
                    - self.recorded_count
                    - self.expected_count
                    - self.missed_count
            }
        }
    }

    /// Accumulate another set of counts (used to roll series up into programs)
    pub fn add(&mut self, other: &EpisodeCounts) {
        self.episode_count += other.episode_count;
        self.watched_count += other.watched_count;
        self.recorded_count += other.recorded_count;
        self.expected_count += other.expected_count;
        self.missed_count += other.missed_count;
        self.status_warning |= other.status_warning;
    }
}

/// A program with its aggregated counts
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgramListing {
    pub id: String,
    pub name: String,
    pub series_count: i64,
    #[serde(flatten)]
    pub counts: EpisodeCounts,
}

/// A series denormalized with its program name and aggregated counts
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesListing {
    pub id: String,
    pub name: String,
    pub program_id: String,
    pub program_name: String,
    pub now_showing: Option<u8>,
    #[serde(flatten)]
    pub counts: EpisodeCounts,
}

impl SeriesListing {
    pub fn now_showing_display(&self) -> &'static str {
        now_showing_display(self.now_showing)
    }
}

/// An episode denormalized with its series and program names
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeListing {
    #[serde(flatten)]
    pub episode: Episode,
    pub series_name: String,
    pub program_name: String,
    /// Status date re-resolved against today; today when there is no usable date
    pub resolved_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_new_assigns_id() {
        let a = Program::new("Doctor Who");
        let b = Program::new("Doctor Who");
        assert_eq!(a.name, "Doctor Who");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_now_showing_display() {
        let mut series = Series::new("p1", "Series 1");
        assert_eq!(series.now_showing_display(), "Not Showing");

        series.set_now_showing(Some(2));
        assert_eq!(series.now_showing_display(), "Tuesdays");

        series.set_now_showing(Some(9));
        assert_eq!(series.now_showing, None);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Watched".parse::<EpisodeStatus>().unwrap(), EpisodeStatus::Watched);
        assert_eq!("recorded".parse::<EpisodeStatus>().unwrap(), EpisodeStatus::Recorded);
        assert_eq!("".parse::<EpisodeStatus>().unwrap(), EpisodeStatus::Unset);
        assert!("Deleted".parse::<EpisodeStatus>().is_err());
    }

    #[test]
    fn test_usable_date() {
        let mut episode = Episode::new("s1", "Pilot");
        assert!(!episode.has_usable_date());

        episode.status_date = NaiveDate::from_ymd_opt(2024, 3, 5);
        episode.status = EpisodeStatus::Recorded;
        assert!(episode.has_usable_date());

        episode.status = EpisodeStatus::Watched;
        assert!(!episode.has_usable_date());
    }

    #[test]
    fn test_entity_wire_format() {
        let mut episode = Episode::new("s1", "Pilot");
        episode.id = "e1".to_string();
        episode.status = EpisodeStatus::Expected;
        episode.status_date = NaiveDate::from_ymd_opt(2024, 3, 5);
        episode.unscheduled = true;

        let json = serde_json::to_value(Entity::from(episode)).unwrap();
        assert_eq!(json["type"], "Episode");
        assert_eq!(json["id"], "e1");
        assert_eq!(json["episodeName"], "Pilot");
        assert_eq!(json["seriesId"], "s1");
        assert_eq!(json["status"], "Expected");
        assert_eq!(json["statusDate"], "05-Mar");
        assert_eq!(json["unverified"], false);
        assert_eq!(json["unscheduled"], true);
    }

    #[test]
    fn test_entity_decodes_minimal_document() {
        let entity: Entity = serde_json::from_str(r#"{"type":"Series","id":"s9"}"#).unwrap();
        assert_eq!(entity.entity_type(), EntityType::Series);
        assert_eq!(entity.id(), "s9");
    }

    #[test]
    fn test_unset_status_round_trips_as_empty_string() {
        let program = Entity::Program(Program {
            id: "p1".to_string(),
            name: "Chuck".to_string(),
        });
        let json = serde_json::to_string(&program).unwrap();
        assert_eq!(json, r#"{"type":"Program","id":"p1","programName":"Chuck"}"#);

        let status = serde_json::to_string(&EpisodeStatus::Unset).unwrap();
        assert_eq!(status, r#""""#);
    }

    #[test]
    fn test_counts_for_status() {
        let counts = EpisodeCounts {
            episode_count: 6,
            watched_count: 2,
            recorded_count: 1,
            expected_count: 1,
            missed_count: 1,
            status_warning: false,
        };
        assert_eq!(counts.for_status(EpisodeStatus::Watched), 2);
        assert_eq!(counts.for_status(EpisodeStatus::Unset), 1);

        let mut total = EpisodeCounts::default();
        total.add(&counts);
        total.add(&counts);
        assert_eq!(total.episode_count, 12);
    }
}
