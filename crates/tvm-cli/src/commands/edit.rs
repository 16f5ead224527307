//! Add, edit and remove command handlers

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;

use tvm_core::dates;
use tvm_core::{EntityType, Episode, EpisodeStatus, Program, Series, Store};

use crate::output::Output;

/// Weekday prefixes, indexed by `now_showing` code
const WEEKDAY_PREFIXES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Episode fields settable from the command line
#[derive(Args, Debug, Default, Clone)]
pub struct EpisodeFields {
    /// Watched, Recorded, Expected, Missed or "none"
    #[arg(short, long)]
    pub status: Option<String>,
    /// Status date as DD-Mon (e.g. 05-Mar); "none" clears it
    #[arg(short, long)]
    pub date: Option<String>,
    /// Mark the date as unconfirmed
    #[arg(long)]
    pub unverified: Option<bool>,
    /// Include the episode in the unscheduled report
    #[arg(long)]
    pub unscheduled: Option<bool>,
    /// Position within the series
    #[arg(long)]
    pub sequence: Option<i64>,
}

impl EpisodeFields {
    /// Copy every given field onto `episode`; dates resolve against `today`
    pub fn apply(&self, episode: &mut Episode, today: NaiveDate) -> Result<()> {
        if let Some(ref status) = self.status {
            episode.status = if is_none(status) {
                EpisodeStatus::Unset
            } else {
                status.parse()?
            };
        }
        if let Some(ref date) = self.date {
            episode.status_date = if is_none(date) {
                None
            } else {
                Some(dates::to_absolute(date, today)?)
            };
        }
        if let Some(unverified) = self.unverified {
            episode.unverified = unverified;
        }
        if let Some(unscheduled) = self.unscheduled {
            episode.unscheduled = unscheduled;
        }
        if let Some(sequence) = self.sequence {
            episode.sequence = sequence;
        }
        Ok(())
    }
}

pub fn add_program(store: &mut Store, name: String, output: &Output) -> Result<()> {
    let program = Program::new(name);
    store.save_program(&program)?;
    created(output, "program", &program.id, &program.name);
    Ok(())
}

pub fn add_series(
    store: &mut Store,
    program_id: String,
    name: String,
    showing: Option<&str>,
    output: &Output,
) -> Result<()> {
    if store.find_program(&program_id)?.is_none() {
        bail!("Program not found: {}", program_id);
    }

    let mut series = Series::new(program_id, name);
    if let Some(showing) = showing {
        series.set_now_showing(parse_weekday(showing)?);
    }
    store.save_series(&series)?;
    created(output, "series", &series.id, &series.name);
    Ok(())
}

pub fn add_episode(
    store: &mut Store,
    series_id: String,
    name: String,
    fields: &EpisodeFields,
    output: &Output,
) -> Result<()> {
    if store.find_series(&series_id)?.is_none() {
        bail!("Series not found: {}", series_id);
    }

    let mut episode = Episode::new(series_id, name);
    fields.apply(&mut episode, dates::today())?;
    store.save_episode(&episode)?;
    created(output, "episode", &episode.id, &episode.name);
    Ok(())
}

pub fn edit_series(
    store: &mut Store,
    id: &str,
    name: Option<String>,
    program_id: Option<String>,
    showing: Option<&str>,
    output: &Output,
) -> Result<()> {
    let Some(mut series) = store.find_series(id)? else {
        bail!("Series not found: {}", id);
    };

    if let Some(name) = name {
        series.name = name;
    }
    if let Some(program_id) = program_id {
        if store.find_program(&program_id)?.is_none() {
            bail!("Program not found: {}", program_id);
        }
        series.program_id = program_id;
    }
    if let Some(showing) = showing {
        series.set_now_showing(parse_weekday(showing)?);
    }

    store.save_series(&series)?;
    output.success(&format!("Updated series '{}'", series.name));
    Ok(())
}

pub fn edit_episode(
    store: &mut Store,
    id: &str,
    name: Option<String>,
    fields: &EpisodeFields,
    output: &Output,
) -> Result<()> {
    let Some(mut episode) = store.find_episode(id)? else {
        bail!("Episode not found: {}", id);
    };

    if let Some(name) = name {
        episode.name = name;
    }
    fields.apply(&mut episode, dates::today())?;

    store.save_episode(&episode)?;
    output.success(&format!("Updated episode '{}'", episode.name));
    Ok(())
}

/// Remove an entity and everything under it
pub fn remove(store: &mut Store, kind: &str, id: &str, output: &Output) -> Result<()> {
    let entity_type = parse_kind(kind)?;
    if !store.remove(entity_type, id)? {
        bail!("{} not found: {}", entity_type, id);
    }
    output.success(&format!("Removed {} {}", entity_type, id));
    Ok(())
}

fn created(output: &Output, kind: &str, id: &str, name: &str) {
    if output.is_quiet() {
        println!("{}", id);
    } else if output.is_json() {
        output.json(&serde_json::json!({"id": id, "name": name}));
    } else {
        output.success(&format!("Created {} '{}' ({})", kind, name, id));
    }
}

fn is_none(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("none")
}

/// Parse a weekday as a code (0 = Sunday) or a name; "none" means not showing
fn parse_weekday(raw: &str) -> Result<Option<u8>> {
    let value = raw.trim().to_lowercase();
    if is_none(&value) {
        return Ok(None);
    }

    if let Ok(code) = value.parse::<u8>() {
        if (code as usize) < WEEKDAY_PREFIXES.len() {
            return Ok(Some(code));
        }
        bail!("Weekday code must be 0 (Sunday) to 6 (Saturday), got {}", code);
    }

    WEEKDAY_PREFIXES
        .iter()
        .position(|prefix| value.len() >= 3 && value.starts_with(prefix))
        .map(|code| Some(code as u8))
        .with_context(|| format!("Unknown weekday '{}'", raw))
}

fn parse_kind(raw: &str) -> Result<EntityType> {
    match raw.to_lowercase().as_str() {
        "program" => Ok(EntityType::Program),
        "series" => Ok(EntityType::Series),
        "episode" => Ok(EntityType::Episode),
        _ => bail!("Unknown kind '{}': use program, series or episode", raw),
    }
}
