//! Listing command handlers

use anyhow::{bail, Context, Result};

use tvm_core::dates;
use tvm_core::{EpisodeStatus, Store};

use crate::output::Output;

pub fn programs(store: &Store, output: &Output) -> Result<()> {
    let programs = store.list_programs(dates::today())?;
    output.print_programs(&programs);
    Ok(())
}

/// Series of one program
pub fn series(store: &Store, program_id: &str, output: &Output) -> Result<()> {
    if store.find_program(program_id)?.is_none() {
        bail!("Program not found: {}", program_id);
    }
    let series = store.list_series_by_program(program_id, dates::today())?;
    output.print_series(&series, None);
    Ok(())
}

/// Episodes of one series, in sequence order
pub fn episodes(store: &Store, series_id: &str, output: &Output) -> Result<()> {
    if store.find_series(series_id)?.is_none() {
        bail!("Series not found: {}", series_id);
    }
    let episodes = store.list_episodes_by_series(series_id, dates::today())?;
    output.print_episodes(&episodes);
    Ok(())
}

/// The weekly schedule
pub fn schedule(store: &Store, output: &Output) -> Result<()> {
    let series = store.list_series_by_now_showing(dates::today())?;
    output.print_series(&series, None);
    Ok(())
}

pub fn report(store: &Store, status: &str, output: &Output) -> Result<()> {
    let status = parse_report_status(status)?;
    let series = store.list_series_by_status(status, dates::today())?;
    output.print_series(&series, Some(status));
    Ok(())
}

pub fn incomplete(store: &Store, output: &Output) -> Result<()> {
    let series = store.list_series_by_incomplete(dates::today())?;
    output.print_series(&series, Some(EpisodeStatus::Watched));
    Ok(())
}

pub fn unscheduled(store: &Store, output: &Output) -> Result<()> {
    let episodes = store.list_unscheduled(dates::today())?;
    output.print_episodes(&episodes);
    Ok(())
}

/// Reports need a real status; the unset status has no report
fn parse_report_status(raw: &str) -> Result<EpisodeStatus> {
    let status: EpisodeStatus = raw
        .parse()
        .with_context(|| "Valid statuses: Watched, Recorded, Expected, Missed")?;
    if status == EpisodeStatus::Unset {
        bail!("A status is required: Watched, Recorded, Expected or Missed");
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_status() {
        assert_eq!(
            parse_report_status("recorded").unwrap(),
            EpisodeStatus::Recorded
        );
        assert_eq!(parse_report_status("Missed").unwrap(), EpisodeStatus::Missed);
        assert!(parse_report_status("").is_err());
        assert!(parse_report_status("taped").is_err());
    }
}
