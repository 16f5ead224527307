//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use tvm_core::dates;
use tvm_core::{EpisodeListing, EpisodeStatus, ProgramListing, SeriesListing};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print any serializable value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode JSON output: {}", e),
        }
    }

    /// Print programs with their rolled-up counts
    pub fn print_programs(&self, programs: &[ProgramListing]) {
        match self.format {
            OutputFormat::Human => {
                if programs.is_empty() {
                    println!("No programs found.");
                    return;
                }
                for program in programs {
                    println!(
                        "{} | {:<30} | {} series | {}{}",
                        short_id(&program.id),
                        truncate(&program.name, 30),
                        program.series_count,
                        progress(program.counts.watched_count, program.counts.episode_count),
                        warning_marker(program.counts.status_warning),
                    );
                }
                println!("\n{} program(s)", programs.len());
            }
            OutputFormat::Json => self.json(programs),
            OutputFormat::Quiet => {
                for program in programs {
                    println!("{}", program.id);
                }
            }
        }
    }

    /// Print series listings; `status` adds a column with that status' count
    pub fn print_series(&self, series: &[SeriesListing], status: Option<EpisodeStatus>) {
        match self.format {
            OutputFormat::Human => {
                if series.is_empty() {
                    println!("No series found.");
                    return;
                }
                for listing in series {
                    let extra = match status {
                        Some(status) => format!(
                            " | {} {}",
                            listing.counts.for_status(status),
                            status_label(status)
                        ),
                        None => String::new(),
                    };
                    println!(
                        "{} | {:<12} | {} / {} | {}{}{}",
                        short_id(&listing.id),
                        listing.now_showing_display(),
                        truncate(&listing.program_name, 25),
                        truncate(&listing.name, 25),
                        progress(listing.counts.watched_count, listing.counts.episode_count),
                        extra,
                        warning_marker(listing.counts.status_warning),
                    );
                }
                println!("\n{} series", series.len());
            }
            OutputFormat::Json => self.json(series),
            OutputFormat::Quiet => {
                for listing in series {
                    println!("{}", listing.id);
                }
            }
        }
    }

    /// Print episode listings with their resolved dates
    pub fn print_episodes(&self, episodes: &[EpisodeListing]) {
        match self.format {
            OutputFormat::Human => {
                if episodes.is_empty() {
                    println!("No episodes found.");
                    return;
                }
                for listing in episodes {
                    let episode = &listing.episode;
                    let date = if episode.has_usable_date() {
                        dates::to_partial(listing.resolved_date)
                    } else {
                        "      ".to_string()
                    };
                    let mut flags = Vec::new();
                    if episode.unverified {
                        flags.push("unverified");
                    }
                    if episode.unscheduled {
                        flags.push("unscheduled");
                    }
                    println!(
                        "{} | {} | {:<9} | {} / {} / {}{}",
                        short_id(&episode.id),
                        date,
                        status_label(episode.status),
                        truncate(&listing.program_name, 20),
                        truncate(&listing.series_name, 20),
                        truncate(&episode.name, 30),
                        if flags.is_empty() {
                            String::new()
                        } else {
                            format!(" ({})", flags.join(", "))
                        },
                    );
                }
                println!("\n{} episode(s)", episodes.len());
            }
            OutputFormat::Json => self.json(episodes),
            OutputFormat::Quiet => {
                for listing in episodes {
                    println!("{}", listing.episode.id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (suppressed in quiet mode)
    pub fn warning(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("⚠ {}", message),
            OutputFormat::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({"status": "warning", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn status_label(status: EpisodeStatus) -> &'static str {
    match status {
        EpisodeStatus::Unset => "-",
        other => other.as_str(),
    }
}

fn warning_marker(warning: bool) -> &'static str {
    if warning {
        " !"
    } else {
        ""
    }
}

/// "watched/total" progress summary
fn progress(watched: i64, total: i64) -> String {
    format!("{}/{} watched", watched, total)
}

/// First eight characters of an id
fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
