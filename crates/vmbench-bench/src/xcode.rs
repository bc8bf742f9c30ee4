//! Xcode build-time benchmark and build-log parser
//!
//! The workload clones XcodeBenchmark at a pinned commit and runs its
//! build script. The script does not print a machine-readable duration,
//! so the wall time is scraped from the `Started`/`Ended` timestamps in
//! its completion banner.

use crate::Benchmark;
use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;

/// The Xcode workload catalogue
pub const BENCHMARKS: &[Benchmark] = &[Benchmark {
    name: "XcodeBenchmark (d869315)",
    command: "git clone https://github.com/devMEremenko/XcodeBenchmark.git && cd XcodeBenchmark && git reset --hard d86931529ada1df2a1c6646dd85958c360954065 && xcrun simctl list && sh benchmark.sh",
}];

/// Failures while scraping the build log
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The success banner is missing entirely
    #[error("\"** BUILD SUCCEEDED **\" not found on a separate line, make sure Xcode is installed")]
    BuildNotSucceeded,

    /// The banner is present but the timestamps are not
    #[error("cannot find Started and Ended times in the output")]
    TimesNotFound,

    /// A timestamp did not parse as HH:MM:SS
    #[error("cannot parse time {0:?}: unsupported format")]
    BadTime(String),
}

/// Build timing scraped from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Wall-clock start of the build
    pub started: NaiveTime,
    /// Wall-clock end of the build
    pub ended: NaiveTime,
}

impl Output {
    /// Wall time of the build
    ///
    /// Both timestamps are time-of-day values; a build crossing midnight
    /// produces a negative delta, which callers treat as a failed parse.
    #[inline]
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.ended - self.started
    }
}

static BUILD_SUCCEEDED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\*\* BUILD SUCCEEDED \*\*.*$").expect("pattern compiles"));

static TIMES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Started\s+(?P<started>.*)\n.*Ended\s+(?P<ended>.*)\n").expect("pattern compiles")
});

/// Scrape build timing from the benchmark script's output
///
/// # Errors
/// Fails when the success banner is absent (the build did not finish) or
/// the `Started`/`Ended` timestamps cannot be located or parsed.
pub fn parse_output(s: &str) -> Result<Output, ParseError> {
    if !BUILD_SUCCEEDED.is_match(s) {
        return Err(ParseError::BuildNotSucceeded);
    }

    let captures = TIMES.captures(s).ok_or(ParseError::TimesNotFound)?;

    let started = parse_time(&captures["started"])?;
    let ended = parse_time(&captures["ended"])?;

    Ok(Output { started, ended })
}

fn parse_time(raw: &str) -> Result<NaiveTime, ParseError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S")
        .map_err(|_| ParseError::BadTime(raw.to_string()))
}
