//! Time statistics over catchment series.
//!
//! A statistics string is `[<window>:]<stat>[,<stat>...]`. The window is
//! `annual` or a month range such as `Jul-Jun`; stats are `mean`, `median`,
//! `min`, `max` and `quantile(<q>)`. See [`reduce_time`] for how a window
//! changes `min`, `median` and `max`.

mod kernels;
mod reduce;

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

pub use kernels::{nan_max, nan_mean, nan_median, nan_min, nan_quantile};
pub use reduce::reduce_time;

const MONTH_NAMES: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

static QUANTILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^quantile\(([\d.eE+-]+)\)$").expect("quantile pattern is valid"));

/// Month number 1-12 from a full English name or its three-letter
/// abbreviation, ignoring case.
pub fn month_number(txt: &str) -> Result<u32> {
    if txt.is_empty() {
        return Err(Error::config("month input cannot be empty"));
    }
    let lower = txt.to_ascii_lowercase();
    MONTH_NAMES
        .iter()
        .position(|name| *name == lower || (lower.len() == 3 && name.starts_with(&lower)))
        .map(|i| i as u32 + 1)
        .ok_or_else(|| Error::config(format!("cannot evaluate month with {txt:?}")))
}

/// Inclusive month range; `start > end` wraps over the new year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: u32,
    pub end: u32,
}

impl MonthWindow {
    pub const ANNUAL: Self = Self { start: 1, end: 12 };

    /// Number of months covered, 1-12.
    pub fn num_months(&self) -> u32 {
        let n = self.end as i32 - self.start as i32 + 1;
        (if n < 1 { n + 12 } else { n }) as u32
    }

    #[inline]
    pub fn wraps(&self) -> bool { self.start > self.end }

    /// Whether timestamps in month `m` are selected.
    pub fn contains(&self, m: u32) -> bool {
        let n = self.end as i32 - self.start as i32 + 1;
        if n % 12 == 0 {
            true
        } else if n < 1 {
            m >= self.start || m <= self.end
        } else {
            self.start <= m && m <= self.end
        }
    }

    /// Year a timestamp is grouped into: the calendar year, or the previous
    /// one for months before `start` in a wrapping window.
    pub fn group_year(&self, year: i32, month: u32) -> i32 {
        if self.wraps() && month < self.start { year - 1 } else { year }
    }

    /// Display label of a group year, `2001-2002` for wrapping windows.
    pub fn year_label(&self, year: i32) -> String {
        if self.wraps() { format!("{year}-{}", year + 1) } else { year.to_string() }
    }
}

impl FromStr for MonthWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "annual" {
            return Ok(Self::ANNUAL);
        }
        match s.split('-').collect::<Vec<_>>().as_slice() {
            [start, end] => Ok(Self { start: month_number(start)?, end: month_number(end)? }),
            [_] => Err(Error::config(format!(
                "time stats window {s:?} not supported; use 'annual' or a month range"
            ))),
            _ => Err(Error::config(format!("too many '-' for time window: {s}"))),
        }
    }
}

/// One statistic along the time axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stat {
    Mean,
    Median,
    Min,
    Max,
    Quantile(f64),
}

impl Stat {
    /// Statistics that pick a representative year when a window is given.
    pub fn ranks_years(&self) -> bool {
        matches!(self, Self::Median | Self::Min | Self::Max)
    }
}

impl FromStr for Stat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            _ if s.starts_with("quantile(") => {
                let q = QUANTILE_RE
                    .captures(s)
                    .and_then(|c| c[1].parse::<f64>().ok())
                    .ok_or_else(|| Error::config(format!("error reading {s}")))?;
                if !(0.0..=1.0).contains(&q) {
                    return Err(Error::config(format!("quantile must be between 0 and 1; found {q}")));
                }
                Ok(Self::Quantile(q))
            }
            _ => Err(Error::config(format!("unhandled time stats {s:?}"))),
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => f.write_str("mean"),
            Self::Median => f.write_str("median"),
            Self::Min => f.write_str("min"),
            Self::Max => f.write_str("max"),
            Self::Quantile(q) => write!(f, "quantile({q})"),
        }
    }
}

/// Parsed statistics string: an optional month window and the statistics
/// to compute, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStats {
    window: Option<MonthWindow>,
    stats: Vec<Stat>,
}

impl TimeStats {
    pub fn new(window: Option<MonthWindow>, stats: Vec<Stat>) -> Result<Self> {
        if stats.is_empty() {
            return Err(Error::config("no time statistics requested"));
        }
        Ok(Self { window, stats })
    }

    /// Explicit window, if one was given.
    #[inline]
    pub fn window(&self) -> Option<MonthWindow> { self.window }

    #[inline]
    pub fn stats(&self) -> &[Stat] { &self.stats }

    /// Month selection; all months without an explicit window.
    pub fn months(&self) -> MonthWindow {
        self.window.unwrap_or(MonthWindow::ANNUAL)
    }

    /// True when min, median and max rank whole years.
    pub fn ranks_years(&self) -> bool {
        self.window.is_some() && self.stats.iter().any(Stat::ranks_years)
    }
}

impl FromStr for TimeStats {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (window, stats) = match s.split_once(':') {
            Some((_, rest)) if rest.contains(':') => {
                return Err(Error::config("expected one ':' in time stats"));
            }
            Some((window, stats)) => (Some(window.trim().parse::<MonthWindow>()?), stats),
            None => (None, s),
        };
        let stats = stats
            .split(',')
            .map(|t| t.trim().parse::<Stat>())
            .collect::<Result<Vec<_>>>()?;
        Self::new(window, stats)
    }
}

impl fmt::Display for TimeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(w) = self.window {
            if w == MonthWindow::ANNUAL {
                f.write_str("annual:")?;
            } else {
                let abbr = |m: u32| &MONTH_NAMES[m as usize - 1][..3];
                write!(f, "{}-{}:", abbr(w.start), abbr(w.end))?;
            }
        }
        let names: Vec<String> = self.stats.iter().map(Stat::to_string).collect();
        f.write_str(&names.join(","))
    }
}
