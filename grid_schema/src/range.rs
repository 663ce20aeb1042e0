//! Time selectors and the windows they resolve to.
//!
//! A request names its time span with a [`TimeSelector`]. Resolution happens
//! in the operator's local zone against an explicit `now`, so that "today"
//! means the operator's today and tests can pin the clock:
//!
//! - [`TimeSelector::Latest`] resolves to no window at all; adapters fetch
//!   their most recent report directly.
//! - [`TimeSelector::Today`] and [`TimeSelector::Date`] resolve to one local
//!   day `[midnight, next midnight)`, which is 23 or 25 hours long on DST
//!   transition days.
//! - [`TimeSelector::Range`] resolves to `[start, end)`; an open end means
//!   "through the end of today".
//!
//! A resolved [`Window`] is then cut into chunks with [`split_window`]
//! following the adapter's [`RangePlan`].

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::{
    error::DstError,
    frequency::Frequency,
    tz::{DstPolicy, localize_with_policy, start_of_day, to_rfc3339},
};

/// Which span of time a request covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSelector {
    /// The most recent data the operator publishes.
    Latest,
    /// The current local day.
    Today,
    /// One local calendar day.
    Date(NaiveDate),
    /// Local wall-clock range, end exclusive.
    Range {
        /// Inclusive start, local wall-clock time.
        start: NaiveDateTime,
        /// Exclusive end; `None` runs through the end of the current local day.
        end: Option<NaiveDateTime>,
    },
}

impl TimeSelector {
    /// Range of whole local days: `[start 00:00, end 00:00)`.
    pub fn days(start: NaiveDate, end: NaiveDate) -> Self {
        TimeSelector::Range {
            start: start.and_time(NaiveTime::MIN),
            end: Some(end.and_time(NaiveTime::MIN)),
        }
    }

    /// Range from `start` through the end of the current local day.
    pub fn since(start: NaiveDate) -> Self {
        TimeSelector::Range {
            start: start.and_time(NaiveTime::MIN),
            end: None,
        }
    }
}

/// A half-open span `[start, end)` in the operator's local zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Inclusive start.
    pub start: DateTime<Tz>,
    /// Exclusive end.
    pub end: DateTime<Tz>,
}

impl Window {
    /// Build a window, rejecting empty or inverted spans.
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Result<Self, RangeError> {
        if end <= start {
            return Err(RangeError::Inverted {
                start: to_rfc3339(&start),
                end: to_rfc3339(&end),
            });
        }
        Ok(Self { start, end })
    }

    /// The local day `[midnight, next midnight)` containing `date`.
    pub fn day(date: NaiveDate, tz: Tz) -> Result<Self, RangeError> {
        let next = date.succ_opt().ok_or(RangeError::OutOfRange)?;
        Window::new(start_of_day(date, tz)?, start_of_day(next, tz)?)
    }

    /// Whether `t` falls inside the window.
    pub fn contains(&self, t: &DateTime<Tz>) -> bool {
        *t >= self.start && *t < self.end
    }

    /// Elapsed time covered by the window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Local calendar dates the window touches, in order.
    ///
    /// The end is exclusive, so a window ending exactly at midnight does not
    /// include the following date.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let first = self.start.date_naive();
        let last_instant = self.end - Duration::nanoseconds(1);
        let last = last_instant.date_naive();
        first.iter_days().take_while(|d| *d <= last).collect()
    }

    /// The same window expressed as UTC instants.
    pub fn to_utc(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start.with_timezone(&Utc), self.end.with_timezone(&Utc))
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", to_rfc3339(&self.start), to_rfc3339(&self.end))
    }
}

/// A request span that cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// End is not after start.
    #[error("range end {end} must be after start {start}")]
    Inverted {
        /// Resolved start (RFC 3339).
        start: String,
        /// Resolved end (RFC 3339).
        end: String,
    },

    /// A date at the edge of what the calendar can represent.
    #[error("date out of range")]
    OutOfRange,

    /// A bound could not be localized.
    #[error(transparent)]
    Dst(#[from] DstError),
}

/// Resolve a selector against `now` in zone `tz`.
///
/// Returns `None` for [`TimeSelector::Latest`].
pub fn resolve_window(
    selector: &TimeSelector,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<Option<Window>, RangeError> {
    let today = now.with_timezone(&tz).date_naive();
    match selector {
        TimeSelector::Latest => Ok(None),
        TimeSelector::Today => Window::day(today, tz).map(Some),
        TimeSelector::Date(date) => Window::day(*date, tz).map(Some),
        TimeSelector::Range { start, end } => {
            // wall-clock bounds inside a DST gap move to the first valid instant
            let start = localize_with_policy(*start, tz, DstPolicy::ShiftForward)?;
            let end = match end {
                Some(end) => localize_with_policy(*end, tz, DstPolicy::ShiftForward)?,
                None => start_of_day(today.succ_opt().ok_or(RangeError::OutOfRange)?, tz)?,
            };
            Window::new(start, end).map(Some)
        }
    }
}

/// Whether the window is exactly the current local day.
pub fn is_today(window: &Window, now: DateTime<Utc>) -> bool {
    let tz = window.start.timezone();
    Window::day(now.with_timezone(&tz).date_naive(), tz)
        .map(|today| today == *window)
        .unwrap_or(false)
}

/// How an adapter cuts a window into report-sized chunks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangePlan {
    /// Chunk cadence; `None` fetches the whole window in one go.
    pub frequency: Option<Frequency>,
    /// Extra cut points, such as archive cut-over dates.
    pub boundaries: Vec<DateTime<Tz>>,
}

impl RangePlan {
    /// Plan with a cadence and no extra cut points.
    pub fn every(frequency: Frequency) -> Self {
        Self {
            frequency: Some(frequency),
            boundaries: Vec::new(),
        }
    }

    /// Plan that fetches the window as one chunk.
    pub fn single() -> Self {
        Self::default()
    }

    /// Add an extra cut point.
    pub fn with_boundary(mut self, at: DateTime<Tz>) -> Self {
        self.boundaries.push(at);
        self
    }
}

/// Split `window` into consecutive chunks following `plan`.
///
/// Chunks tile the window exactly: the first starts at `window.start`, each
/// next one starts where the previous ended, and the last ends at
/// `window.end`.
pub fn split_window(window: &Window, plan: &RangePlan) -> Vec<Window> {
    let mut cuts = vec![window.start];
    if let Some(freq) = plan.frequency {
        let mut t = window.start;
        loop {
            t = freq.next_after(t);
            if t >= window.end {
                break;
            }
            cuts.push(t);
        }
    }
    cuts.extend(
        plan.boundaries
            .iter()
            .filter(|b| window.contains(b) && **b != window.start)
            .copied(),
    );
    cuts.sort();
    cuts.dedup();
    cuts.push(window.end);

    cuts.windows(2)
        .map(|pair| Window {
            start: pair[0],
            end: pair[1],
        })
        .collect()
}
