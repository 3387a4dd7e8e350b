//! Trip window enumeration.

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// A departure/return date pair under consideration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripWindow {
    pub departure: NaiveDate,
    pub return_date: NaiveDate,
}

impl TripWindow {
    pub fn new(departure: NaiveDate, duration_days: u32) -> Self {
        Self {
            departure,
            return_date: departure + Duration::days(i64::from(duration_days)),
        }
    }
}

impl std::fmt::Display for TripWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.departure, self.return_date)
    }
}

/// Inputs for [`generate_trips`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TripPlan {
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub weekday: Weekday,
    pub duration_days: u32,
}

/// Enumerate weekly trip windows inside the plan's date range.
///
/// Starts at the first `weekday` on or after `range_start`, steps by seven
/// days, and keeps a window when its return is on or before `range_end` and
/// its departure is not before `today`.
pub fn generate_trips(plan: &TripPlan, today: NaiveDate) -> Vec<TripWindow> {
    let offset = (7 + plan.weekday.num_days_from_monday()
        - plan.range_start.weekday().num_days_from_monday())
        % 7;
    let mut departure = plan.range_start + Duration::days(i64::from(offset));

    let mut trips = Vec::new();
    while departure <= plan.range_end {
        let trip = TripWindow::new(departure, plan.duration_days);
        if trip.return_date > plan.range_end {
            break;
        }
        if departure >= today {
            trips.push(trip);
        }
        departure += Duration::days(7);
    }
    trips
}

/// [`generate_trips`] relative to the local calendar date.
pub fn upcoming_trips(plan: &TripPlan) -> Vec<TripWindow> {
    generate_trips(plan, Local::now().date_naive())
}
