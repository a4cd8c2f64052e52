use crate::model::DutyEntry;
use chrono::{Days, NaiveDate};

/// Number of columns in a roster sheet row.
pub const ROSTER_ROW_WIDTH: usize = 13;

/// Longest span (in days) for which intermediate layover rows are filled in.
/// Longer spans come from misread dates and only get their flight rows.
const MAX_TRIP_DAYS: u64 = 31;

/// One pairing (base out and back) or one standby duty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    pub entries: Vec<DutyEntry>,
}

impl Trip {
    fn new(entries: Vec<DutyEntry>) -> Self {
        Trip { entries }
    }

    pub fn start_date(&self) -> &str {
        self.entries.first().map(|e| e.start_date.as_str()).unwrap_or("")
    }

    pub fn end_date(&self) -> &str {
        self.entries.last().map(|e| e.start_date.as_str()).unwrap_or("")
    }

    pub fn is_standby(&self) -> bool {
        self.entries.first().is_some_and(DutyEntry::is_standby)
    }

    pub fn flights(&self) -> impl Iterator<Item = &DutyEntry> {
        self.entries.iter().filter(|e| e.is_flight())
    }
}

/// Group duty entries into trips around the home base.
///
/// Standby duties are trips of their own. A departure from base opens a
/// trip and an arrival at base closes it. An arrival at base with no open
/// trip (the outbound leg was in the previous roster) stands alone.
pub fn group_trips(entries: &[DutyEntry], base: &str) -> Vec<Trip> {
    let mut trips = Vec::new();
    let mut current: Vec<DutyEntry> = Vec::new();

    for e in entries {
        if e.is_standby() {
            if !current.is_empty() {
                trips.push(Trip::new(std::mem::take(&mut current)));
            }
            trips.push(Trip::new(vec![e.clone()]));
            continue;
        }
        if !e.is_flight() {
            continue;
        }

        let from_base = e.origin() == Some(base);
        let to_base = e.destination() == Some(base);

        if from_base {
            if !current.is_empty() {
                trips.push(Trip::new(std::mem::take(&mut current)));
            }
            current.push(e.clone());
        } else if to_base {
            if current.is_empty() {
                trips.push(Trip::new(vec![e.clone()]));
            } else {
                current.push(e.clone());
                trips.push(Trip::new(std::mem::take(&mut current)));
            }
        } else if !current.is_empty() {
            current.push(e.clone());
        }
    }

    if !current.is_empty() {
        trips.push(Trip::new(current));
    }

    trips
}

/// One-line summary of a trip, or `None` if it has no complete shape
/// (e.g. an outbound leg whose return is not in the roster yet).
pub fn trip_summary(trip: &Trip, base: &str) -> Option<String> {
    let span = format!("{} - {}", trip.start_date(), trip.end_date());

    if trip.is_standby() {
        let e = &trip.entries[0];
        return Some(format!(
            "{span} | {} | {} | {}",
            e.duty_type,
            or_dash(&e.rpt),
            or_dash(&e.sta)
        ));
    }

    let flights: Vec<&DutyEntry> = trip.flights().collect();
    let first = flights.first()?;

    if first.origin() != Some(base) && first.destination() == Some(base) {
        return Some(format!(
            "{span} | {} | - | {} ({})",
            first.sector.as_deref().unwrap_or("-"),
            or_dash(&first.sta),
            first.flight_number.as_deref().unwrap_or("")
        ));
    }

    let outbound = flights.iter().rev().find(|e| e.origin() == Some(base))?;
    let inbound = flights.iter().rev().find(|e| e.destination() == Some(base))?;

    Some(format!(
        "{span} | {} | {} ({}) | {} ({})",
        outbound.destination().unwrap_or("-"),
        or_dash(&outbound.rpt),
        outbound.flight_number.as_deref().unwrap_or(""),
        or_dash(&inbound.sta),
        inbound.flight_number.as_deref().unwrap_or("")
    ))
}

/// Summary lines for all trips that have one.
pub fn trip_lines(trips: &[Trip], base: &str) -> Vec<String> {
    trips.iter().filter_map(|t| trip_summary(t, base)).collect()
}

/// Chat-message block: `Flights:` followed by one line per trip.
pub fn trips_to_message(trips: &[Trip], base: &str) -> String {
    let mut lines = vec!["Flights:".to_string()];
    lines.extend(trip_lines(trips, base));
    lines.join("\n")
}

/// Per-day sheet rows for flying trips, with days spent down route filled
/// in as layover rows.
///
/// Columns: date (MM/DD/YYYY), from, to, type, base report, base arrival,
/// outstation report, outstation arrival, then five empty duration columns.
pub fn trips_to_sheet_rows(trips: &[Trip], base: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();

    for trip in trips {
        let flights: Vec<&DutyEntry> = trip.flights().collect();
        let Some(first) = flights.first() else {
            continue;
        };

        let (Some(start), Some(end)) = (
            parse_roster_date(trip.start_date()),
            parse_roster_date(trip.end_date()),
        ) else {
            tracing::warn!(
                start = trip.start_date(),
                end = trip.end_date(),
                "skipping trip with unreadable roster dates"
            );
            continue;
        };

        let turnaround = flights.len() == 2 && flights[0].start_date == flights[1].start_date;
        let station = match first.origin() {
            Some(o) if o == base => first.destination(),
            other => other,
        }
        .unwrap_or("");

        let dated: Vec<(NaiveDate, &DutyEntry)> = flights
            .iter()
            .filter_map(|e| parse_roster_date(&e.start_date).map(|d| (d, *e)))
            .collect();

        let span = (end - start).num_days();
        let days: Vec<NaiveDate> = if (0..=MAX_TRIP_DAYS as i64).contains(&span) {
            (0..=span as u64)
                .filter_map(|i| start.checked_add_days(Days::new(i)))
                .collect()
        } else {
            let mut only_flights: Vec<NaiveDate> = dated.iter().map(|(d, _)| *d).collect();
            only_flights.dedup();
            only_flights
        };

        for day in days {
            let date = day.format("%m/%d/%Y").to_string();
            let mut flown = dated.iter().filter(|(d, _)| *d == day).peekable();

            if flown.peek().is_none() {
                let mut row = vec![date, String::new(), station.to_string(), "Layover".to_string()];
                row.resize(ROSTER_ROW_WIDTH, String::new());
                rows.push(row);
                continue;
            }

            for (_, e) in flown {
                let from = e.origin().unwrap_or("");
                let at_base = from == base;
                let rpt = format_time(e.rpt.as_deref());
                let sta = format_time(e.sta.as_deref());

                let mut row = vec![
                    date.clone(),
                    from.to_string(),
                    e.destination().unwrap_or("").to_string(),
                    if turnaround { "Turnaround" } else { "Layover" }.to_string(),
                ];
                if at_base {
                    row.extend([rpt, sta, String::new(), String::new()]);
                } else {
                    row.extend([String::new(), String::new(), rpt, sta]);
                }
                row.resize(ROSTER_ROW_WIDTH, String::new());
                rows.push(row);
            }
        }
    }

    rows
}

/// Parse a roster day token such as `01Mar26`.
pub fn parse_roster_date(token: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(token, "%d%b%y").ok()
}

/// `"0640"` → `"06:40"`. Anything that is not four digits is passed through.
pub fn format_time(t: Option<&str>) -> String {
    match t {
        Some(t) if t.len() == 4 && t.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{}:{}", &t[..2], &t[2..])
        }
        Some(t) => t.to_string(),
        None => String::new(),
    }
}

fn or_dash(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("-")
}
