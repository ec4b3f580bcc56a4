use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

const TEMPORAL_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const PLOT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ColumnKind {
    Numeric,
    Temporal,
    Categorical,
}

pub fn is_missing(val: &str) -> bool {
    val.is_empty() || val == "NA"
}

pub fn parse_numeric(val: &str) -> Option<f64> {
    val.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses the date and datetime layouts commonly found in exported tables,
/// RFC 3339 included. Timezone-aware values are kept in their local time.
pub fn parse_temporal(val: &str) -> Option<NaiveDateTime> {
    let val = val.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(val) {
        return Some(dt.naive_local());
    }
    for fmt in TEMPORAL_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(val, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(val, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Milliseconds since the epoch, the unit plotly uses on date axes.
pub fn temporal_millis(val: &str) -> Option<f64> {
    parse_temporal(val).map(|dt| dt.and_utc().timestamp_millis() as f64)
}

pub fn millis_to_plot_value(ms: f64) -> Value {
    match DateTime::<Utc>::from_timestamp_millis(ms.round() as i64) {
        Some(dt) => Value::String(dt.naive_utc().format(PLOT_DATETIME_FORMAT).to_string()),
        None => Value::Null,
    }
}

pub fn infer_kind(rows: &[Vec<String>], col_idx: usize) -> ColumnKind {
    let mut is_numeric = true;
    let mut is_temporal = true;
    let mut seen = 0usize;

    for row in rows {
        let val = &row[col_idx];
        if is_missing(val) {
            continue;
        }
        seen += 1;
        if is_numeric && parse_numeric(val).is_none() {
            is_numeric = false;
        }
        if is_temporal && parse_temporal(val).is_none() {
            is_temporal = false;
        }
        if !is_numeric && !is_temporal {
            return ColumnKind::Categorical;
        }
    }

    if seen == 0 {
        ColumnKind::Categorical
    } else if is_numeric {
        ColumnKind::Numeric
    } else {
        ColumnKind::Temporal
    }
}

/// Converts one cell into the JSON value handed to plotly. Missing or
/// unparseable cells become `null`, which plotly leaves out of the trace.
pub fn to_plot_value(val: &str, kind: ColumnKind) -> Value {
    if is_missing(val) {
        return Value::Null;
    }
    match kind {
        ColumnKind::Numeric => parse_numeric(val)
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ColumnKind::Temporal => parse_temporal(val)
            .map(|dt| Value::String(dt.format(PLOT_DATETIME_FORMAT).to_string()))
            .unwrap_or(Value::Null),
        ColumnKind::Categorical => Value::String(val.to_string()),
    }
}

/// Numeric position of a cell along an axis of the given kind, used for
/// sorting and regression. Categorical cells have no position.
pub fn axis_position(val: &str, kind: ColumnKind) -> Option<f64> {
    if is_missing(val) {
        return None;
    }
    match kind {
        ColumnKind::Numeric => parse_numeric(val),
        ColumnKind::Temporal => temporal_millis(val),
        ColumnKind::Categorical => None,
    }
}
