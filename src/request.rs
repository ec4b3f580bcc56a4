use crate::columns::resolve_column;
use crate::tokens::{FlagMap, HELP_FLAG};
use crate::{Dataset, PlotError};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const INPUT_FLAG: &str = "-i";
pub const X_FLAG: &str = "-d1";
pub const Y_FLAG: &str = "-d2";
pub const COLOR_FLAG: &str = "-d3";
pub const FACET_FLAG: &str = "-d4";
pub const KIND_FLAG: &str = "-g";
pub const OUTPUT_FLAG: &str = "-o";

const RECOGNIZED_FLAGS: [&str; 8] = [
    HELP_FLAG,
    INPUT_FLAG,
    X_FLAG,
    Y_FLAG,
    COLOR_FLAG,
    FACET_FLAG,
    KIND_FLAG,
    OUTPUT_FLAG,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    Scatter,
    Box,
    Line,
}

impl FromStr for PlotKind {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scatter" => Ok(PlotKind::Scatter),
            "box" => Ok(PlotKind::Box),
            "line" => Ok(PlotKind::Line),
            _ => Err(PlotError::UnsupportedPlotKind(s.to_string())),
        }
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PlotKind::Scatter => "scatter",
            PlotKind::Box => "box",
            PlotKind::Line => "line",
        };
        write!(f, "{}", name)
    }
}

/// A validated unit of work: every dimension names a column of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotRequest {
    pub input: PathBuf,
    pub x: String,
    pub y: String,
    pub color: Option<String>,
    pub facet: Option<String>,
    pub kind: PlotKind,
    pub output: Option<String>,
}

#[derive(Debug)]
pub enum Prepared {
    Help,
    Plot {
        request: PlotRequest,
        dataset: Dataset,
    },
}

/// First value of a recognized flag; a flag given without any value is an error.
fn flag_value<'a>(flags: &'a FlagMap, flag: &'static str) -> Result<Option<&'a str>, PlotError> {
    match flags.get(flag) {
        None => Ok(None),
        Some(values) => values
            .first()
            .map(|v| Some(v.as_str()))
            .ok_or(PlotError::MissingValue(flag)),
    }
}

fn resolve_dimension(
    flags: &FlagMap,
    flag: &'static str,
    dataset: &Dataset,
) -> Result<Option<String>, PlotError> {
    match flag_value(flags, flag)? {
        None => Ok(None),
        Some(name) => match resolve_column(name, dataset.headers()) {
            Some(col) => Ok(Some(col.to_string())),
            None => Err(PlotError::UnknownColumn(name.to_string())),
        },
    }
}

/// Turns parsed flags into a validated request, loading the dataset on the way.
///
/// The input file is read before any dimension is resolved, whatever the
/// order of the flags on the command line. Unrecognized flags are reported
/// and skipped.
pub fn build_request(flags: &FlagMap) -> Result<Prepared, PlotError> {
    if flags.contains(HELP_FLAG) {
        return Ok(Prepared::Help);
    }

    for flag in flags.flags() {
        if !RECOGNIZED_FLAGS.contains(&flag) {
            let warning = PlotError::UnknownFlag(flag.to_string());
            eprintln!("{}", warning);
            log::debug!("skipping: {}", warning);
        }
    }

    let input = flag_value(flags, INPUT_FLAG)?.ok_or(PlotError::MissingInput)?;
    let dataset = Dataset::from_path(input)?;
    if dataset.rows().is_empty() {
        return Err(PlotError::EmptyDataset);
    }

    if !flags.contains(X_FLAG) && !flags.contains(Y_FLAG) {
        return Err(PlotError::MissingAxis);
    }
    // with only one axis given the other names the empty column
    let x = resolve_dimension(flags, X_FLAG, &dataset)?
        .ok_or_else(|| PlotError::UnknownColumn(String::new()))?;
    let y = resolve_dimension(flags, Y_FLAG, &dataset)?
        .ok_or_else(|| PlotError::UnknownColumn(String::new()))?;
    let color = resolve_dimension(flags, COLOR_FLAG, &dataset)?;
    let facet = resolve_dimension(flags, FACET_FLAG, &dataset)?;

    let kind: PlotKind = flag_value(flags, KIND_FLAG)?
        .ok_or(PlotError::MissingValue(KIND_FLAG))?
        .parse()?;
    let output = flag_value(flags, OUTPUT_FLAG)?.map(String::from);

    let request = PlotRequest {
        input: PathBuf::from(input),
        x,
        y,
        color,
        facet,
        kind,
        output,
    };
    log::debug!("{:?}", request);
    Ok(Prepared::Plot { request, dataset })
}
