mod charts;
mod columns;
mod output;
mod request;
mod stats;
mod tokens;
mod types;

use rayon::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use charts::{LEGEND_MAX_ROWS, build_plot};
pub use columns::resolve_column;
pub use output::{
    Exporter, Kaleido, OutputFormat, OutputTarget, RenderOptions, deliver, deliver_with,
    prepare_destination, resolve_output, resolve_output_in, with_default_extension,
};
pub use request::{PlotKind, PlotRequest, Prepared, build_request};
pub use stats::{LinearFit, linear_fit};
pub use tokens::{FlagMap, HELP_FLAG, tokenize};
pub use types::ColumnKind;

pub const HELP: &str = "
HELP MENU:
-i : Input File Name. Input file types include .csv, .xlsx, or .json. Include the file name with its extension.
-d1: The x dimension for the graph. This is which column will be the x axis. Dimension names must have quotes around them ONLY IF there is whitespace in the column label!
-d2: The y dimension for the graph. This is which column will be the y axis. Dimension names must have quotes around them ONLY IF there is whitespace in the column label!
-d3: The dimension being used as the legend for the output graph. This flag is optional. Dimension names must have quotes around them ONLY IF there is whitespace in the column label!
-d4: The dimension facets for the graph. This flag is optional. Dimension names must have quotes around them ONLY IF there is whitespace in the column label!
-g : Graph type. One of scatter, box, or line (case-insensitive).
-o : Output File Name. Output file types include .eps, .png, .pdf, or .svg. Without an extension, .pdf is used. Without -o, the graph is displayed.
-h : Prints this help menu. When this argument is used, it has to be the only one.
";

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Invalid token sequence: {0}")]
    InvalidTokenSequence(String),
    #[error("No valid action specified for flag '{0}'")]
    UnknownFlag(String),
    #[error("Column '{0}' does not exist in the dataset")]
    UnknownColumn(String),
    #[error("You must select both an x axis (-d1) and a y axis (-d2)")]
    MissingAxis,
    #[error("No input file provided (-i)")]
    MissingInput,
    #[error("Flag '{0}' requires a value")]
    MissingValue(&'static str),
    #[error("Unsupported graph type '{0}', expected scatter, box or line")]
    UnsupportedPlotKind(String),
    #[error("Unsupported input file '{0}', only .csv and .json can be read")]
    UnsupportedInput(String),
    #[error("Empty dataset provided")]
    EmptyDataset,
    #[error("Could not read dataset: {0}")]
    Dataset(String),
    #[error("Filepath '{0}' does not exist")]
    InvalidOutputPath(String),
    #[error("Could not save plot to '{0}'")]
    SaveFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for PlotError {
    fn from(e: csv::Error) -> Self {
        PlotError::Dataset(e.to_string())
    }
}

impl From<serde_json::Error> for PlotError {
    fn from(e: serde_json::Error) -> Self {
        PlotError::Dataset(e.to_string())
    }
}

/// Column labels plus string cells, as read from the input file.
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Header labels are trimmed; rows are padded or cut to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Dataset { headers, rows }
    }

    /// Reads the dataset, choosing the parser from the file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PlotError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        let dataset = match ext.as_deref() {
            Some("csv") => Dataset::from_csv(path)?,
            Some("json") => Dataset::from_json(path)?,
            _ => return Err(PlotError::UnsupportedInput(path.display().to_string())),
        };
        log::info!(
            "read {} rows and {} columns from {}",
            dataset.rows.len(),
            dataset.headers.len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, PlotError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;
        let headers = rdr.headers()?.iter().map(String::from).collect();
        let rows: Vec<Vec<String>> = rdr
            .records()
            .map(|r| {
                let record = r?;
                Ok(record.iter().map(String::from).collect::<Vec<String>>())
            })
            .collect::<Result<Vec<_>, PlotError>>()?;
        Ok(Dataset::new(headers, rows))
    }

    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, PlotError> {
        let text = std::fs::read_to_string(path)?;
        Dataset::from_json_str(&text)
    }

    /// Accepts a list of records (`[{"a": 1}, ...]`) or a mapping of
    /// columns (`{"a": [1, ...]}` or `{"a": {"0": 1, ...}}`).
    pub fn from_json_str(text: &str) -> Result<Self, PlotError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Array(records) => {
                let mut headers: Vec<String> = Vec::new();
                for record in &records {
                    let obj = record.as_object().ok_or_else(|| {
                        PlotError::Dataset("expected an array of objects".to_string())
                    })?;
                    for key in obj.keys() {
                        if !headers.contains(key) {
                            headers.push(key.clone());
                        }
                    }
                }
                let rows = records
                    .iter()
                    .map(|record| {
                        headers
                            .iter()
                            .map(|h| record.get(h).map(cell_text).unwrap_or_default())
                            .collect()
                    })
                    .collect();
                Ok(Dataset::new(headers, rows))
            }
            Value::Object(columns) => {
                let headers: Vec<String> = columns.keys().cloned().collect();
                let cells: Vec<Vec<String>> = columns
                    .values()
                    .map(|col| match col {
                        Value::Array(values) => Ok(values.iter().map(cell_text).collect()),
                        Value::Object(indexed) => Ok(indexed.values().map(cell_text).collect()),
                        _ => Err(PlotError::Dataset(
                            "expected every column to hold an array or an object".to_string(),
                        )),
                    })
                    .collect::<Result<_, _>>()?;
                let n_rows = cells.iter().map(Vec::len).max().unwrap_or(0);
                let rows = (0..n_rows)
                    .map(|i| {
                        cells
                            .iter()
                            .map(|col| col.get(i).cloned().unwrap_or_default())
                            .collect()
                    })
                    .collect();
                Ok(Dataset::new(headers, rows))
            }
            _ => Err(PlotError::Dataset(
                "expected a JSON array of records or an object of columns".to_string(),
            )),
        }
    }

    /// The schema: column labels in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column_kind(&self, col_idx: usize) -> ColumnKind {
        types::infer_kind(&self.rows, col_idx)
    }

    pub fn column_kinds(&self) -> Vec<(String, ColumnKind)> {
        (0..self.headers.len())
            .into_par_iter()
            .map(|col_idx| (self.headers[col_idx].clone(), self.column_kind(col_idx)))
            .collect()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Help,
    Displayed,
    Saved(PathBuf),
}

/// Runs the whole pipeline on the raw arguments (program name excluded).
pub fn run<S: AsRef<str>>(args: &[S], options: &RenderOptions) -> Result<Outcome, PlotError> {
    let cwd = std::env::current_dir()?;
    run_in(args, options, &cwd, &Kaleido)
}

/// Like [`run`], with output paths relative to `base` and the plot handed to
/// `exporter`.
pub fn run_in<S: AsRef<str>, E: Exporter>(
    args: &[S],
    options: &RenderOptions,
    base: &Path,
    exporter: &E,
) -> Result<Outcome, PlotError> {
    let flags = tokenize(args)?;
    let (request, dataset) = match build_request(&flags)? {
        Prepared::Help => {
            println!("{}", HELP);
            return Ok(Outcome::Help);
        }
        Prepared::Plot { request, dataset } => (request, dataset),
    };
    if log::log_enabled!(log::Level::Debug) {
        log::debug!(
            "schema: {}",
            serde_json::to_string(&dataset.column_kinds()).unwrap_or_default()
        );
    }
    let target = resolve_output_in(request.output.as_deref(), base)?;
    let plot = build_plot(&request, &dataset)?;
    deliver_with(&plot, &target, options, exporter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotly::Plot;
    use std::cell::RefCell;
    use std::io::Write;

    /// Keeps the plots it is given instead of opening or exporting them.
    #[derive(Default)]
    struct Capture {
        shown: RefCell<Vec<String>>,
        written: RefCell<Vec<(PathBuf, OutputFormat)>>,
    }

    impl Exporter for Capture {
        fn show(&self, plot: &Plot) {
            self.shown.borrow_mut().push(plot.to_json());
        }

        fn write(
            &self,
            _plot: &Plot,
            path: &Path,
            format: OutputFormat,
            _options: &RenderOptions,
        ) -> Result<(), PlotError> {
            std::fs::write(path, b"image")?;
            self.written.borrow_mut().push((path.to_path_buf(), format));
            Ok(())
        }
    }

    fn data_file(dir: &Path) -> PathBuf {
        let path = dir.join("data.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Time,Value,Group").unwrap();
        writeln!(file, "1,2.0,a").unwrap();
        writeln!(file, "2,4.1,a").unwrap();
        writeln!(file, "3,5.9,b").unwrap();
        writeln!(file, "4,8.2,b").unwrap();
        path
    }

    #[test]
    fn test_run_saves_colored_scatter() {
        let dir = tempfile::tempdir().unwrap();
        let input = data_file(dir.path());
        let exporter = Capture::default();
        let args = [
            "-i",
            input.to_str().unwrap(),
            "-d1",
            "Time",
            "-d2",
            "Value",
            "-d3",
            "Group",
            "-g",
            "scatter",
            "-o",
            "out.png",
        ];
        let outcome = run_in(&args, &RenderOptions::default(), dir.path(), &exporter).unwrap();
        let expected = dir.path().join("out.png");
        assert_eq!(outcome, Outcome::Saved(expected.clone()));
        assert_eq!(*exporter.written.borrow(), vec![(expected, OutputFormat::Png)]);
        assert!(exporter.shown.borrow().is_empty());
    }

    #[test]
    fn test_run_displays_line_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = data_file(dir.path());
        let exporter = Capture::default();
        let args = ["-i", input.to_str().unwrap(), "-d1", "time", "-d2", "value", "-g", "line"];
        let outcome = run_in(&args, &RenderOptions::default(), dir.path(), &exporter).unwrap();
        assert_eq!(outcome, Outcome::Displayed);
        assert!(exporter.written.borrow().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let shown = exporter.shown.borrow();
        let json: Value = serde_json::from_str(&shown[0]).unwrap();
        assert_eq!(json["data"][0]["mode"], "lines+markers");
        assert_eq!(json["layout"]["xaxis"]["title"]["text"], "Time");
        assert_eq!(json["layout"]["yaxis"]["title"]["text"], "Value");
    }

    #[test]
    fn test_run_unknown_column_renders_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = data_file(dir.path());
        let exporter = Capture::default();
        let args = ["-i", input.to_str().unwrap(), "-d1", "Tme", "-d2", "Value", "-g", "line", "-o", "plots/out"];
        let result = run_in(&args, &RenderOptions::default(), dir.path(), &exporter);
        assert!(matches!(result, Err(PlotError::UnknownColumn(c)) if c == "Tme"));
        assert!(exporter.shown.borrow().is_empty());
        assert!(exporter.written.borrow().is_empty());
        assert!(!dir.path().join("plots").exists());
    }

    #[test]
    fn test_csv_headers_are_trimmed() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, " Time , Value,Group ").unwrap();
        writeln!(file, "1,2.5,a").unwrap();
        writeln!(file, "2,3.5").unwrap();
        let dataset = Dataset::from_path(file.path()).unwrap();
        assert_eq!(dataset.headers(), &["Time", "Value", "Group"]);
        assert_eq!(dataset.rows().len(), 2);
        assert_eq!(dataset.rows()[1], vec!["2", "3.5", ""]);
    }

    #[test]
    fn test_json_records() {
        let dataset =
            Dataset::from_json_str(r#"[{"Time": 1, "Value": 2.5}, {"Time": 2, "Value": null, "Group": "b"}]"#)
                .unwrap();
        assert_eq!(dataset.headers(), &["Time", "Value", "Group"]);
        assert_eq!(dataset.rows()[0], vec!["1", "2.5", ""]);
        assert_eq!(dataset.rows()[1], vec!["2", "", "b"]);
    }

    #[test]
    fn test_json_columns() {
        let dataset =
            Dataset::from_json_str(r#"{"Time": {"0": 1, "1": 2}, "Label": ["x", "y"]}"#).unwrap();
        assert_eq!(dataset.headers(), &["Time", "Label"]);
        assert_eq!(dataset.rows(), &[vec!["1", "x"], vec!["2", "y"]]);
    }

    #[test]
    fn test_json_scalar_is_rejected() {
        assert!(matches!(
            Dataset::from_json_str("42"),
            Err(PlotError::Dataset(_))
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            Dataset::from_path("table.xlsx"),
            Err(PlotError::UnsupportedInput(_))
        ));
        assert!(matches!(
            Dataset::from_path("table"),
            Err(PlotError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn test_column_kinds() {
        let dataset = Dataset::new(
            vec!["Time".into(), "Value".into(), "Group".into()],
            vec![
                vec!["2024-01-01".into(), "1".into(), "a".into()],
                vec!["2024-01-02".into(), "2".into(), "b".into()],
            ],
        );
        assert_eq!(
            dataset.column_kinds(),
            vec![
                ("Time".to_string(), ColumnKind::Temporal),
                ("Value".to_string(), ColumnKind::Numeric),
                ("Group".to_string(), ColumnKind::Categorical),
            ]
        );
    }

    #[test]
    fn test_run_help() {
        let outcome = run(&["-h"], &RenderOptions::default()).unwrap();
        assert_eq!(outcome, Outcome::Help);
    }
}
