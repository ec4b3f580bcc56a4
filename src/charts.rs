use crate::request::{PlotKind, PlotRequest};
use crate::stats::{linear_fit, min_and_max};
use crate::types::{self, ColumnKind};
use crate::{Dataset, PlotError};
use plotly::common::{Line, Marker, Mode, Orientation, Title};
use plotly::color::Rgb;
use plotly::layout::themes::PLOTLY_WHITE;
use plotly::layout::{Axis, GridPattern, Layout, LayoutGrid, Legend};
use plotly::{BoxPlot, Plot, Scatter};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Above this many color groups the legend is laid out horizontally so it
/// wraps into rows instead of growing into one long column.
pub const LEGEND_MAX_ROWS: usize = 5;

const MISSING_LEVEL: &str = "NA";

// from https://personal.sron.nl/~pault/ (bright + muted)
const PALETTE: [(u8, u8, u8); 10] = [
    (68, 119, 170),
    (238, 102, 119),
    (34, 136, 51),
    (204, 187, 68),
    (102, 204, 238),
    (170, 51, 119),
    (187, 187, 187),
    (51, 34, 136),
    (17, 119, 51),
    (136, 34, 85),
];

fn palette_color(i: usize) -> Rgb {
    let (r, g, b) = PALETTE[i % PALETTE.len()];
    Rgb::new(r, g, b)
}

#[derive(Debug, Clone, Copy)]
struct Dimension<'a> {
    name: &'a str,
    idx: usize,
    kind: ColumnKind,
}

impl<'a> Dimension<'a> {
    fn new(dataset: &Dataset, name: &'a str) -> Result<Self, PlotError> {
        let idx = dataset
            .column_index(name)
            .ok_or_else(|| PlotError::UnknownColumn(name.to_string()))?;
        Ok(Dimension {
            name,
            idx,
            kind: dataset.column_kind(idx),
        })
    }

    fn level(&self, row: &[String]) -> String {
        let val = &row[self.idx];
        if types::is_missing(val) {
            MISSING_LEVEL.to_string()
        } else {
            val.clone()
        }
    }

    fn value(&self, row: &[String]) -> Value {
        types::to_plot_value(&row[self.idx], self.kind)
    }

    fn position(&self, row: &[String]) -> Option<f64> {
        types::axis_position(&row[self.idx], self.kind)
    }
}

/// One facet panel: its label and the dataset rows drawn in it.
#[derive(Debug)]
struct Panel {
    label: Option<String>,
    rows: Vec<usize>,
}

impl Panel {
    fn x_ref(index: usize) -> String {
        axis_ref("x", index)
    }

    fn y_ref(index: usize) -> String {
        axis_ref("y", index)
    }
}

fn axis_ref(axis: &str, index: usize) -> String {
    if index == 0 {
        axis.to_string()
    } else {
        format!("{}{}", axis, index + 1)
    }
}

/// Distinct labels of a column, numerically ordered when every label is a
/// number, lexically otherwise. The missing label sorts last.
fn levels(dataset: &Dataset, dim: &Dimension) -> Vec<String> {
    let mut levels: Vec<String> = Vec::new();
    for row in dataset.rows() {
        let level = dim.level(row);
        if !levels.contains(&level) {
            levels.push(level);
        }
    }
    let numeric = levels
        .iter()
        .filter(|l| l.as_str() != MISSING_LEVEL)
        .all(|l| types::parse_numeric(l).is_some());
    levels.sort_by(|a, b| match (a.as_str() == MISSING_LEVEL, b.as_str() == MISSING_LEVEL) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) if numeric => {
            let (fa, fb) = (types::parse_numeric(a), types::parse_numeric(b));
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        }
        (false, false) => a.cmp(b),
    });
    levels
}

/// Splits the rows into facet panels. Without a facet dimension there is a
/// single unlabelled panel holding every row.
fn panels(dataset: &Dataset, facet: Option<&Dimension>) -> Vec<Panel> {
    match facet {
        None => vec![Panel {
            label: None,
            rows: (0..dataset.rows().len()).collect(),
        }],
        Some(dim) => levels(dataset, dim)
            .into_iter()
            .map(|level| Panel {
                rows: dataset
                    .rows()
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| dim.level(row) == level)
                    .map(|(i, _)| i)
                    .collect(),
                label: Some(format!("{} = {}", dim.name, level)),
            })
            .collect(),
    }
}

/// Rows where both x and y hold a value.
fn complete_rows<'a>(
    dataset: &'a Dataset,
    rows: &'a [usize],
    x: &'a Dimension,
    y: &'a Dimension,
) -> impl Iterator<Item = &'a Vec<String>> + 'a {
    rows.iter()
        .map(move |&i| &dataset.rows()[i])
        .filter(move |row| !x.value(row).is_null() && !y.value(row).is_null())
}

/// Builds the chart for the request: one construction routine per plot kind,
/// laid out over the facet panels.
pub fn build_plot(request: &PlotRequest, dataset: &Dataset) -> Result<Plot, PlotError> {
    let x = Dimension::new(dataset, &request.x)?;
    let y = Dimension::new(dataset, &request.y)?;
    let color = request
        .color
        .as_deref()
        .map(|name| Dimension::new(dataset, name))
        .transpose()?;
    let facet = request
        .facet
        .as_deref()
        .map(|name| Dimension::new(dataset, name))
        .transpose()?;

    let panels = panels(dataset, facet.as_ref());
    log::info!(
        "building {} plot of {} by {} over {} panel(s)",
        request.kind,
        y.name,
        x.name,
        panels.len()
    );

    let mut plot = Plot::new();
    let legend_entries = match request.kind {
        PlotKind::Scatter => scatter_plot(&mut plot, dataset, &panels, &x, &y, color.as_ref()),
        PlotKind::Box => box_plot(&mut plot, dataset, &panels, &x, &y),
        PlotKind::Line => line_plot(&mut plot, dataset, &panels, &x, &y),
    };
    let legend_color = match request.kind {
        PlotKind::Scatter => color.as_ref(),
        PlotKind::Box | PlotKind::Line => None,
    };
    plot.set_layout(layout(&panels, &x, &y, legend_color, legend_entries));
    Ok(plot)
}

/// Points of (x, y), one trace per color group, each with a least-squares
/// line. Returns the number of legend entries.
fn scatter_plot(
    plot: &mut Plot,
    dataset: &Dataset,
    panels: &[Panel],
    x: &Dimension,
    y: &Dimension,
    color: Option<&Dimension>,
) -> usize {
    let groups: Vec<Option<String>> = match color {
        Some(dim) => levels(dataset, dim).into_iter().map(Some).collect(),
        None => vec![None],
    };
    let fit_possible = x.kind != ColumnKind::Categorical && y.kind == ColumnKind::Numeric;
    if !fit_possible {
        log::warn!(
            "skipping regression line: '{}' ({:?}) against '{}' ({:?}) is not numeric",
            y.name,
            y.kind,
            x.name,
            x.kind
        );
    }

    // a group gets its legend entry on the first panel it has points in
    let mut in_legend: HashSet<usize> = HashSet::new();
    for (p, panel) in panels.iter().enumerate() {
        for (g, group) in groups.iter().enumerate() {
            let rows: Vec<&Vec<String>> = complete_rows(dataset, &panel.rows, x, y)
                .filter(|row| match (color, group) {
                    (Some(dim), Some(level)) => dim.level(row) == *level,
                    _ => true,
                })
                .collect();
            if rows.is_empty() {
                continue;
            }
            let name = group.clone().unwrap_or_else(|| y.name.to_string());
            let show_legend = group.is_some() && in_legend.insert(g);
            let points = Scatter::new(
                rows.iter().map(|row| x.value(row)).collect(),
                rows.iter().map(|row| y.value(row)).collect(),
            )
            .mode(Mode::Markers)
            .marker(Marker::new().color(palette_color(g)))
            .name(&name)
            .legend_group(&name)
            .show_legend(show_legend)
            .x_axis(&Panel::x_ref(p))
            .y_axis(&Panel::y_ref(p));
            plot.add_trace(points);

            if fit_possible {
                if let Some(fit_line) = regression_trace(&rows, x, y, &name, g, p) {
                    plot.add_trace(fit_line);
                }
            }
        }
    }
    groups.iter().filter(|g| g.is_some()).count()
}

fn regression_trace(
    rows: &[&Vec<String>],
    x: &Dimension,
    y: &Dimension,
    name: &str,
    color_index: usize,
    panel: usize,
) -> Option<Box<Scatter<Value, f64>>> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|row| Some((x.position(row)?, y.position(row)?)))
        .unzip();
    let fit = match linear_fit(&xs, &ys) {
        Some(fit) => fit,
        None => {
            log::warn!("not enough distinct points to fit a line for '{}'", name);
            return None;
        }
    };
    let (x0, x1) = min_and_max(&xs)?;
    let to_value = |pos: f64| match x.kind {
        ColumnKind::Temporal => types::millis_to_plot_value(pos),
        _ => serde_json::Number::from_f64(pos)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    };
    log::debug!(
        "fit for '{}': slope {}, intercept {}",
        name,
        fit.slope,
        fit.intercept
    );
    Some(
        Scatter::new(
            vec![to_value(x0), to_value(x1)],
            vec![fit.predict(x0), fit.predict(x1)],
        )
        .mode(Mode::Lines)
        .line(Line::new().color(palette_color(color_index)).width(2.))
        .name(&format!("{} fit", name))
        .legend_group(name)
        .show_legend(false)
        .x_axis(&Panel::x_ref(panel))
        .y_axis(&Panel::y_ref(panel)),
    )
}

/// Box-and-whisker summary of y for every x value. Color is not applied.
fn box_plot(
    plot: &mut Plot,
    dataset: &Dataset,
    panels: &[Panel],
    x: &Dimension,
    y: &Dimension,
) -> usize {
    for (p, panel) in panels.iter().enumerate() {
        let rows: Vec<&Vec<String>> = complete_rows(dataset, &panel.rows, x, y).collect();
        if rows.is_empty() {
            continue;
        }
        let trace = BoxPlot::new_xy(
            rows.iter().map(|row| x.value(row)).collect(),
            rows.iter().map(|row| y.value(row)).collect(),
        )
        .name(y.name)
        .marker(Marker::new().color(palette_color(0)))
        .show_legend(false)
        .x_axis(&Panel::x_ref(p))
        .y_axis(&Panel::y_ref(p));
        plot.add_trace(trace);
    }
    0
}

/// Connected points of (x, y), ordered along x when x is numeric or temporal.
/// Color is not applied.
fn line_plot(
    plot: &mut Plot,
    dataset: &Dataset,
    panels: &[Panel],
    x: &Dimension,
    y: &Dimension,
) -> usize {
    for (p, panel) in panels.iter().enumerate() {
        let mut rows: Vec<&Vec<String>> = complete_rows(dataset, &panel.rows, x, y).collect();
        if rows.is_empty() {
            continue;
        }
        if x.kind != ColumnKind::Categorical {
            rows.sort_by(|a, b| {
                x.position(a)
                    .partial_cmp(&x.position(b))
                    .unwrap_or(Ordering::Equal)
            });
        }
        let trace = Scatter::new(
            rows.iter().map(|row| x.value(row)).collect(),
            rows.iter().map(|row| y.value(row)).collect(),
        )
        .mode(Mode::LinesMarkers)
        .marker(Marker::new().color(palette_color(0)))
        .line(Line::new().color(palette_color(0)))
        .name(y.name)
        .show_legend(false)
        .x_axis(&Panel::x_ref(p))
        .y_axis(&Panel::y_ref(p));
        plot.add_trace(trace);
    }
    0
}

fn axis(title: &str) -> Axis {
    Axis::new().title(Title::new(title))
}

/// Sets the axes of one panel. Layout exposes eight axis pairs; further
/// panels fall back to plotly's automatic axes.
fn panel_axes(layout: Layout, index: usize, x_axis: Axis, y_axis: Axis) -> Layout {
    match index {
        0 => layout.x_axis(x_axis).y_axis(y_axis),
        1 => layout.x_axis2(x_axis).y_axis2(y_axis),
        2 => layout.x_axis3(x_axis).y_axis3(y_axis),
        3 => layout.x_axis4(x_axis).y_axis4(y_axis),
        4 => layout.x_axis5(x_axis).y_axis5(y_axis),
        5 => layout.x_axis6(x_axis).y_axis6(y_axis),
        6 => layout.x_axis7(x_axis).y_axis7(y_axis),
        7 => layout.x_axis8(x_axis).y_axis8(y_axis),
        _ => layout,
    }
}

fn layout(
    panels: &[Panel],
    x: &Dimension,
    y: &Dimension,
    color: Option<&Dimension>,
    legend_entries: usize,
) -> Layout {
    let mut layout = Layout::new().template(&*PLOTLY_WHITE);

    if panels.len() > 1 {
        layout = layout.grid(
            LayoutGrid::new()
                .rows(panels.len())
                .columns(1)
                .pattern(GridPattern::Independent),
        );
    }
    for (p, panel) in panels.iter().enumerate() {
        let y_title = match &panel.label {
            Some(label) => format!("{}<br>{}", y.name, label),
            None => y.name.to_string(),
        };
        layout = panel_axes(layout, p, axis(x.name), axis(&y_title));
    }

    if let Some(dim) = color {
        let mut legend = Legend::new().title(Title::new(dim.name));
        if legend_entries > LEGEND_MAX_ROWS {
            legend = legend.orientation(Orientation::Horizontal);
        }
        layout = layout.legend(legend).show_legend(true);
    }
    layout
}
