use crate::{Outcome, PlotError};
use plotly::{ImageFormat, Plot};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pdf,
    Png,
    Eps,
    Svg,
}

impl OutputFormat {
    /// Used when the output path carries no recognized extension.
    pub const DEFAULT: OutputFormat = OutputFormat::Pdf;

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(OutputFormat::Pdf),
            "png" => Some(OutputFormat::Png),
            "eps" => Some(OutputFormat::Eps),
            "svg" => Some(OutputFormat::Svg),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
            OutputFormat::Eps => "eps",
            OutputFormat::Svg => "svg",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Pdf => ImageFormat::PDF,
            OutputFormat::Png => ImageFormat::PNG,
            OutputFormat::Eps => ImageFormat::EPS,
            OutputFormat::Svg => ImageFormat::SVG,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputTarget {
    Display,
    File { path: PathBuf, format: OutputFormat },
}

/// Size of exported images.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub width: usize,
    pub height: usize,
    pub scale: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            width: 1024,
            height: 680,
            scale: 1.0,
        }
    }
}

/// Keeps a recognized extension, appends the default one otherwise.
pub fn with_default_extension(path: &str) -> (String, OutputFormat) {
    let known = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(OutputFormat::from_extension);
    match known {
        Some(format) => (path.to_string(), format),
        None => (
            format!("{}.{}", path, OutputFormat::DEFAULT.extension()),
            OutputFormat::DEFAULT,
        ),
    }
}

/// Decides where the plot goes, relative to the current working directory.
pub fn resolve_output(output: Option<&str>) -> Result<OutputTarget, PlotError> {
    let cwd = std::env::current_dir()?;
    resolve_output_in(output, &cwd)
}

/// Like [`resolve_output`], with relative paths joined onto `base`.
pub fn resolve_output_in(output: Option<&str>, base: &Path) -> Result<OutputTarget, PlotError> {
    let raw = match output {
        None => return Ok(OutputTarget::Display),
        Some(raw) => raw,
    };
    if raw.trim().is_empty() || raw.ends_with('/') || raw.ends_with(std::path::MAIN_SEPARATOR) {
        return Err(PlotError::InvalidOutputPath(raw.to_string()));
    }
    let (name, format) = with_default_extension(raw);
    let path = base.join(name);

    let has_parent = path
        .parent()
        .is_some_and(|parent| !parent.as_os_str().is_empty());
    if !has_parent || path.file_name().is_none() {
        return Err(PlotError::InvalidOutputPath(path.display().to_string()));
    }
    Ok(OutputTarget::File { path, format })
}

/// Creates the missing directories above `path`.
pub fn prepare_destination(path: &Path) -> Result<(), PlotError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            if !parent.exists() {
                log::info!("creating directory {}", parent.display());
            }
            std::fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Err(PlotError::InvalidOutputPath(path.display().to_string())),
    }
}

/// The side effects of delivering a plot: opening a viewer or writing an
/// image file.
pub trait Exporter {
    fn show(&self, plot: &Plot);

    fn write(
        &self,
        plot: &Plot,
        path: &Path,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> Result<(), PlotError>;
}

/// Browser display and kaleido image export.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kaleido;

impl Exporter for Kaleido {
    fn show(&self, plot: &Plot) {
        plot.show();
    }

    fn write(
        &self,
        plot: &Plot,
        path: &Path,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> Result<(), PlotError> {
        // kaleido forces the lowercase extension of the format onto the file
        let written = path.with_extension(format.extension());
        let export = panic::catch_unwind(AssertUnwindSafe(|| {
            plot.write_image(
                &written,
                format.image_format(),
                options.width,
                options.height,
                options.scale,
            )
        }));
        if export.is_err() {
            return Err(PlotError::SaveFailed(path.display().to_string()));
        }
        if written != path && written.exists() {
            std::fs::rename(&written, path)?;
        }
        Ok(())
    }
}

/// Shows the plot or writes it to its file.
pub fn deliver(
    plot: &Plot,
    target: &OutputTarget,
    options: &RenderOptions,
) -> Result<Outcome, PlotError> {
    deliver_with(plot, target, options, &Kaleido)
}

/// Like [`deliver`], with the side effects left to `exporter`.
///
/// A file left over from an earlier run is removed first, so the plot only
/// counts as saved when the exporter produced a new file.
pub fn deliver_with<E: Exporter>(
    plot: &Plot,
    target: &OutputTarget,
    options: &RenderOptions,
    exporter: &E,
) -> Result<Outcome, PlotError> {
    match target {
        OutputTarget::Display => {
            exporter.show(plot);
            Ok(Outcome::Displayed)
        }
        OutputTarget::File { path, format } => {
            prepare_destination(path)?;
            if path.exists() {
                log::debug!("replacing {}", path.display());
                std::fs::remove_file(path)?;
            }
            exporter.write(plot, path, *format, options)?;
            if !path.exists() {
                return Err(PlotError::SaveFailed(path.display().to_string()));
            }
            println!("Plot saved as '{}'", path.display());
            Ok(Outcome::Saved(path.clone()))
        }
    }
}
