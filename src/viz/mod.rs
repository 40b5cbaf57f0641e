//! Descriptive statistics and PNG plots.
//!
//! Every plot is titled after its image name. Box plots label each box with
//! its series name, and axes carry end and midpoint ticks.

mod canvas;
pub mod describe;
pub mod plots;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum PlotError {
    /// Nothing to draw for the named image.
    Empty(String),
    Io(io::Error, PathBuf),
    Image(image::ImageError, PathBuf),
}

impl fmt::Display for PlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlotError::Empty(name) => write!(f, "no values to plot for `{name}`"),
            PlotError::Io(e, path) => write!(f, "cannot prepare {}: {e}", path.display()),
            PlotError::Image(e, path) => write!(f, "cannot write {}: {e}", path.display()),
        }
    }
}

impl std::error::Error for PlotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlotError::Empty(_) => None,
            PlotError::Io(e, _) => Some(e),
            PlotError::Image(e, _) => Some(e),
        }
    }
}

/// A named column of values, drawn as one box.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self { name: name.into(), values }
    }
}

/// Writes images as `<image_dir>/<name>.png`.
#[derive(Debug, Clone)]
pub struct Plotter {
    image_dir: PathBuf,
}

impl Plotter {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self { image_dir: image_dir.into() }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.image_dir.join(format!("{name}.png"))
    }
}
