use hist_config::{ConfigurationError, GenericConfiguration};
use tracing::debug;

use crate::{
    axis::Axis,
    error::HistogramError,
    file::{Directory, HistogramFile},
    histogram::{Histogram1D, Histogram2D},
};

/// Name of the nominal (unshifted) systematic variation.
pub const CENTRAL: &str = "central";

/// Books histograms on behalf of a histogram manager.
///
/// All histograms booked by one manager share a location and a naming scheme, both derived from the configuration the
/// manager was created with:
///
/// - `process`: the physics process being analyzed (`signal`, `TTW`, `data_obs`, ...)
/// - `category`: the selection category, which may span several directory levels (`hh_3l_OS_Tight/sel/evt`)
/// - `central_or_shift`: the systematic variation, `central` when absent
///
/// Histograms are placed in `<directory>/<category>/<process>`. For the central value, a histogram is named after its
/// distribution; for a systematic shift, the distribution is prefixed with the shift name, e.g. `CMS_ttHl_JESUp_numJets`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HistogramBooker {
    process: String,
    category: String,
    central_or_shift: String,
}

impl HistogramBooker {
    /// Creates a new `HistogramBooker`.
    pub fn new<P, C, S>(process: P, category: C, central_or_shift: S) -> Self
    where
        P: Into<String>,
        C: Into<String>,
        S: Into<String>,
    {
        Self {
            process: process.into(),
            category: category.into(),
            central_or_shift: central_or_shift.into(),
        }
    }

    /// Creates a new `HistogramBooker` from the given configuration.
    ///
    /// # Errors
    ///
    /// If `process` or `category` is missing, or any of the keys has the wrong type, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, ConfigurationError> {
        let process = config.get_typed::<String>("process")?;
        let category = config.get_typed::<String>("category")?;
        let central_or_shift = config
            .try_get_typed::<String>("central_or_shift")?
            .unwrap_or_else(|| CENTRAL.to_string());

        Ok(Self {
            process,
            category,
            central_or_shift,
        })
    }

    /// Returns the physics process name.
    pub fn process(&self) -> &str {
        &self.process
    }

    /// Returns the selection category.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the systematic variation.
    pub fn central_or_shift(&self) -> &str {
        &self.central_or_shift
    }

    /// Returns `true` if histograms are booked for the nominal value.
    pub fn is_central(&self) -> bool {
        self.central_or_shift.is_empty() || self.central_or_shift == CENTRAL
    }

    /// Returns the histogram name for the given distribution.
    pub fn histogram_name(&self, distribution: &str) -> String {
        if self.is_central() {
            distribution.to_string()
        } else {
            format!("{}_{}", self.central_or_shift, distribution)
        }
    }

    /// Returns the directory, below `parent`, that histograms are booked into.
    ///
    /// # Errors
    ///
    /// If the category or process name is not a valid path, an error is returned.
    pub fn histogram_directory(&self, parent: &Directory) -> Result<Directory, HistogramError> {
        parent.subdirectory(&self.category)?.subdirectory(&self.process)
    }

    /// Books a one-dimensional histogram.
    pub fn book_1d(&self, distribution: &str, title: &str, x_axis: Axis) -> Histogram1D {
        debug!(distribution, central_or_shift = %self.central_or_shift, "Booking 1D histogram.");
        Histogram1D::new(self.histogram_name(distribution), title, x_axis)
    }

    /// Books a two-dimensional histogram.
    pub fn book_2d(&self, distribution: &str, title: &str, x_axis: Axis, y_axis: Axis) -> Histogram2D {
        debug!(distribution, central_or_shift = %self.central_or_shift, "Booking 2D histogram.");
        Histogram2D::new(self.histogram_name(distribution), title, x_axis, y_axis)
    }
}

/// A component that owns a set of histograms.
///
/// Histograms are booked once, filled by component-specific methods, and finally copied into a [`HistogramFile`] for
/// persisting.
pub trait HistManager {
    /// Books all histograms of this manager below `directory`.
    ///
    /// # Errors
    ///
    /// If the histograms were already booked, or the booking directory is invalid, an error is returned.
    fn book_histograms(&mut self, directory: &Directory) -> Result<(), HistogramError>;

    /// Copies all booked histograms into `file`.
    ///
    /// # Errors
    ///
    /// If the histograms were not booked yet, or `file` already holds a histogram of the same name in the same
    /// directory, an error is returned.
    fn write_histograms(&self, file: &mut HistogramFile) -> Result<(), HistogramError>;
}
