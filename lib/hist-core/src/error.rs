use std::path::PathBuf;

use snafu::Snafu;

/// A histogram error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum HistogramError {
    /// Axis binning was invalid.
    #[snafu(display("Invalid axis binning ({} bins over [{}, {})): {}", num_bins, min, max, reason))]
    InvalidAxis {
        /// Requested number of bins.
        num_bins: usize,

        /// Requested lower edge.
        min: f64,

        /// Requested upper edge.
        max: f64,

        /// Why the binning was rejected.
        reason: &'static str,
    },

    /// Stored bin contents did not match the histogram's binning.
    #[snafu(display(
        "Histogram '{}' holds {} values in '{}', but its binning needs {}.",
        name,
        actual,
        field,
        expected
    ))]
    InvalidContents {
        /// Histogram name.
        name: String,

        /// Which per-bin field was malformed.
        field: &'static str,

        /// Number of slots required by the axes, including flow bins.
        expected: usize,

        /// Number of slots actually present.
        actual: usize,
    },

    /// A histogram manager was used before its histograms were booked.
    #[snafu(display("Histograms of '{}' must be booked before they can be filled.", manager))]
    NotBooked {
        /// Name of the histogram manager.
        manager: &'static str,
    },

    /// A histogram manager was booked more than once.
    #[snafu(display("Histograms of '{}' have already been booked.", manager))]
    AlreadyBooked {
        /// Name of the histogram manager.
        manager: &'static str,
    },

    /// A histogram with the same name already exists in the directory.
    #[snafu(display("Histogram '{}' already exists in directory '{}'.", name, directory))]
    DuplicateHistogram {
        /// Directory path.
        directory: String,

        /// Histogram name.
        name: String,
    },

    /// A directory path was malformed.
    #[snafu(display("Invalid directory path '{}': {}", path, reason))]
    InvalidPath {
        /// The offending path.
        path: String,

        /// Why the path was rejected.
        reason: &'static str,
    },

    /// Reading or writing a histogram file failed.
    #[snafu(display("I/O error on histogram file '{}'.", path.display()))]
    Io {
        /// File path.
        path: PathBuf,

        /// Error source.
        source: std::io::Error,
    },

    /// Encoding or decoding a histogram file failed.
    #[snafu(display("Failed to (de)serialize histogram file '{}'.", path.display()))]
    Serialization {
        /// File path.
        path: PathBuf,

        /// Error source.
        source: serde_json::Error,
    },
}
