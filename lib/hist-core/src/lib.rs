//! Binned histograms, an in-memory output file to hold them, and the booking capability shared by histogram managers.
#![deny(warnings)]
#![deny(missing_docs)]

mod axis;
pub use self::axis::Axis;

mod booker;
pub use self::booker::{HistManager, HistogramBooker, CENTRAL};

mod error;
pub use self::error::HistogramError;

mod file;
pub use self::file::{Directory, HistogramFile};

mod histogram;
pub use self::histogram::{Histogram, Histogram1D, Histogram2D, HistogramRef};
