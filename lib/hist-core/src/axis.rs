use serde::{Deserialize, Serialize};

use crate::error::HistogramError;

/// A fixed-width binned axis.
///
/// Bins are numbered the same way ROOT numbers them: bin `0` collects underflow, bins `1..=num_bins` cover `[min,
/// max)` in equal-width, half-open intervals, and bin `num_bins + 1` collects overflow.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "RawAxis")]
pub struct Axis {
    num_bins: usize,
    min: f64,
    max: f64,
    #[serde(default)]
    label: String,
}

#[derive(Deserialize)]
struct RawAxis {
    num_bins: usize,
    min: f64,
    max: f64,
    #[serde(default)]
    label: String,
}

impl TryFrom<RawAxis> for Axis {
    type Error = HistogramError;

    fn try_from(raw: RawAxis) -> Result<Self, Self::Error> {
        Ok(Axis::new(raw.num_bins, raw.min, raw.max)?.with_label(raw.label))
    }
}

impl Axis {
    /// Creates a new `Axis` with `num_bins` equal-width bins over `[min, max)`.
    ///
    /// # Errors
    ///
    /// If `num_bins` is zero, either edge is not finite, or `min` is not strictly less than `max`, an error is returned.
    pub fn new(num_bins: usize, min: f64, max: f64) -> Result<Self, HistogramError> {
        let reason = if num_bins == 0 {
            Some("at least one bin is required")
        } else if !min.is_finite() || !max.is_finite() {
            Some("axis edges must be finite")
        } else if min >= max {
            Some("lower edge must be below upper edge")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(HistogramError::InvalidAxis {
                num_bins,
                min,
                max,
                reason,
            }),
            None => Ok(Self {
                num_bins,
                min,
                max,
                label: String::new(),
            }),
        }
    }

    /// Sets the axis label.
    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = label.into();
        self
    }

    /// Returns the number of visible bins.
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Returns the lower edge of the first visible bin.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Returns the upper edge of the last visible bin.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Returns the axis label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the width of every visible bin.
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.num_bins as f64
    }

    /// Returns the number of storage slots needed for this axis, including the two flow bins.
    pub(crate) fn num_slots(&self) -> usize {
        self.num_bins + 2
    }

    /// Returns the bin that `x` falls into, including the underflow (`0`) and overflow (`num_bins + 1`) bins.
    ///
    /// NaN is treated as underflow.
    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || x < self.min {
            return 0;
        }

        if x >= self.max {
            return self.num_bins + 1;
        }

        // Rounding can push values just below `max` past the last bin.
        let offset = ((x - self.min) / self.bin_width()) as usize;
        (offset + 1).min(self.num_bins)
    }

    /// Returns the visible bin that `x` falls into, folding underflow into the first bin and overflow into the last.
    pub fn find_visible_bin(&self, x: f64) -> usize {
        self.find_bin(x).clamp(1, self.num_bins)
    }

    /// Returns the lower edge of the given bin.
    ///
    /// The underflow bin reports negative infinity.
    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        if bin == 0 {
            f64::NEG_INFINITY
        } else {
            self.min + (bin - 1) as f64 * self.bin_width()
        }
    }

    /// Returns the center of the given visible bin.
    pub fn bin_center(&self, bin: usize) -> f64 {
        self.min + (bin as f64 - 0.5) * self.bin_width()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn multiplicity_axis() -> Axis {
        Axis::new(5, -0.5, 4.5).unwrap()
    }

    #[test]
    fn rejects_invalid_binning() {
        assert!(matches!(
            Axis::new(0, 0.0, 1.0),
            Err(HistogramError::InvalidAxis { num_bins: 0, .. })
        ));
        assert!(Axis::new(10, 1.0, 1.0).is_err());
        assert!(Axis::new(10, 2.0, 1.0).is_err());
        assert!(Axis::new(10, f64::NEG_INFINITY, 1.0).is_err());
        assert!(Axis::new(10, 0.0, f64::NAN).is_err());
    }

    #[test]
    fn integer_values_land_in_centered_bins() {
        let axis = multiplicity_axis();
        for n in 0..5 {
            let bin = axis.find_bin(f64::from(n));
            assert_eq!(bin, n as usize + 1);
            assert!((axis.bin_center(bin) - f64::from(n)).abs() < 1e-12);
        }
    }

    #[test]
    fn flows() {
        let axis = multiplicity_axis();
        assert_eq!(axis.find_bin(-0.6), 0);
        assert_eq!(axis.find_bin(4.5), 6);
        assert_eq!(axis.find_bin(100.0), 6);
        assert_eq!(axis.find_bin(f64::INFINITY), 6);
        assert_eq!(axis.find_bin(f64::NEG_INFINITY), 0);
        assert_eq!(axis.find_bin(f64::NAN), 0);

        assert_eq!(axis.find_visible_bin(-3.0), 1);
        assert_eq!(axis.find_visible_bin(7.0), 5);
        assert_eq!(axis.find_visible_bin(f64::NAN), 1);
    }

    #[test]
    fn edges_are_half_open() {
        let axis = Axis::new(8, -1.0, 1.0).unwrap();
        assert_eq!(axis.find_bin(-1.0), 1);
        assert_eq!(axis.find_bin(-0.75), 2);
        assert_eq!(axis.find_bin(0.0), 5);
        assert_eq!(axis.find_bin(0.999_999), 8);
        assert_eq!(axis.find_bin(1.0), 9);
        assert_eq!(axis.bin_low_edge(0), f64::NEG_INFINITY);
        assert_eq!(axis.bin_low_edge(5), 0.0);
        assert_eq!(axis.bin_width(), 0.25);
    }

    #[test]
    fn deserialize_validates_binning() {
        let axis: Axis = serde_json::from_str(r#"{"num_bins":5,"min":-0.5,"max":4.5,"label":"N_{e}"}"#).unwrap();
        assert_eq!(axis, multiplicity_axis().with_label("N_{e}"));

        let err = serde_json::from_str::<Axis>(r#"{"num_bins":0,"min":1.0,"max":0.0}"#).unwrap_err();
        assert!(err.to_string().contains("at least one bin is required"));
        assert!(serde_json::from_str::<Axis>(r#"{"num_bins":4,"min":1.0,"max":0.0}"#).is_err());
    }

    proptest! {
        #[test]
        fn property_visible_bin_in_range(x in any::<f64>(), num_bins in 1usize..100, min in -1e6f64..1e6, width in 1e-3f64..1e3) {
            let axis = Axis::new(num_bins, min, min + width * num_bins as f64).unwrap();
            let bin = axis.find_visible_bin(x);
            prop_assert!(bin >= 1 && bin <= num_bins);
            prop_assert!(axis.find_bin(x) <= num_bins + 1);
        }
    }
}
