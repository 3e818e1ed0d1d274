use serde::{Deserialize, Serialize};

use crate::{axis::Axis, error::HistogramError};

fn check_slots(name: &str, field: &'static str, values: &[f64], expected: usize) -> Result<(), HistogramError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(HistogramError::InvalidContents {
            name: name.to_string(),
            field,
            expected,
            actual: values.len(),
        })
    }
}

/// A one-dimensional histogram of weighted entries.
///
/// Every bin, including the underflow and overflow bins, tracks both the sum of weights and the sum of squared weights
/// so that statistical uncertainties survive reweighting.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "RawHistogram1D")]
pub struct Histogram1D {
    name: String,
    title: String,
    x_axis: Axis,
    sumw: Vec<f64>,
    sumw2: Vec<f64>,
    entries: u64,
}

#[derive(Deserialize)]
struct RawHistogram1D {
    name: String,
    title: String,
    x_axis: Axis,
    sumw: Vec<f64>,
    sumw2: Vec<f64>,
    entries: u64,
}

impl TryFrom<RawHistogram1D> for Histogram1D {
    type Error = HistogramError;

    fn try_from(raw: RawHistogram1D) -> Result<Self, Self::Error> {
        let slots = raw.x_axis.num_slots();
        check_slots(&raw.name, "sumw", &raw.sumw, slots)?;
        check_slots(&raw.name, "sumw2", &raw.sumw2, slots)?;

        Ok(Self {
            name: raw.name,
            title: raw.title,
            x_axis: raw.x_axis,
            sumw: raw.sumw,
            sumw2: raw.sumw2,
            entries: raw.entries,
        })
    }
}

impl Histogram1D {
    /// Creates a new, empty `Histogram1D`.
    pub fn new<N, T>(name: N, title: T, x_axis: Axis) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        let slots = x_axis.num_slots();
        Self {
            name: name.into(),
            title: title.into(),
            x_axis,
            sumw: vec![0.0; slots],
            sumw2: vec![0.0; slots],
            entries: 0,
        }
    }

    /// Returns the name of the histogram.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the title of the histogram.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the x axis.
    pub fn x_axis(&self) -> &Axis {
        &self.x_axis
    }

    /// Adds an entry at `x` with weight `w`.
    ///
    /// Values outside of the axis range are accumulated in the underflow or overflow bin.
    pub fn fill(&mut self, x: f64, w: f64) {
        let bin = self.x_axis.find_bin(x);
        self.add_to_bin(bin, w, w * w);
    }

    /// Adds an entry at `x` with weight `w`, keeping it within the visible range.
    ///
    /// Underflow is folded into the first bin and overflow into the last, so every call changes exactly one visible bin.
    /// The uncertainty of the weight itself, `w_err`, is added in quadrature to the bin error.
    pub fn fill_with_overflow(&mut self, x: f64, w: f64, w_err: f64) {
        let bin = self.x_axis.find_visible_bin(x);
        self.add_to_bin(bin, w, w * w + w_err * w_err);
    }

    fn add_to_bin(&mut self, bin: usize, w: f64, w2: f64) {
        self.sumw[bin] += w;
        self.sumw2[bin] += w2;
        self.entries += 1;
    }

    /// Returns the sum of weights in the given bin.
    ///
    /// Bins outside of `0..=num_bins + 1` are reported as empty.
    pub fn bin_content(&self, bin: usize) -> f64 {
        self.sumw.get(bin).copied().unwrap_or(0.0)
    }

    /// Returns the statistical uncertainty of the given bin.
    pub fn bin_error(&self, bin: usize) -> f64 {
        self.sumw2.get(bin).copied().unwrap_or(0.0).sqrt()
    }

    /// Returns the sum of weights in the underflow bin.
    pub fn underflow(&self) -> f64 {
        self.sumw[0]
    }

    /// Returns the sum of weights in the overflow bin.
    pub fn overflow(&self) -> f64 {
        self.sumw[self.x_axis.num_bins() + 1]
    }

    /// Returns the sum of weights over the visible bins.
    pub fn integral(&self) -> f64 {
        self.sumw[1..=self.x_axis.num_bins()].iter().sum()
    }

    /// Returns the sum of weights over all bins, including underflow and overflow.
    pub fn sum_of_weights(&self) -> f64 {
        self.sumw.iter().sum()
    }

    /// Returns the number of fill calls since creation or the last reset.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Clears all bins and the entry count.
    pub fn reset(&mut self) {
        self.sumw.iter_mut().for_each(|w| *w = 0.0);
        self.sumw2.iter_mut().for_each(|w| *w = 0.0);
        self.entries = 0;
    }
}

/// A two-dimensional histogram of weighted entries.
///
/// Cells are stored row-major over the y axis, each axis carrying its own underflow and overflow bins.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "RawHistogram2D")]
pub struct Histogram2D {
    name: String,
    title: String,
    x_axis: Axis,
    y_axis: Axis,
    sumw: Vec<f64>,
    sumw2: Vec<f64>,
    entries: u64,
}

#[derive(Deserialize)]
struct RawHistogram2D {
    name: String,
    title: String,
    x_axis: Axis,
    y_axis: Axis,
    sumw: Vec<f64>,
    sumw2: Vec<f64>,
    entries: u64,
}

impl TryFrom<RawHistogram2D> for Histogram2D {
    type Error = HistogramError;

    fn try_from(raw: RawHistogram2D) -> Result<Self, Self::Error> {
        let cells = raw.x_axis.num_slots() * raw.y_axis.num_slots();
        check_slots(&raw.name, "sumw", &raw.sumw, cells)?;
        check_slots(&raw.name, "sumw2", &raw.sumw2, cells)?;

        Ok(Self {
            name: raw.name,
            title: raw.title,
            x_axis: raw.x_axis,
            y_axis: raw.y_axis,
            sumw: raw.sumw,
            sumw2: raw.sumw2,
            entries: raw.entries,
        })
    }
}

impl Histogram2D {
    /// Creates a new, empty `Histogram2D`.
    pub fn new<N, T>(name: N, title: T, x_axis: Axis, y_axis: Axis) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        let cells = x_axis.num_slots() * y_axis.num_slots();
        Self {
            name: name.into(),
            title: title.into(),
            x_axis,
            y_axis,
            sumw: vec![0.0; cells],
            sumw2: vec![0.0; cells],
            entries: 0,
        }
    }

    /// Returns the name of the histogram.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the title of the histogram.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the x axis.
    pub fn x_axis(&self) -> &Axis {
        &self.x_axis
    }

    /// Returns the y axis.
    pub fn y_axis(&self) -> &Axis {
        &self.y_axis
    }

    fn cell_index(&self, x_bin: usize, y_bin: usize) -> Option<usize> {
        let x_slots = self.x_axis.num_slots();
        (x_bin < x_slots && y_bin < self.y_axis.num_slots()).then_some(y_bin * x_slots + x_bin)
    }

    /// Adds an entry at `(x, y)` with weight `w`.
    ///
    /// Values outside of either axis range are accumulated in that axis' flow bins.
    pub fn fill(&mut self, x: f64, y: f64, w: f64) {
        let x_bin = self.x_axis.find_bin(x);
        let y_bin = self.y_axis.find_bin(y);
        self.add_to_cell(x_bin, y_bin, w, w * w);
    }

    /// Adds an entry at `(x, y)` with weight `w`, keeping it within the visible range of both axes.
    ///
    /// Each axis folds its underflow into its first bin and its overflow into its last, so every call changes exactly
    /// one visible cell. `w_err` is added in quadrature to the cell error.
    pub fn fill_with_overflow(&mut self, x: f64, y: f64, w: f64, w_err: f64) {
        let x_bin = self.x_axis.find_visible_bin(x);
        let y_bin = self.y_axis.find_visible_bin(y);
        self.add_to_cell(x_bin, y_bin, w, w * w + w_err * w_err);
    }

    fn add_to_cell(&mut self, x_bin: usize, y_bin: usize, w: f64, w2: f64) {
        // Both bins come from `find_bin` on the matching axis, so the index is always in range.
        let idx = y_bin * self.x_axis.num_slots() + x_bin;
        self.sumw[idx] += w;
        self.sumw2[idx] += w2;
        self.entries += 1;
    }

    /// Returns the sum of weights in the given cell.
    ///
    /// Cells outside of the axis ranges (including flow bins) are reported as empty.
    pub fn bin_content(&self, x_bin: usize, y_bin: usize) -> f64 {
        self.cell_index(x_bin, y_bin).map_or(0.0, |idx| self.sumw[idx])
    }

    /// Returns the statistical uncertainty of the given cell.
    pub fn bin_error(&self, x_bin: usize, y_bin: usize) -> f64 {
        self.cell_index(x_bin, y_bin).map_or(0.0, |idx| self.sumw2[idx].sqrt())
    }

    /// Returns the sum of weights over the visible cells.
    pub fn integral(&self) -> f64 {
        let x_slots = self.x_axis.num_slots();
        (1..=self.y_axis.num_bins())
            .flat_map(|y_bin| (1..=self.x_axis.num_bins()).map(move |x_bin| y_bin * x_slots + x_bin))
            .map(|idx| self.sumw[idx])
            .sum()
    }

    /// Returns the sum of weights over all cells, including flow cells.
    pub fn sum_of_weights(&self) -> f64 {
        self.sumw.iter().sum()
    }

    /// Returns the number of fill calls since creation or the last reset.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Clears all cells and the entry count.
    pub fn reset(&mut self) {
        self.sumw.iter_mut().for_each(|w| *w = 0.0);
        self.sumw2.iter_mut().for_each(|w| *w = 0.0);
        self.entries = 0;
    }
}

/// A stored histogram of either dimensionality.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Histogram {
    /// One-dimensional histogram.
    #[serde(rename = "1d")]
    OneD(Histogram1D),

    /// Two-dimensional histogram.
    #[serde(rename = "2d")]
    TwoD(Histogram2D),
}

impl Histogram {
    /// Returns the name of the histogram.
    pub fn name(&self) -> &str {
        match self {
            Self::OneD(h) => h.name(),
            Self::TwoD(h) => h.name(),
        }
    }

    /// Returns the number of fill calls recorded by the histogram.
    pub fn entries(&self) -> u64 {
        match self {
            Self::OneD(h) => h.entries(),
            Self::TwoD(h) => h.entries(),
        }
    }

    /// Returns the one-dimensional histogram, if this is one.
    pub fn as_1d(&self) -> Option<&Histogram1D> {
        match self {
            Self::OneD(h) => Some(h),
            Self::TwoD(_) => None,
        }
    }

    /// Returns the two-dimensional histogram, if this is one.
    pub fn as_2d(&self) -> Option<&Histogram2D> {
        match self {
            Self::OneD(_) => None,
            Self::TwoD(h) => Some(h),
        }
    }
}

impl From<Histogram1D> for Histogram {
    fn from(h: Histogram1D) -> Self {
        Self::OneD(h)
    }
}

impl From<Histogram2D> for Histogram {
    fn from(h: Histogram2D) -> Self {
        Self::TwoD(h)
    }
}

/// A borrowed histogram of either dimensionality.
///
/// Histogram managers hand these out to expose the histograms they own without giving up ownership.
#[derive(Clone, Copy, Debug)]
pub enum HistogramRef<'a> {
    /// One-dimensional histogram.
    OneD(&'a Histogram1D),

    /// Two-dimensional histogram.
    TwoD(&'a Histogram2D),
}

impl HistogramRef<'_> {
    /// Returns the name of the histogram.
    pub fn name(&self) -> &str {
        match self {
            Self::OneD(h) => h.name(),
            Self::TwoD(h) => h.name(),
        }
    }

    /// Copies the referenced histogram into an owned [`Histogram`].
    pub fn to_histogram(&self) -> Histogram {
        match self {
            Self::OneD(h) => Histogram::OneD((*h).clone()),
            Self::TwoD(h) => Histogram::TwoD((*h).clone()),
        }
    }
}

impl<'a> From<&'a Histogram1D> for HistogramRef<'a> {
    fn from(h: &'a Histogram1D) -> Self {
        Self::OneD(h)
    }
}

impl<'a> From<&'a Histogram2D> for HistogramRef<'a> {
    fn from(h: &'a Histogram2D) -> Self {
        Self::TwoD(h)
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::ApproxEqRatio as _;
    use proptest::prelude::*;

    use super::*;

    fn jets_axis() -> Axis {
        Axis::new(8, -0.5, 7.5).unwrap().with_label("N_{jet}")
    }

    fn bjets_axis() -> Axis {
        Axis::new(6, -0.5, 5.5).unwrap().with_label("N_{b-jet}")
    }

    #[test]
    fn fill_keeps_flows_separate() {
        let mut h = Histogram1D::new("numJets", "numJets", jets_axis());
        h.fill(3.0, 2.0);
        h.fill(-4.0, 0.5);
        h.fill(12.0, 1.5);

        assert_eq!(h.bin_content(4), 2.0);
        assert_eq!(h.underflow(), 0.5);
        assert_eq!(h.overflow(), 1.5);
        assert_eq!(h.integral(), 2.0);
        assert_eq!(h.sum_of_weights(), 4.0);
        assert_eq!(h.entries(), 3);
    }

    #[test]
    fn fill_with_overflow_folds_into_visible_bins() {
        let mut h = Histogram1D::new("numJets", "numJets", jets_axis());
        h.fill_with_overflow(-4.0, 0.5, 0.0);
        h.fill_with_overflow(12.0, 1.5, 0.0);

        assert_eq!(h.underflow(), 0.0);
        assert_eq!(h.overflow(), 0.0);
        assert_eq!(h.bin_content(1), 0.5);
        assert_eq!(h.bin_content(8), 1.5);
        assert_eq!(h.integral(), 2.0);
    }

    #[test]
    fn bin_error_adds_weights_in_quadrature() {
        let mut h = Histogram1D::new("mvaDiscr_3l", "mvaDiscr_3l", Axis::new(10, 0.5, 10.5).unwrap());
        h.fill_with_overflow(3.0, 3.0, 0.0);
        h.fill_with_overflow(3.0, 4.0, 0.0);
        assert!(h.bin_error(3).approx_eq_ratio(&5.0, 1e-12));

        h.fill_with_overflow(7.0, 1.0, 1.0);
        assert!(h.bin_error(7).approx_eq_ratio(&2f64.sqrt(), 1e-12));
    }

    #[test]
    fn out_of_range_bin_queries_are_empty() {
        let h = Histogram1D::new("numMuons", "numMuons", Axis::new(5, -0.5, 4.5).unwrap());
        assert_eq!(h.bin_content(100), 0.0);
        assert_eq!(h.bin_error(100), 0.0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut h = Histogram1D::new("numJets", "numJets", jets_axis());
        h.fill(1.0, 1.0);
        h.reset();
        assert_eq!(h.sum_of_weights(), 0.0);
        assert_eq!(h.entries(), 0);
    }

    #[test]
    fn fill_2d_cells() {
        let mut h = Histogram2D::new("numBJets_loose_vs_numJets", "", jets_axis(), bjets_axis());
        h.fill_with_overflow(4.0, 2.0, 0.75, 0.0);
        h.fill_with_overflow(20.0, -1.0, 0.25, 0.0);
        h.fill(20.0, -1.0, 1.0);

        assert_eq!(h.bin_content(5, 3), 0.75);
        assert_eq!(h.bin_content(8, 1), 0.25);
        assert_eq!(h.bin_content(9, 0), 1.0);
        assert_eq!(h.integral(), 1.0);
        assert_eq!(h.sum_of_weights(), 2.0);
        assert_eq!(h.entries(), 3);
        assert_eq!(h.bin_content(42, 0), 0.0);
        assert_eq!(h.x_axis().label(), "N_{jet}");
        assert_eq!(h.y_axis().label(), "N_{b-jet}");
    }

    #[test]
    fn histogram_json_layout() {
        let h: Histogram = Histogram1D::new("EventCounter", "EventCounter", Axis::new(1, -0.5, 0.5).unwrap()).into();
        let json = serde_json::to_value(&h).unwrap();

        assert_eq!(json["kind"], "1d");
        assert_eq!(json["name"], "EventCounter");
        assert_eq!(json["sumw"].as_array().map(Vec::len), Some(3));

        let decoded: Histogram = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, h);
    }

    #[test]
    fn decoding_rejects_mismatched_bin_contents() {
        let h = Histogram1D::new("numJets", "numJets", jets_axis());
        let mut json = serde_json::to_value(Histogram::from(h)).unwrap();
        json["sumw"] = serde_json::json!([0.0]);
        let err = serde_json::from_value::<Histogram>(json).unwrap_err();
        assert!(err.to_string().contains("'sumw'"), "{}", err);

        let h = Histogram2D::new("numBJets_loose_vs_numJets", "", jets_axis(), bjets_axis());
        let mut json = serde_json::to_value(Histogram::from(h)).unwrap();
        let sumw2 = json["sumw2"].as_array_mut().unwrap();
        sumw2.truncate(sumw2.len() - 1);
        let err = serde_json::from_value::<Histogram>(json).unwrap_err();
        assert!(err.to_string().contains("'sumw2'"), "{}", err);
    }

    proptest! {
        #[test]
        fn property_overflow_fill_changes_one_visible_bin(x in any::<f64>(), w in -10.0f64..10.0) {
            let mut h = Histogram1D::new("numJets", "numJets", jets_axis());
            h.fill_with_overflow(x, w, 0.0);

            let touched = (0..=9).filter(|bin| h.bin_content(*bin) != 0.0).collect::<Vec<_>>();
            if w != 0.0 {
                prop_assert_eq!(touched.len(), 1);
                prop_assert!(touched[0] >= 1 && touched[0] <= 8);
            }
            prop_assert_eq!(h.integral(), w);
            prop_assert_eq!(h.entries(), 1);
        }
    }
}
