use hist_config::GenericConfiguration;
use hist_core::{
    Axis, Directory, HistManager, Histogram1D, Histogram2D, HistogramBooker, HistogramError, HistogramFile,
    HistogramRef,
};
use hist_error::{ErrorContext as _, GenericError};
use tracing::debug;

use crate::era::Era;

const MANAGER_NAME: &str = "EvtHistManager3l";

/// The event-level histograms of the 3ℓ category.
///
/// Only ever exists fully booked: every histogram below is created by
/// [`EvtHistManager3l::book_histograms`] in one go.
#[derive(Clone, Debug)]
pub struct Histograms3l {
    directory: Directory,

    /// Electron multiplicity.
    pub num_electrons: Histogram1D,
    /// Muon multiplicity.
    pub num_muons: Histogram1D,
    /// Hadronic tau multiplicity.
    pub num_had_taus: Histogram1D,
    /// Jet multiplicity.
    pub num_jets: Histogram1D,
    /// Loose b-tagged jet multiplicity.
    pub num_bjets_loose: Histogram1D,
    /// Medium b-tagged jet multiplicity.
    pub num_bjets_medium: Histogram1D,

    // Used to check the signal efficiency lost when vetoing events with high jet and b-jet multiplicity, which
    // overlap with the ttH, H -> bb analysis.
    /// Loose b-tagged jet multiplicity (y) against jet multiplicity (x).
    pub num_bjets_loose_vs_num_jets: Histogram2D,
    /// Medium b-tagged jet multiplicity (y) against jet multiplicity (x).
    pub num_bjets_medium_vs_num_jets: Histogram2D,

    /// BDT output trained against ttV.
    pub mva_output_3l_ttv: Histogram1D,
    /// BDT output trained against ttbar.
    pub mva_output_3l_ttbar: Histogram1D,
    /// Discriminant binned in the plane of the two BDT outputs.
    pub mva_discr_3l: Histogram1D,

    /// Sum of event weights.
    pub event_counter: Histogram1D,
}

impl Histograms3l {
    fn book(booker: &HistogramBooker, directory: Directory) -> Result<Self, HistogramError> {
        let multiplicity = |num_bins: usize, max: f64, label: &str| -> Result<Axis, HistogramError> {
            Ok(Axis::new(num_bins, -0.5, max)?.with_label(label))
        };
        let book_1d = |distribution: &str, x_axis: Axis| booker.book_1d(distribution, distribution, x_axis);
        let book_2d =
            |distribution: &str, x_axis: Axis, y_axis: Axis| booker.book_2d(distribution, distribution, x_axis, y_axis);

        Ok(Self {
            num_electrons: book_1d("numElectrons", multiplicity(5, 4.5, "N_{e}")?),
            num_muons: book_1d("numMuons", multiplicity(5, 4.5, "N_{#mu}")?),
            num_had_taus: book_1d("numHadTaus", multiplicity(5, 4.5, "N_{#tau_{h}}")?),
            num_jets: book_1d("numJets", multiplicity(20, 19.5, "N_{jet}")?),
            num_bjets_loose: book_1d("numBJets_loose", multiplicity(10, 9.5, "N_{b-jet}^{loose}")?),
            num_bjets_medium: book_1d("numBJets_medium", multiplicity(10, 9.5, "N_{b-jet}^{medium}")?),
            num_bjets_loose_vs_num_jets: book_2d(
                "numBJets_loose_vs_numJets",
                multiplicity(8, 7.5, "N_{jet}")?,
                multiplicity(6, 5.5, "N_{b-jet}^{loose}")?,
            ),
            num_bjets_medium_vs_num_jets: book_2d(
                "numBJets_medium_vs_numJets",
                multiplicity(8, 7.5, "N_{jet}")?,
                multiplicity(6, 5.5, "N_{b-jet}^{medium}")?,
            ),
            mva_output_3l_ttv: book_1d("mvaOutput_3l_ttV", Axis::new(40, -1.0, 1.0)?.with_label("MVA_{ttV}")),
            mva_output_3l_ttbar: book_1d(
                "mvaOutput_3l_ttbar",
                Axis::new(40, -1.0, 1.0)?.with_label("MVA_{t#bar{t}}"),
            ),
            mva_discr_3l: book_1d("mvaDiscr_3l", Axis::new(10, 0.5, 10.5)?.with_label("MVA discriminant")),
            event_counter: book_1d("EventCounter", Axis::new(1, -0.5, 0.5)?),
            directory,
        })
    }

    /// Returns the directory the histograms were booked into.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Returns all histograms, in booking order.
    pub fn iter(&self) -> impl Iterator<Item = HistogramRef<'_>> {
        [
            HistogramRef::from(&self.num_electrons),
            HistogramRef::from(&self.num_muons),
            HistogramRef::from(&self.num_had_taus),
            HistogramRef::from(&self.num_jets),
            HistogramRef::from(&self.num_bjets_loose),
            HistogramRef::from(&self.num_bjets_medium),
            HistogramRef::from(&self.num_bjets_loose_vs_num_jets),
            HistogramRef::from(&self.num_bjets_medium_vs_num_jets),
            HistogramRef::from(&self.mva_output_3l_ttv),
            HistogramRef::from(&self.mva_output_3l_ttbar),
            HistogramRef::from(&self.mva_discr_3l),
            HistogramRef::from(&self.event_counter),
        ]
        .into_iter()
    }
}

/// Books and fills the event-level histograms of the 3ℓ category.
///
/// The manager is created unbooked from configuration, booked exactly once into an output directory, and then filled
/// once per selected event. Booking placement and naming are delegated to a [`HistogramBooker`].
#[derive(Clone, Debug)]
pub struct EvtHistManager3l {
    booker: HistogramBooker,
    era: Era,
    histograms: Option<Histograms3l>,
}

impl EvtHistManager3l {
    /// Creates a new, unbooked `EvtHistManager3l`.
    pub fn new(booker: HistogramBooker, era: Era) -> Self {
        Self {
            booker,
            era,
            histograms: None,
        }
    }

    /// Creates a new, unbooked `EvtHistManager3l` from the given configuration.
    ///
    /// Reads `era` along with the booking settings used by [`HistogramBooker::from_configuration`].
    ///
    /// # Errors
    ///
    /// If a required key is missing, or `era` is not a known data-taking era, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        let era = config
            .get_typed::<Era>("era")
            .error_context("Failed to read data-taking era from configuration.")?;
        let booker = HistogramBooker::from_configuration(config)
            .error_context("Failed to read histogram booking settings from configuration.")?;

        Ok(Self::new(booker, era))
    }

    /// Returns the data-taking era.
    pub fn era(&self) -> Era {
        self.era
    }

    /// Returns the booking settings.
    pub fn booker(&self) -> &HistogramBooker {
        &self.booker
    }

    /// Returns `true` once the histograms have been booked.
    pub fn is_booked(&self) -> bool {
        self.histograms.is_some()
    }

    /// Returns the booked histograms, or `None` if not booked yet.
    pub fn histograms(&self) -> Option<&Histograms3l> {
        self.histograms.as_ref()
    }

    /// Returns the event counter histogram, or `None` if not booked yet.
    pub fn event_counter_histogram(&self) -> Option<&Histogram1D> {
        self.histograms.as_ref().map(|h| &h.event_counter)
    }

    /// Fills all histograms for one event.
    ///
    /// Every histogram receives `evt_weight` in exactly one visible bin: values outside an axis range are folded into
    /// its first or last bin. The event counter is always incremented. Input values are not validated.
    ///
    /// # Errors
    ///
    /// If the histograms have not been booked yet, an error is returned and nothing is filled.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_histograms(
        &mut self, num_electrons: i32, num_muons: i32, num_had_taus: i32, num_jets: i32, num_bjets_loose: i32,
        num_bjets_medium: i32, mva_output_3l_ttv: f64, mva_output_3l_ttbar: f64, mva_discr_3l: f64, evt_weight: f64,
    ) -> Result<(), HistogramError> {
        let h = self
            .histograms
            .as_mut()
            .ok_or(HistogramError::NotBooked { manager: MANAGER_NAME })?;

        // Event weights carry no uncertainty of their own here.
        let evt_weight_err = 0.0;
        let num_jets = f64::from(num_jets);
        let num_bjets_loose = f64::from(num_bjets_loose);
        let num_bjets_medium = f64::from(num_bjets_medium);

        h.num_electrons
            .fill_with_overflow(f64::from(num_electrons), evt_weight, evt_weight_err);
        h.num_muons
            .fill_with_overflow(f64::from(num_muons), evt_weight, evt_weight_err);
        h.num_had_taus
            .fill_with_overflow(f64::from(num_had_taus), evt_weight, evt_weight_err);
        h.num_jets.fill_with_overflow(num_jets, evt_weight, evt_weight_err);
        h.num_bjets_loose
            .fill_with_overflow(num_bjets_loose, evt_weight, evt_weight_err);
        h.num_bjets_medium
            .fill_with_overflow(num_bjets_medium, evt_weight, evt_weight_err);

        h.num_bjets_loose_vs_num_jets
            .fill_with_overflow(num_jets, num_bjets_loose, evt_weight, evt_weight_err);
        h.num_bjets_medium_vs_num_jets
            .fill_with_overflow(num_jets, num_bjets_medium, evt_weight, evt_weight_err);

        h.mva_output_3l_ttv
            .fill_with_overflow(mva_output_3l_ttv, evt_weight, evt_weight_err);
        h.mva_output_3l_ttbar
            .fill_with_overflow(mva_output_3l_ttbar, evt_weight, evt_weight_err);
        h.mva_discr_3l.fill_with_overflow(mva_discr_3l, evt_weight, evt_weight_err);

        h.event_counter.fill_with_overflow(0.0, evt_weight, evt_weight_err);

        Ok(())
    }
}

impl HistManager for EvtHistManager3l {
    fn book_histograms(&mut self, directory: &Directory) -> Result<(), HistogramError> {
        if self.histograms.is_some() {
            return Err(HistogramError::AlreadyBooked { manager: MANAGER_NAME });
        }

        let directory = self.booker.histogram_directory(directory)?;
        let histograms = Histograms3l::book(&self.booker, directory)?;
        debug!(
            directory = %histograms.directory(),
            era = %self.era,
            central_or_shift = self.booker.central_or_shift(),
            "Booked 3l event-level histograms."
        );

        self.histograms = Some(histograms);
        Ok(())
    }

    fn write_histograms(&self, file: &mut HistogramFile) -> Result<(), HistogramError> {
        let histograms = self
            .histograms
            .as_ref()
            .ok_or(HistogramError::NotBooked { manager: MANAGER_NAME })?;

        file.insert_all(histograms.directory(), histograms.iter().map(|h| h.to_histogram()))
    }
}
