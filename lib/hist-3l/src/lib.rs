//! Event-level histograms for the three-lepton (3ℓ) category of the multilepton analysis.
#![deny(warnings)]
#![deny(missing_docs)]

mod era;
pub use self::era::{Era, InvalidEra};

mod evt;
pub use self::evt::{EvtHistManager3l, Histograms3l};
