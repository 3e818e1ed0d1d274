//! Process bootstrapping shared by the analysis binaries.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod logging;

/// Common imports.
pub mod prelude {
    pub use super::logging::{fatal_and_exit, initialize_logging};
}
