//! Error handling foundation for flowline.
//!
//! Only the `Result` alias lives here. Each crate owns its domain error
//! enums and turns them into rootcause reports at its public boundary.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
