//! Shared result alias.
//!
//! Domain error enums live next to the code that raises them; this alias
//! carries them as `Report<C>` across crate boundaries.

use rootcause::Report;

/// `Result` whose error is a rootcause report over context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
