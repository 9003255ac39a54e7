//! Session discovery: rollout filename conventions, the locator, and
//! lazy session listing.

mod error;
mod list;
mod locator;
mod pattern;

pub use error::LocatorError;
pub use list::{read_session_head, CompiledFilter, SessionFilter, SessionLogFile};
pub use locator::SessionLocator;
pub use pattern::{is_rollout_file, rollout_file_name, RolloutFileName};
