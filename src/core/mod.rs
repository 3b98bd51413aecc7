pub mod composer;
pub mod date_code;
pub mod dispatch;
pub mod matcher;
pub mod schedule;
pub mod trigger;

pub use crate::domain::model::{MatchSet, Roster, RunReport};
pub use crate::domain::ports::{Clock, Greeter, Notifier, Storage};
pub use crate::utils::error::Result;
