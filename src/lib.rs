pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::{Cli, Command};

pub use crate::adapters::{roster::RosterStore, storage::LocalStorage, telegram::TelegramNotifier};
pub use crate::config::TomlConfig;
pub use crate::core::date_code::DateCode;
pub use crate::core::trigger::{NotificationJob, RunSource, TriggerState};
pub use crate::utils::error::{NotifierError, Result};
