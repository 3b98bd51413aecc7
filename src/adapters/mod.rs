// Adapters layer: concrete implementations of the domain ports (storage, delivery, greetings, clock)
// plus the CSV ingestion helper and the cross-process run lock.

pub mod clock;
pub mod csv_import;
pub mod greeter;
pub mod roster;
pub mod run_lock;
pub mod storage;
pub mod telegram;
