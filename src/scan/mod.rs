pub mod audit;
pub mod config;
pub mod date_picker;
pub mod identifier;
pub mod reconcile;
pub mod report;
pub mod util;
pub mod walker;
pub mod warn;
