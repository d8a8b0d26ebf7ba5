pub mod categories;
pub mod constants;
pub mod density;
pub mod geo;
pub mod matching;
pub mod metric;
mod progress;
pub mod stats;
pub mod stormtrack_errors;
pub mod track;
pub mod trackrun;
