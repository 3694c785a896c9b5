pub mod asset;
pub mod series;
pub mod signal;
pub mod snapshot;
pub mod view;
