pub mod band;
pub mod logging;
