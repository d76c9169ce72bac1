pub mod config;
pub mod detector;
pub mod gantry;
pub mod tube;
