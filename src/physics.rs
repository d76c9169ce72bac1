pub mod compton;
pub mod constants;
pub mod cross_section;
pub mod distribution;
pub mod spectrum;
