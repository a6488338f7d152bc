pub mod annotate;
pub mod bench;
pub mod discover;
pub mod display;
pub mod errors;
pub mod types;
