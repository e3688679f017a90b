pub mod config;
pub mod daemon;
pub mod run;
