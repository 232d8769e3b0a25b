pub mod cli;
pub mod dashboard;
pub mod report;
