pub mod config;
pub mod db;
pub mod filters;
pub mod import;
pub mod output;
pub mod report;
