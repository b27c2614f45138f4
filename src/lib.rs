//! Job-application tracking: a Kanban status workflow and pipeline analytics
//! over applications kept in SQLite.

pub mod ai;
pub mod analytics;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod models;
pub mod store;
pub mod tui;
pub mod workflow;
