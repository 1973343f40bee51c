pub mod commands;
pub mod db;
pub mod error;
pub mod export;
pub mod scheduler;
pub mod state;
