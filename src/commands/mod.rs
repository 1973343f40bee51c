pub mod config_commands;
pub mod playlist_commands;
