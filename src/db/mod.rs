pub mod library;
pub mod local;
pub mod playlists;
