pub mod clockwheel;
pub mod jingles;
pub mod rotation;
pub mod selection;
