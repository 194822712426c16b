pub mod orientation;
pub mod creation;

pub use creation::CreationRule;
pub use orientation::OrientationRule;

pub const ORIENTATION_FILE: &str = "orientation.json";
pub const CREATION_FILE: &str = "creation.json";
