pub mod audio;
pub mod media;
