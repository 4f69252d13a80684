pub mod drive;
pub mod export;
pub mod gemini;
pub mod generation;
pub mod oauth;
pub mod playback;
pub mod prompt;
pub mod setup;
pub mod studio;
pub mod viewer;
