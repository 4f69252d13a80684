pub mod config;
pub mod history;
pub mod io;
pub mod state;
