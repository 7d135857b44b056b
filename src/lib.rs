pub mod activity;
pub mod app;
pub mod commands;
pub mod config;
pub mod connection;
pub mod events;
pub mod session;
pub mod status;
pub mod throttle;

pub use app::App;
pub use session::{Host, Session};
