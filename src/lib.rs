pub mod config;
pub mod drive;
pub mod hardware;
pub mod messages;
pub mod pose;
pub mod runtime;
pub mod sim;
