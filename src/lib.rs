pub mod api_connection;
pub mod cli;
pub mod config;
pub mod flows;
pub mod forms;
pub mod logging;
pub mod planner;
pub mod render;
pub mod session;
