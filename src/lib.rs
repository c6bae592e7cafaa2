pub mod app;
pub mod config;
pub mod countdown;
pub mod error;
pub mod prompt;
pub mod store;
pub mod task;
pub mod task_list;
pub mod terminal;
pub mod ui;
