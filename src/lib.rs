pub mod checkmarx;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod platform;
pub mod protecode;
pub mod stepenv;
pub mod target;
pub mod ui;
