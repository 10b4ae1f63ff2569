#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod images;
pub mod index;
pub mod logging;
pub mod model;
pub mod navigate;
pub mod orchestrator;
pub mod pacing;
pub mod sink;
pub mod site;
pub mod storage;
pub mod webdriver;
