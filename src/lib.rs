// Library for tests to access modules

pub mod config;
pub mod graphs;
pub mod masterdb;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod round_parser;
pub mod snapshot_reader;
pub mod version;
pub mod worker;
