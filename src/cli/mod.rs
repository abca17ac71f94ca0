//! Command line interface for the Xiphos search engine.

pub mod args;
pub mod commands;
