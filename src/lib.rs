#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod flow;
pub mod image;
pub mod instance;
pub mod lifecycle;
pub mod logging;
pub mod mcp;
pub mod merge;
pub mod operation;
pub mod paths;
pub mod query;
pub mod tools;
