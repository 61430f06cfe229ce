//! FedSQL - 联邦 SQL 查询引擎的关系规划器与基于规则的优化器
//!
//! This crate compiles an already-resolved SQL command tree into an
//! executable operator tree: it decides what work is pushed to which
//! backing data source, which execution strategy each relational operator
//! uses, and what row/column security filtering must be injected.
//!
//! Parsing, name/type resolution, the physical catalog store and the
//! operator runtime are external collaborators reached through the traits
//! in [`query::metadata`].

pub mod config;
pub mod core;
pub mod query;
pub mod utils;

pub use crate::core::error::{CompileError, CompileResult};
pub use crate::query::compile;
