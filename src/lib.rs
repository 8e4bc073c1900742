pub mod application;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod logger;
pub mod morphism;
pub mod rule;
