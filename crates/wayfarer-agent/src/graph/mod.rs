//! The advisor routing graph.
//!
//! Nodes are the four advisor personas plus the human-input node. The tool
//! stage sits between an advisor and itself and is never a routing target.

pub mod advisor;
pub mod context;
pub mod engine;
pub mod human;
pub mod node;
pub mod tool_stage;
