//! Step precedence graph.
//!
//! Typed dependency edges between the steps of a product, cycle rejection on
//! the union of both edge types, and the layered ordering and earliest start
//! offsets used for layout and timing.

#![warn(missing_docs)]

pub mod graph;
pub mod notation;
pub mod service;

pub use graph::{DependencyGraph, Edge, Layer};
pub use notation::{parse_dependency_list, format_dependency_list, CodedDependency};
pub use service::{DependencyService, StepLayer, StepTiming};
