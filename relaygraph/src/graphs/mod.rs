//! Graph definition and compilation.
//!
//! [`GraphBuilder`] assembles nodes, static edges, conditional edges and
//! declared handoff destination sets, then compiles into an executable
//! [`App`](crate::app::App). Compilation is where wiring mistakes die:
//! unknown edge targets, unknown handoff destinations, and graphs with
//! no entry are all build-time errors.

mod builder;
mod compilation;
mod edges;

pub use builder::GraphBuilder;
pub use compilation::GraphCompileError;
pub use edges::{ConditionalEdge, EdgePredicate};
