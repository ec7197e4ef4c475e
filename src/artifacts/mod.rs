//! Git data structures and graph algorithms
//!
//! - `objects`: Git object types (commit, annotated tag)
//! - `refs`: Reference name validation
//! - `graph`: Commit graph discovery and span labeling
//! - `analysis`: One analysis run over a commit source
//! - `report`: Text and JSON rendering of an analysis

pub mod analysis;
pub mod graph;
pub mod objects;
pub mod refs;
pub mod report;
