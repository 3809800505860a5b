// Coursetrace: trace course-forum questions back to the course material
// they are about.
//
// This is the library root. Each module corresponds to a stage or a
// supporting subsystem of the build -> rank -> evaluate pipeline.

pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod inputs;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod ranking;
pub mod status;
pub mod store;
