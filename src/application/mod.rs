pub mod agent;
pub mod checkpoint;
pub mod notes;
pub mod tooling;
