pub mod artifact;
pub mod job;
pub mod outcome;
pub mod style;
