pub mod affinity;
pub mod sem;
