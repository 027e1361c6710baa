pub mod compare;
pub mod persist;
pub mod stats;
