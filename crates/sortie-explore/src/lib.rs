pub mod detector;
pub mod generator;
pub mod resources;
pub mod runner;
pub mod settings;
pub mod strategy;
