pub mod config;
pub mod connection;
pub mod poll;
pub mod sandbox;
