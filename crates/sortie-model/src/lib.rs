pub mod branch;
pub mod command;
pub mod error;
pub mod mission;
pub mod outcome;
pub mod state;
pub mod system;
pub mod trace;
pub mod value;
pub mod variable;
