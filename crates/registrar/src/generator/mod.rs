mod config;
mod coordinator;
mod state;

pub use config::*;
pub use coordinator::*;
pub use state::*;
