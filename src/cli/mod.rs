pub mod credentials;
pub mod state_file;

pub use state_file::{StateFile, StateRecord};
