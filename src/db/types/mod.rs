mod file_ids;
mod state;

pub use file_ids::*;
pub use state::*;
