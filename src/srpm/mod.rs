mod info;
mod walk;

pub use info::*;
pub use walk::*;
