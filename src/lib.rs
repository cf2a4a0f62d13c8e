pub mod config;
pub mod error;
pub mod header;
pub mod macros;
pub mod spec;
pub mod srpm;
mod utils;

pub use config::RpmConfig;
pub use error::{Error, Result};
pub use spec::{Package, Spec, SpecEngine, SpecParser};
pub use srpm::{EmittedPackage, SrpmInfo};
