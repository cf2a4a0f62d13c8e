mod expr;
mod files;
mod parser;

pub use files::*;
pub use parser::SpecParser;

use std::path::Path;

use crate::error::Result;
use crate::header::{Header, Tag};

/// One `%package` stanza, the implicit main package included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Package {
    pub header: Header,
    /// `None` when the spec file has no `%files` section for this package.
    pub files: Option<FileList>,
}

impl Package {
    pub fn name(&self) -> String {
        self.header.get_as_string_or(Tag::Name)
    }

    /// Packages with at least one file produce a binary rpm.
    pub fn is_binary(&self) -> bool {
        self.files.as_ref().is_some_and(|files| !files.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spec {
    /// Main package first, then subpackages in declaration order.
    pub packages: Vec<Package>,
    pub source_header: Header,
}

/// A spec-file parsing backend.
pub trait SpecEngine {
    fn parse_spec(&self, path: &Path) -> Result<Spec>;
}
