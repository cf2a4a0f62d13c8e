mod format;
mod tags;

pub use tags::*;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum RType {
    Int32(u32),
    String(String),
    StringArray(Vec<String>),
}

impl RType {
    pub fn as_string(&self) -> Option<String> {
        match self {
            RType::String(s) => Some(s.clone()),
            RType::Int32(n) => Some(n.to_string()),
            RType::StringArray(v) => v.first().cloned(),
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            RType::Int32(n) => Some(*n),
            RType::String(s) => s.parse().ok(),
            RType::StringArray(_) => None,
        }
    }

    /// Every value as a string, arrays element by element.
    pub fn as_strings(&self) -> Vec<String> {
        match self {
            RType::StringArray(v) => v.clone(),
            other => other.as_string().into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RTag {
    pub name: Tag,
    pub value: RType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Nevra {
    pub name: String,
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
    pub arch: String,
}

/// Metadata header of one package, tags kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    tags: Vec<RTag>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: Tag, value: RType) -> &mut Self {
        match self.tags.iter_mut().find(|t| t.name == name) {
            Some(existing) => existing.value = value,
            None => self.tags.push(RTag { name, value }),
        }
        self
    }

    /// Appends to an array tag, creating it when absent.
    pub fn push(&mut self, name: Tag, item: String) -> &mut Self {
        match self.tags.iter_mut().find(|t| t.name == name) {
            Some(RTag {
                value: RType::StringArray(items),
                ..
            }) => items.push(item),
            _ => {
                self.insert(name, RType::StringArray(vec![item]));
            }
        }
        self
    }

    pub fn contains(&self, name: Tag) -> bool {
        self.get_value(name).is_some()
    }

    pub fn get_value(&self, name: Tag) -> Option<&RType> {
        self.tags.iter().find(|t| t.name == name).map(|t| &t.value)
    }

    pub fn get_as_string(&self, name: Tag) -> Option<String> {
        self.get_value(name).and_then(RType::as_string)
    }

    pub fn get_as_string_or(&self, name: Tag) -> String {
        self.get_as_string(name).unwrap_or_default()
    }

    pub fn get_as_string_array_or(&self, name: Tag) -> Vec<String> {
        self.get_value(name).map(RType::as_strings).unwrap_or_default()
    }

    pub fn tags(&self) -> &[RTag] {
        &self.tags
    }

    /// Name, epoch, version, release and arch in one lookup.
    pub fn nevra(&self) -> Result<Nevra> {
        let required = |tag| self.get_as_string(tag).ok_or(Error::MissingField(tag));

        Ok(Nevra {
            name: required(Tag::Name)?,
            epoch: self.get_value(Tag::Epoch).and_then(RType::as_u32),
            version: required(Tag::Version)?,
            release: required(Tag::Release)?,
            arch: required(Tag::Arch)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_header() -> Header {
        let mut header = Header::new();
        header
            .insert(Tag::Name, RType::String("demo".to_owned()))
            .insert(Tag::Version, RType::String("1.0".to_owned()))
            .insert(Tag::Release, RType::String("1".to_owned()))
            .insert(Tag::Arch, RType::String("x86_64".to_owned()));
        header
    }

    #[test]
    fn test_nevra() {
        let mut header = demo_header();
        header.insert(Tag::Epoch, RType::Int32(2));

        let nevra = header.nevra().unwrap();
        assert_eq!(nevra.name, "demo");
        assert_eq!(nevra.epoch, Some(2));
        assert_eq!(nevra.version, "1.0");
        assert_eq!(nevra.release, "1");
        assert_eq!(nevra.arch, "x86_64");
    }

    #[test]
    fn test_nevra_missing_release() {
        let mut header = Header::new();
        header
            .insert(Tag::Name, RType::String("demo".to_owned()))
            .insert(Tag::Version, RType::String("1.0".to_owned()))
            .insert(Tag::Arch, RType::String("x86_64".to_owned()));

        assert!(matches!(header.nevra(), Err(Error::MissingField(Tag::Release))));
    }

    #[test]
    fn test_insert_replaces() {
        let mut header = demo_header();
        header.insert(Tag::Arch, RType::String("noarch".to_owned()));
        assert_eq!(header.get_as_string(Tag::Arch).as_deref(), Some("noarch"));
        assert_eq!(header.tags().len(), 4);
    }

    #[test]
    fn test_push_array() {
        let mut header = Header::new();
        header
            .push(Tag::RequireName, "glibc".to_owned())
            .push(Tag::RequireName, "zlib >= 1.2".to_owned());
        assert_eq!(
            header.get_as_string_array_or(Tag::RequireName),
            vec!["glibc", "zlib >= 1.2"]
        );
        assert!(header.get_as_string_array_or(Tag::ProvideName).is_empty());
    }
}
