use crate::error::Result;
use crate::spec::{Package, Spec};

use super::EmittedPackage;

const NOARCH: &str = "noarch";
const ARCH_FORMAT: &str = "%{ARCH}";

/// Noarch flag shared across one walk: set by the first noarch package and
/// never cleared, so every later package reports it too.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoarchLatch(bool);

impl NoarchLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, arch: &str) -> bool {
        if arch == NOARCH {
            self.0 = true;
        }
        self.0
    }
}

/// Packages that build a binary rpm, in declaration order.
pub fn binary_packages(spec: &Spec) -> impl Iterator<Item = &Package> {
    spec.packages.iter().filter(|package| package.is_binary())
}

pub fn extract(package: &Package, latch: &mut NoarchLatch) -> Result<EmittedPackage> {
    let nevra = package.header.nevra()?;
    let resolved_arch = package.header.sprintf(ARCH_FORMAT)?;

    Ok(EmittedPackage {
        name: nevra.name,
        version: nevra.version,
        release: nevra.release,
        noarch: latch.observe(&resolved_arch),
        arch: nevra.arch,
    })
}

pub fn collect_packages(spec: &Spec) -> Result<Vec<EmittedPackage>> {
    let mut latch = NoarchLatch::new();
    binary_packages(spec)
        .map(|package| extract(package, &mut latch))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::header::{Header, RType, Tag};
    use crate::spec::{FileEntry, FileFlags, FileList};

    fn package(name: &str, arch: &str, files: Option<usize>) -> Package {
        let mut header = Header::new();
        header
            .insert(Tag::Name, RType::String(name.to_owned()))
            .insert(Tag::Version, RType::String("1.0".to_owned()))
            .insert(Tag::Release, RType::String("1".to_owned()))
            .insert(Tag::Arch, RType::String(arch.to_owned()));

        let files = files.map(|count| FileList {
            entries: (0..count)
                .map(|i| FileEntry {
                    path: format!("/usr/share/{}/{}", name, i),
                    flags: FileFlags::empty(),
                    dir: false,
                })
                .collect(),
            list_files: Vec::new(),
        });
        Package { header, files }
    }

    fn spec_of(packages: Vec<Package>) -> Spec {
        Spec {
            packages,
            ..Default::default()
        }
    }

    #[test]
    fn test_latch() {
        let mut latch = NoarchLatch::new();
        assert!(!latch.observe("x86_64"));
        assert!(latch.observe("noarch"));
        assert!(latch.observe("x86_64"));
        assert_eq!(latch, NoarchLatch(true));
    }

    #[test]
    fn test_binary_packages_skip_empty_and_absent() {
        let spec = spec_of(vec![
            package("main", "x86_64", Some(1)),
            package("empty", "x86_64", Some(0)),
            package("absent", "x86_64", None),
            package("last", "x86_64", Some(2)),
        ]);
        let names: Vec<_> = binary_packages(&spec).map(Package::name).collect();
        assert_eq!(names, vec!["main", "last"]);
    }

    #[test]
    fn test_noarch_latches_for_later_packages() {
        let spec = spec_of(vec![
            package("one", "x86_64", Some(1)),
            package("two", "noarch", Some(1)),
            package("three", "x86_64", Some(1)),
        ]);
        let packages = collect_packages(&spec).unwrap();
        let flags: Vec<_> = packages.iter().map(|p| p.noarch).collect();
        assert_eq!(flags, vec![false, true, true]);
        assert_eq!(packages[2].arch, "x86_64");
    }

    #[test]
    fn test_latch_starts_fresh_per_walk() {
        let spec = spec_of(vec![
            package("two", "noarch", Some(1)),
            package("three", "x86_64", Some(1)),
        ]);
        collect_packages(&spec).unwrap();

        let again = spec_of(vec![package("three", "x86_64", Some(1))]);
        assert!(!collect_packages(&again).unwrap()[0].noarch);
    }

    #[test]
    fn test_missing_field() {
        let mut broken = package("broken", "x86_64", Some(1));
        broken.header = Header::new();
        broken.header.insert(Tag::Name, RType::String("broken".to_owned()));

        let err = collect_packages(&spec_of(vec![broken])).unwrap_err();
        assert!(matches!(err, Error::MissingField(Tag::Version)));
    }
}
