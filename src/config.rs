use log::debug;
use std::path::Path;

use crate::error::{Error, Result};
use crate::macros::MacroContext;

const IX86: &str = "i386 i486 i586 i686 pentium3 pentium4 athlon geode";
const ARM: &str = concat!(
    "armv3l armv4b armv4l armv4tl armv5tl armv5tel armv5tejl ",
    "armv6l armv6hl armv7l armv7hl armv7hnl"
);
const X86_64: &str = "x86_64 amd64 em64t";

const LIB64_ARCHES: [&str; 11] = [
    "x86_64", "amd64", "aarch64", "ppc64", "ppc64le", "s390x", "sparc64", "mips64", "mips64el",
    "riscv64", "loongarch64",
];

/// Packaging configuration: target architecture and the macro table
/// every spec is parsed against.
#[derive(Debug, Clone)]
pub struct RpmConfig {
    target_cpu: String,
    target_os: String,
    macros: MacroContext,
}

impl RpmConfig {
    /// Reads the built-in configuration, optionally for a `cpu[-vendor]-os` target.
    pub fn read(target: Option<&str>) -> Result<Self> {
        let (target_cpu, target_os) = match target {
            Some(target) => parse_target(target)?,
            None => (host_cpu().to_owned(), std::env::consts::OS.to_owned()),
        };
        debug!("target cpu {}, os {}", target_cpu, target_os);

        let macros = builtin_macros(&target_cpu, &target_os);
        Ok(Self {
            target_cpu,
            target_os,
            macros,
        })
    }

    pub fn target_cpu(&self) -> &str {
        &self.target_cpu
    }

    pub fn target_os(&self) -> &str {
        &self.target_os
    }

    pub fn macros(&self) -> &MacroContext {
        &self.macros
    }

    pub fn load_macro_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        debug!("loading macros from {}", path.as_ref().display());
        self.macros.load_file(path)
    }

    /// Defines a macro from `NAME VALUE`, as `rpmbuild --define` does.
    pub fn define(&mut self, definition: &str) -> Result<()> {
        let definition = definition.trim();
        let definition = definition.strip_prefix('%').unwrap_or(definition);
        self.macros.define_line(definition, false)
    }

    /// True when the target cpu is in an `%ifarch`-style list.
    pub fn arch_matches(&self, list: &str) -> Result<bool> {
        self.list_matches(list, &self.target_cpu)
    }

    /// True when the target os is in an `%ifos`-style list.
    pub fn os_matches(&self, list: &str) -> Result<bool> {
        self.list_matches(list, &self.target_os)
    }

    fn list_matches(&self, list: &str, value: &str) -> Result<bool> {
        let expanded = self.macros.expand(list)?;
        Ok(expanded
            .split(|c: char| c.is_whitespace() || c == ',')
            .any(|item| item == value))
    }
}

fn parse_target(target: &str) -> Result<(String, String)> {
    let mut parts = target.split('-').filter(|p| !p.is_empty());
    let cpu = parts
        .next()
        .ok_or_else(|| Error::Config(format!("bad target architecture {:?}", target)))?;
    let os = parts.last().unwrap_or(std::env::consts::OS);
    Ok((cpu.to_owned(), os.to_owned()))
}

fn host_cpu() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "i686",
        "arm" => "armv7hl",
        "powerpc" => "ppc",
        "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
        "powerpc64" => "ppc64",
        other => other,
    }
}

fn base_arch(cpu: &str) -> &str {
    if IX86.split(' ').any(|a| a == cpu) {
        "i386"
    } else if ARM.split(' ').any(|a| a == cpu) {
        "arm"
    } else {
        cpu
    }
}

fn builtin_macros(cpu: &str, os: &str) -> MacroContext {
    let libdir = if LIB64_ARCHES.iter().any(|a| *a == cpu) {
        "%{_exec_prefix}/lib64"
    } else {
        "%{_exec_prefix}/lib"
    };
    let platform = format!("{}-%{{_vendor}}-{}", cpu, os);

    let mut macros = MacroContext::new();
    for (name, body) in [
        ("nil", ""),
        ("_target_cpu", cpu),
        ("_target_os", os),
        ("_arch", base_arch(cpu)),
        ("_os", os),
        ("_vendor", "redhat"),
        ("_target_platform", platform.as_str()),
        ("_prefix", "/usr"),
        ("_exec_prefix", "%{_prefix}"),
        ("_bindir", "%{_exec_prefix}/bin"),
        ("_sbindir", "%{_exec_prefix}/sbin"),
        ("_libdir", libdir),
        ("_libexecdir", "%{_exec_prefix}/libexec"),
        ("_datadir", "%{_prefix}/share"),
        ("_sysconfdir", "/etc"),
        ("_localstatedir", "/var"),
        ("_sharedstatedir", "/var/lib"),
        ("_includedir", "%{_prefix}/include"),
        ("_mandir", "%{_datadir}/man"),
        ("_infodir", "%{_datadir}/info"),
        ("_docdir", "%{_datadir}/doc"),
        ("_unitdir", "%{_prefix}/lib/systemd/system"),
        ("ix86", IX86),
        ("arm", ARM),
        ("x86_64", X86_64),
    ] {
        macros.define(name, body);
    }
    macros
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_with_target() {
        let config = RpmConfig::read(Some("i686-redhat-linux")).unwrap();
        assert_eq!(config.target_cpu(), "i686");
        assert_eq!(config.target_os(), "linux");
        assert_eq!(config.macros().expand("%{_arch}").unwrap(), "i386");
        assert_eq!(config.macros().expand("%{_libdir}").unwrap(), "/usr/lib");
    }

    #[test]
    fn test_lib64_targets() {
        let config = RpmConfig::read(Some("x86_64")).unwrap();
        assert_eq!(config.macros().expand("%{_libdir}").unwrap(), "/usr/lib64");
        assert_eq!(
            config.macros().expand("%{_target_platform}").unwrap(),
            format!("x86_64-redhat-{}", config.target_os())
        );
    }

    #[test]
    fn test_bad_target() {
        assert!(matches!(RpmConfig::read(Some("-")), Err(Error::Config(_))));
    }

    #[test]
    fn test_arch_matches() {
        let config = RpmConfig::read(Some("i586")).unwrap();
        assert!(config.arch_matches("%{ix86}").unwrap());
        assert!(config.arch_matches("x86_64, i586").unwrap());
        assert!(!config.arch_matches("x86_64 aarch64").unwrap());
        assert!(config.os_matches(config.target_os()).unwrap());
    }

    #[test]
    fn test_define() {
        let mut config = RpmConfig::read(Some("x86_64")).unwrap();
        config.define("dist .el9").unwrap();
        config.define("%with_docs 1").unwrap();
        assert_eq!(config.macros().expand("1%{?dist}").unwrap(), "1.el9");
        assert_eq!(config.macros().get("with_docs"), Some("1"));
        assert!(matches!(config.define(""), Err(Error::Macro(_))));
    }
}
