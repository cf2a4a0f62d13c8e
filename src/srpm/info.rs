use itertools::Itertools;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use super::collect_packages;
use crate::error::{Error, Result};
use crate::spec::Spec;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmittedPackage {
    pub name: String,
    pub version: String,
    pub release: String,
    #[serde(serialize_with = "serialize_flag")]
    pub noarch: bool,
    pub arch: String,
}

/// Binary packages built from one source rpm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SrpmInfo {
    pub srcrpm: String,
    pub packages: Vec<EmittedPackage>,
}

fn serialize_flag<S>(flag: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(flag_str(*flag))
}

fn flag_str(flag: bool) -> &'static str {
    if flag { "1" } else { "0" }
}

fn quote(value: &str) -> Value {
    Value::String(value.to_owned())
}

impl SrpmInfo {
    pub fn from_spec(srcrpm: &str, spec: &Spec) -> Result<Self> {
        if spec.packages.is_empty() {
            return Err(Error::SpecBinding("spec has no packages".to_owned()));
        }

        Ok(SrpmInfo {
            srcrpm: srcrpm.to_owned(),
            packages: collect_packages(spec)?,
        })
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for EmittedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\"name\":{}, \"version\":{}, \"release\":{}, \"noarch\":\"{}\", \"arch\":{}}}",
            quote(&self.name),
            quote(&self.version),
            quote(&self.release),
            flag_str(self.noarch),
            quote(&self.arch)
        )
    }
}

impl fmt::Display for SrpmInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{ \"srcrpm\":{},", quote(&self.srcrpm))?;
        writeln!(f, "  \"packages\":[")?;
        let packages = self.packages.iter().map(|p| format!("    {}", p)).join(",");
        writeln!(f, "{}]", packages)?;
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn demo(name: &str, noarch: bool, arch: &str) -> EmittedPackage {
        EmittedPackage {
            name: name.to_owned(),
            version: "1.0".to_owned(),
            release: "1".to_owned(),
            noarch,
            arch: arch.to_owned(),
        }
    }

    #[test]
    fn test_display_layout() {
        let info = SrpmInfo {
            srcrpm: "demo-1.0-1.src.rpm".to_owned(),
            packages: vec![demo("demo", false, "x86_64"), demo("demo-doc", true, "noarch")],
        };
        let expected = concat!(
            "{ \"srcrpm\":\"demo-1.0-1.src.rpm\",\n",
            "  \"packages\":[\n",
            "    {\"name\":\"demo\", \"version\":\"1.0\", \"release\":\"1\", ",
            "\"noarch\":\"0\", \"arch\":\"x86_64\"},",
            "    {\"name\":\"demo-doc\", \"version\":\"1.0\", \"release\":\"1\", ",
            "\"noarch\":\"1\", \"arch\":\"noarch\"}]\n",
            "}\n",
        );
        assert_eq!(info.to_string(), expected);
    }

    #[test]
    fn test_display_empty() {
        let info = SrpmInfo {
            srcrpm: "x.src.rpm".to_owned(),
            packages: Vec::new(),
        };
        assert_eq!(info.to_string(), "{ \"srcrpm\":\"x.src.rpm\",\n  \"packages\":[\n]\n}\n");

        let value: Value = serde_json::from_str(&info.to_string()).unwrap();
        assert_eq!(value["packages"], Value::Array(Vec::new()));
    }

    #[test]
    fn test_display_escapes_strings() {
        let info = SrpmInfo {
            srcrpm: "we\"ird\\.src.rpm".to_owned(),
            packages: vec![demo("a\"b", false, "x86_64")],
        };
        let value: Value = serde_json::from_str(&info.to_string()).unwrap();
        assert_eq!(value["srcrpm"], "we\"ird\\.src.rpm");
        assert_eq!(value["packages"][0]["name"], "a\"b");
    }

    #[test]
    fn test_pretty_json_matches_display() {
        let info = SrpmInfo {
            srcrpm: "demo-1.0-1.src.rpm".to_owned(),
            packages: vec![demo("demo", true, "noarch")],
        };
        let pretty: Value = serde_json::from_str(&info.to_pretty_json().unwrap()).unwrap();
        let legacy: Value = serde_json::from_str(&info.to_string()).unwrap();
        assert_eq!(pretty, legacy);
        assert_eq!(pretty["packages"][0]["noarch"], "1");
    }

    #[test]
    fn test_from_spec_without_packages() {
        let err = SrpmInfo::from_spec("x.src.rpm", &Spec::default()).unwrap_err();
        assert!(matches!(err, Error::SpecBinding(_)));
    }
}
