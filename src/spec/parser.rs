use log::debug;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use super::expr;
use super::{FileList, Package, Spec, SpecEngine};
use crate::config::RpmConfig;
use crate::error::{Error, Result};
use crate::header::{Header, RType, Tag};
use crate::macros::MacroContext;
use crate::utils::{split_args, split_first_word};

const SCRIPT_SECTIONS: [&str; 29] = [
    "%prep",
    "%build",
    "%install",
    "%check",
    "%clean",
    "%conf",
    "%generate_buildrequires",
    "%pre",
    "%post",
    "%preun",
    "%postun",
    "%pretrans",
    "%posttrans",
    "%preuntrans",
    "%postuntrans",
    "%verifyscript",
    "%sepolicy",
    "%triggerprein",
    "%triggerin",
    "%triggerun",
    "%triggerpostun",
    "%filetriggerin",
    "%filetriggerun",
    "%filetriggerpostun",
    "%transfiletriggerin",
    "%transfiletriggerun",
    "%transfiletriggerpostun",
    "%sourcelist",
    "%patchlist",
];

const CONDITIONALS: [&str; 11] = [
    "%if", "%ifarch", "%ifnarch", "%ifos", "%ifnos", "%elif", "%elseif", "%elifarch", "%elifos",
    "%else", "%endif",
];

/// Tags a subpackage takes from the main package unless it sets them.
const INHERITED_TAGS: [Tag; 9] = [
    Tag::Version,
    Tag::Release,
    Tag::Epoch,
    Tag::License,
    Tag::Group,
    Tag::Url,
    Tag::Vendor,
    Tag::Packager,
    Tag::Distribution,
];

const SOURCE_TAGS: [Tag; 8] = [
    Tag::Name,
    Tag::Version,
    Tag::Release,
    Tag::Epoch,
    Tag::Summary,
    Tag::License,
    Tag::Group,
    Tag::Url,
];

const DEP_OPERATORS: [&str; 6] = ["<", ">", "=", "<=", ">=", "=="];

/// Native spec-grammar engine.
pub struct SpecParser<'a> {
    config: &'a RpmConfig,
}

impl<'a> SpecParser<'a> {
    pub fn new(config: &'a RpmConfig) -> Self {
        Self { config }
    }

    pub fn parse_str(&self, path: &Path, text: &str) -> Result<Spec> {
        let mut state = ParseState::new(self.config, path)?;
        for (line_no, line) in logical_lines(text) {
            state.line_no = line_no;
            state.feed(&line)?;
        }
        state.finish()
    }
}

impl SpecEngine for SpecParser<'_> {
    fn parse_spec(&self, path: &Path) -> Result<Spec> {
        debug!("parsing {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(path, &text)
    }
}

/// Numbered lines, with `\`-continued macro definitions joined.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut raw = text.lines().enumerate();

    while let Some((i, line)) = raw.next() {
        let mut line = line.to_owned();
        let (word, _) = split_first_word(&line);
        if matches!(word, "%define" | "%global") {
            while line.ends_with('\\') {
                line.pop();
                match raw.next() {
                    Some((_, next)) => {
                        line.push('\n');
                        line.push_str(next);
                    }
                    None => break,
                }
            }
        }
        lines.push((i + 1, line));
    }
    lines
}

fn split_deps(value: &str) -> std::result::Result<Vec<String>, String> {
    let mut deps = Vec::new();
    for chunk in value.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if chunk.starts_with('(') {
            deps.push(chunk.to_owned());
            continue;
        }

        let mut words = chunk.split_whitespace().peekable();
        while let Some(name) = words.next() {
            match words.peek() {
                Some(op) if DEP_OPERATORS.iter().any(|o| o == op) => {
                    let op = words.next().unwrap_or_default();
                    let version = words.next().ok_or_else(|| {
                        format!("Versioned dependency missing version: {} {}", name, op)
                    })?;
                    deps.push(format!("{} {} {}", name, op, version));
                }
                _ => deps.push(name.to_owned()),
            }
        }
    }
    Ok(deps)
}

fn is_numbered(tag: &str, prefix: &str) -> bool {
    tag.strip_prefix(prefix)
        .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Preamble(usize),
    Description(usize),
    Files(usize),
    Script,
    Changelog,
}

#[derive(Debug)]
struct Condition {
    active: bool,
    taken: bool,
    seen_else: bool,
}

struct ParseState<'a> {
    config: &'a RpmConfig,
    path: PathBuf,
    line_no: usize,
    macros: MacroContext,
    tag_re: Regex,
    conditions: Vec<Condition>,
    section: Section,
    description: Vec<String>,
    packages: Vec<Package>,
    source_header: Header,
}

impl<'a> ParseState<'a> {
    fn new(config: &'a RpmConfig, path: &Path) -> Result<Self> {
        let tag_re = Regex::new(r"^([A-Za-z][A-Za-z0-9]*)\s*(\(([^)]*)\))?\s*:\s*(.*)$")
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            config,
            path: path.to_path_buf(),
            line_no: 0,
            macros: config.macros().clone(),
            tag_re,
            conditions: Vec::new(),
            section: Section::Preamble(0),
            description: Vec::new(),
            packages: vec![Package::default()],
            source_header: Header::new(),
        })
    }

    fn error<S: Into<String>>(&self, message: S) -> Error {
        Error::SpecParse {
            path: self.path.clone(),
            line: self.line_no,
            message: message.into(),
        }
    }

    fn lift(&self, err: Error) -> Error {
        match err {
            Error::Macro(message) => self.error(message),
            other => other,
        }
    }

    fn expand(&self, text: &str) -> Result<String> {
        self.macros.expand(text).map_err(|e| self.lift(e))
    }

    fn is_active(&self) -> bool {
        self.conditions.iter().all(|c| c.active)
    }

    fn feed(&mut self, line: &str) -> Result<()> {
        let (word, rest) = split_first_word(line);

        if CONDITIONALS.iter().any(|c| *c == word) {
            return self.conditional(word, rest);
        }
        if !self.is_active() {
            return Ok(());
        }

        if self.section != Section::Changelog {
            match word {
                "%define" => return self.macros.define_line(rest, false).map_err(|e| self.lift(e)),
                "%global" => return self.macros.define_line(rest, true).map_err(|e| self.lift(e)),
                "%undefine" => {
                    self.macros.undefine(rest.trim());
                    return Ok(());
                }
                "%bcond_with" | "%bcond_without" | "%bcond" => return self.bcond(word, rest),
                _ => {}
            }
        }

        if matches!(word, "%package" | "%description" | "%files" | "%changelog")
            || SCRIPT_SECTIONS.iter().any(|s| *s == word)
        {
            return self.start_section(word, rest);
        }

        match self.section {
            Section::Preamble(idx) => self.preamble(idx, line),
            Section::Description(_) => {
                let expanded = self.expand(line)?;
                self.description.push(expanded);
                Ok(())
            }
            Section::Files(idx) => self.files_line(idx, line),
            Section::Script | Section::Changelog => Ok(()),
        }
    }

    fn conditional(&mut self, word: &str, rest: &str) -> Result<()> {
        match word {
            "%if" | "%ifarch" | "%ifnarch" | "%ifos" | "%ifnos" => {
                let parent_active = self.is_active();
                let active = parent_active && self.test(word, rest)?;
                self.conditions.push(Condition {
                    active,
                    taken: active || !parent_active,
                    seen_else: false,
                });
            }
            "%else" => {
                let mut top = self
                    .conditions
                    .pop()
                    .ok_or_else(|| self.error("%else with no %if"))?;
                if top.seen_else {
                    return Err(self.error("%else after %else"));
                }
                top.active = !top.taken;
                top.taken = true;
                top.seen_else = true;
                self.conditions.push(top);
            }
            "%endif" => {
                self.conditions
                    .pop()
                    .ok_or_else(|| self.error("%endif with no %if"))?;
            }
            _ => {
                let mut top = self
                    .conditions
                    .pop()
                    .ok_or_else(|| self.error(format!("{} with no %if", word)))?;
                if top.seen_else {
                    return Err(self.error(format!("{} after %else", word)));
                }
                let parent_active = self.is_active();
                top.active = !top.taken && parent_active && self.test(word, rest)?;
                top.taken |= top.active;
                self.conditions.push(top);
            }
        }
        Ok(())
    }

    /// `%bcond_with NAME`, `%bcond_without NAME` and `%bcond NAME DEFAULT`.
    fn bcond(&mut self, word: &str, rest: &str) -> Result<()> {
        let expanded = self.expand(rest)?;
        let (name, default) = split_first_word(expanded.trim());
        if name.is_empty() {
            return Err(self.error(format!("{} requires a name", word)));
        }

        let default_on = match word {
            "%bcond_with" => false,
            "%bcond_without" => true,
            _ if default.trim().is_empty() => {
                return Err(self.error(format!("%bcond {} requires a default", name)));
            }
            _ => expr::evaluate(default).map_err(|m| self.error(m))?,
        };
        self.macros.bcond(name, default_on);
        Ok(())
    }

    fn test(&self, word: &str, rest: &str) -> Result<bool> {
        let expanded = self.expand(rest)?;
        let result = match word {
            "%ifarch" | "%elifarch" => self.config.arch_matches(&expanded),
            "%ifnarch" => self.config.arch_matches(&expanded).map(|m| !m),
            "%ifos" | "%elifos" => self.config.os_matches(&expanded),
            "%ifnos" => self.config.os_matches(&expanded).map(|m| !m),
            _ => return expr::evaluate(&expanded).map_err(|m| self.error(m)),
        };
        result.map_err(|e| self.lift(e))
    }

    fn start_section(&mut self, word: &str, rest: &str) -> Result<()> {
        self.finish_section();
        let args = split_args(&self.expand(rest)?);

        self.section = match word {
            "%package" => Section::Preamble(self.new_package(&args)?),
            "%description" => {
                let (idx, _) = self.find_package(word, &args, false)?;
                if self.packages[idx].header.contains(Tag::Description) {
                    let name = self.packages[idx].name();
                    return Err(self.error(format!("second %description for {}", name)));
                }
                Section::Description(idx)
            }
            "%files" => {
                let (idx, list_files) = self.find_package(word, &args, true)?;
                if self.packages[idx].files.is_some() {
                    let name = self.packages[idx].name();
                    return Err(self.error(format!("second %files for {}", name)));
                }
                self.packages[idx].files = Some(FileList {
                    entries: Vec::new(),
                    list_files,
                });
                Section::Files(idx)
            }
            "%changelog" => Section::Changelog,
            _ => Section::Script,
        };
        debug!("line {}: {} section", self.line_no, word);
        Ok(())
    }

    fn finish_section(&mut self) {
        if let Section::Description(idx) = self.section {
            let text = std::mem::take(&mut self.description).join("\n");
            self.packages[idx]
                .header
                .insert(Tag::Description, RType::String(text.trim_end().to_owned()));
        }
    }

    /// Resolves `[-n] name` section arguments to a full package name.
    fn section_args(
        &self,
        word: &str,
        args: &[String],
        allow_list: bool,
    ) -> Result<(Option<String>, Vec<String>)> {
        let mut name = None;
        let mut explicit = false;
        let mut list_files = Vec::new();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-n" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| {
                            self.error(format!("{}: -n requires a package name", word))
                        })?;
                    name = Some(value.clone());
                    explicit = true;
                }
                "-f" if allow_list => {
                    let value = iter
                        .next()
                        .ok_or_else(|| self.error(format!("{}: -f requires a file name", word)))?;
                    list_files.push(value.clone());
                }
                option if option.starts_with('-') => {
                    return Err(self.error(format!("Bad option {} in {}", option, word)));
                }
                value => {
                    if name.is_some() {
                        return Err(self.error(format!("Too many names in {}: {}", word, value)));
                    }
                    name = Some(value.to_owned());
                }
            }
        }

        let full = match name {
            Some(name) if !explicit => Some(format!("{}-{}", self.main_name()?, name)),
            other => other,
        };
        Ok((full, list_files))
    }

    fn main_name(&self) -> Result<String> {
        self.packages[0]
            .header
            .get_as_string(Tag::Name)
            .ok_or_else(|| self.error("Name field must be present in package: (main package)"))
    }

    fn new_package(&mut self, args: &[String]) -> Result<usize> {
        let (name, _) = self.section_args("%package", args, false)?;
        let name = name.ok_or_else(|| self.error("%package requires a name"))?;
        if self.packages.iter().any(|p| p.name() == name) {
            return Err(self.error(format!("Package already exists: {}", name)));
        }

        debug!("line {}: package {}", self.line_no, name);
        let mut package = Package::default();
        package.header.insert(Tag::Name, RType::String(name));
        self.packages.push(package);
        Ok(self.packages.len() - 1)
    }

    fn find_package(
        &self,
        word: &str,
        args: &[String],
        allow_list: bool,
    ) -> Result<(usize, Vec<String>)> {
        let (name, list_files) = self.section_args(word, args, allow_list)?;
        let idx = match name {
            None => 0,
            Some(name) => self
                .packages
                .iter()
                .position(|p| p.name() == name)
                .ok_or_else(|| self.error(format!("{}: package {} does not exist", word, name)))?,
        };
        Ok((idx, list_files))
    }

    fn preamble(&mut self, idx: usize, line: &str) -> Result<()> {
        let expanded = self.expand(line)?;
        let trimmed = expanded.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        let (tag, value) = match self.tag_re.captures(trimmed) {
            Some(caps) => (caps[1].to_owned(), caps[4].trim().to_owned()),
            None => return Err(self.error(format!("Unknown tag: {}", trimmed))),
        };
        if value.is_empty() {
            return Err(self.error(format!("Empty tag: {}:", tag)));
        }

        let lower = tag.to_ascii_lowercase();
        match lower.as_str() {
            "name" => self.set_once(idx, Tag::Name, value)?,
            "version" | "release" => {
                if value.contains('-') {
                    return Err(self.error(format!("Illegal char '-' in: {}: {}", tag, value)));
                }
                let rpm_tag = if lower == "version" { Tag::Version } else { Tag::Release };
                self.set_once(idx, rpm_tag, value)?;
            }
            "epoch" => {
                let epoch: u32 = value.parse().map_err(|_| {
                    self.error(format!("Epoch field must be an unsigned number: {}", value))
                })?;
                if idx == 0 {
                    self.macros.define("epoch", &value);
                }
                self.packages[idx].header.insert(Tag::Epoch, RType::Int32(epoch));
            }
            "summary" => self.set_once(idx, Tag::Summary, value)?,
            "license" | "copyright" => self.set_once(idx, Tag::License, value)?,
            "group" => self.set_once(idx, Tag::Group, value)?,
            "url" => self.set_once(idx, Tag::Url, value)?,
            "vendor" => self.set_once(idx, Tag::Vendor, value)?,
            "packager" => self.set_once(idx, Tag::Packager, value)?,
            "distribution" => self.set_once(idx, Tag::Distribution, value)?,
            "buildarch" | "buildarchitectures" | "buildarchs" => {
                self.push_words(idx, Tag::BuildArchs, &value)
            }
            "exclusivearch" => self.push_words(idx, Tag::ExclusiveArch, &value),
            "excludearch" => self.push_words(idx, Tag::ExcludeArch, &value),
            "prefix" | "prefixes" => self.push_words(idx, Tag::Prefixes, &value),
            "requires" | "prereq" => self.push_deps(Some(idx), Tag::RequireName, &value)?,
            "provides" => self.push_deps(Some(idx), Tag::ProvideName, &value)?,
            "conflicts" => self.push_deps(Some(idx), Tag::ConflictName, &value)?,
            "obsoletes" => self.push_deps(Some(idx), Tag::ObsoleteName, &value)?,
            "recommends" => self.push_deps(Some(idx), Tag::RecommendName, &value)?,
            "suggests" => self.push_deps(Some(idx), Tag::SuggestName, &value)?,
            "buildrequires" | "buildprereq" => self.push_deps(None, Tag::RequireName, &value)?,
            "buildconflicts" => self.push_deps(None, Tag::ConflictName, &value)?,
            "buildroot" | "autoreq" | "autoprov" | "autoreqprov" | "nosource" | "nopatch"
            | "supplements" | "enhances" | "orderwithrequires" | "bugurl" | "vcs" => {
                debug!("line {}: ignoring {} tag", self.line_no, tag);
            }
            other if is_numbered(other, "source") => {
                self.source_header.push(Tag::Source, value);
            }
            other if is_numbered(other, "patch") => {
                self.source_header.push(Tag::Patch, value);
            }
            _ => return Err(self.error(format!("Unknown tag: {}", trimmed))),
        }
        Ok(())
    }

    fn set_once(&mut self, idx: usize, tag: Tag, value: String) -> Result<()> {
        if self.packages[idx].header.contains(tag) {
            return Err(self.error(format!("Duplicate {} entries", tag)));
        }
        if idx == 0 && matches!(tag, Tag::Name | Tag::Version | Tag::Release) {
            self.macros.define(&tag.to_string().to_ascii_lowercase(), &value);
        }
        self.packages[idx].header.insert(tag, RType::String(value));
        Ok(())
    }

    fn push_words(&mut self, idx: usize, tag: Tag, value: &str) {
        for word in value.split(|c: char| c.is_whitespace() || c == ',').filter(|w| !w.is_empty()) {
            self.packages[idx].header.push(tag, word.to_owned());
        }
    }

    /// `None` targets the source header, where build dependencies live.
    fn push_deps(&mut self, idx: Option<usize>, tag: Tag, value: &str) -> Result<()> {
        let deps = split_deps(value).map_err(|m| self.error(m))?;
        let header = match idx {
            Some(idx) => &mut self.packages[idx].header,
            None => &mut self.source_header,
        };
        for dep in deps {
            header.push(tag, dep);
        }
        Ok(())
    }

    fn files_line(&mut self, idx: usize, line: &str) -> Result<()> {
        let expanded = self.expand(line)?;
        let trimmed = expanded.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        let list = self.packages[idx].files.get_or_insert_with(FileList::default);
        let result = list.parse_line(trimmed);
        result.map_err(|m| self.error(m))
    }

    fn finish(mut self) -> Result<Spec> {
        self.finish_section();
        if !self.conditions.is_empty() {
            return Err(self.error("Unclosed %if"));
        }

        let main = self.packages[0].header.clone();
        for tag in [Tag::Name, Tag::Version, Tag::Release] {
            if !main.contains(tag) {
                return Err(self.error(format!(
                    "{} field must be present in package: (main package)",
                    tag
                )));
            }
        }

        let main_arch = main.get_as_string_array_or(Tag::BuildArchs).into_iter().next();
        let target_cpu = self.config.target_cpu().to_owned();
        let target_os = self.config.target_os().to_owned();

        for (i, package) in self.packages.iter_mut().enumerate() {
            if i > 0 {
                for tag in INHERITED_TAGS {
                    if package.header.contains(tag) {
                        continue;
                    }
                    if let Some(value) = main.get_value(tag) {
                        package.header.insert(tag, value.clone());
                    }
                }
            }

            let arch = package
                .header
                .get_as_string_array_or(Tag::BuildArchs)
                .into_iter()
                .next()
                .or_else(|| main_arch.clone())
                .unwrap_or_else(|| target_cpu.clone());
            debug!("package {} arch {}", package.name(), arch);
            package
                .header
                .insert(Tag::Arch, RType::String(arch))
                .insert(Tag::Os, RType::String(target_os.clone()));
        }

        for tag in SOURCE_TAGS {
            if let Some(value) = main.get_value(tag) {
                self.source_header.insert(tag, value.clone());
            }
        }

        Ok(Spec {
            packages: self.packages,
            source_header: self.source_header,
        })
    }
}
