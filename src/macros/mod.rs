use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

const MAX_DEPTH: usize = 64;

/// Stacked macro table: `%define` pushes a body, `%undefine` pops it.
#[derive(Debug, Clone, Default)]
pub struct MacroContext {
    macros: HashMap<String, Vec<String>>,
}

impl MacroContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, body: &str) {
        debug!("define %{} = {:?}", name, body);
        self.macros
            .entry(name.to_owned())
            .or_default()
            .push(body.to_owned());
    }

    pub fn undefine(&mut self, name: &str) {
        if let Some(stack) = self.macros.get_mut(name) {
            stack.pop();
            if stack.is_empty() {
                self.macros.remove(name);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.macros
            .get(name)
            .and_then(|stack| stack.last())
            .map(String::as_str)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Declares a build conditional. `with_NAME` is defined when the option is
    /// on, which `_with_NAME` or `_without_NAME` override.
    pub fn bcond(&mut self, name: &str, default_on: bool) {
        let enabled = if default_on {
            !self.is_defined(&format!("_without_{}", name))
        } else {
            self.is_defined(&format!("_with_{}", name))
        };
        debug!("build conditional {} {}", name, if enabled { "on" } else { "off" });
        if enabled {
            self.define(&format!("with_{}", name), "1");
        }
    }

    /// Handles the text after `%define` or `%global`: `name[(opts)] body`.
    ///
    /// `%global` bodies are expanded at definition time, `%define` bodies on use.
    pub fn define_line(&mut self, line: &str, expand_body: bool) -> Result<()> {
        let line = line.trim();
        let name_end = line
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(line.len());
        let name = &line[..name_end];
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(Error::Macro(format!("Macro %{} has illegal name", line)));
        }

        let mut rest = &line[name_end..];
        if rest.starts_with('(') {
            if let Some(close) = rest.find(')') {
                warn!("macro %{} options are not substituted", name);
                rest = &rest[close + 1..];
            }
        }

        let body = rest.trim();
        if body.is_empty() {
            return Err(Error::Macro(format!("Macro %{} has empty body", name)));
        }

        let body = if expand_body {
            self.expand(body)?
        } else {
            body.to_owned()
        };
        self.define(name, &body);
        Ok(())
    }

    /// Reads a macro file: `%name body` lines, `\` continues a line, `#` comments.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::Open {
            path: path.to_owned(),
            source,
        })?;
        let mut pending = String::new();

        for line in text.lines() {
            if let Some(stripped) = line.strip_suffix('\\') {
                pending.push_str(stripped);
                pending.push('\n');
                continue;
            }
            pending.push_str(line);
            let entry = std::mem::take(&mut pending);
            let entry = entry.trim();

            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            match entry.strip_prefix('%') {
                Some(definition) => self.define_line(definition, false)?,
                None => warn!("{}: ignoring line {:?}", path.display(), entry),
            }
        }
        Ok(())
    }

    pub fn expand(&self, text: &str) -> Result<String> {
        self.expand_at(text, 0)
    }

    fn expand_at(&self, text: &str, depth: usize) -> Result<String> {
        if depth > MAX_DEPTH {
            return Err(Error::Macro("macro recursion depth exceeded".to_owned()));
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            rest = &rest[pos + 1..];

            match rest.chars().next() {
                Some('%') => {
                    out.push('%');
                    rest = &rest[1..];
                }
                Some('{') => {
                    let close = find_close(&rest[1..], '{', '}').ok_or_else(|| {
                        Error::Macro(format!("Unterminated {{: %{}", rest))
                    })?;
                    let inner = &rest[1..close + 1];
                    out.push_str(&self.expand_braced(inner, depth)?);
                    rest = &rest[close + 2..];
                }
                Some('(') => {
                    let close = find_close(&rest[1..], '(', ')').ok_or_else(|| {
                        Error::Macro(format!("Unterminated (: %{}", rest))
                    })?;
                    let verbatim = &rest[..close + 2];
                    warn!("shell expansion %{} is not executed", verbatim);
                    out.push('%');
                    out.push_str(verbatim);
                    rest = &rest[close + 2..];
                }
                Some(c) if c == '?' || c == '!' || c == '_' || c.is_ascii_alphanumeric() => {
                    let flags_end = rest
                        .find(|c: char| c != '?' && c != '!')
                        .unwrap_or(rest.len());
                    let flags = &rest[..flags_end];
                    let name_len = rest[flags_end..]
                        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                        .unwrap_or(rest.len() - flags_end);
                    let name = &rest[flags_end..flags_end + name_len];

                    if name.is_empty() {
                        out.push('%');
                        continue;
                    }

                    let conditional = flags.contains('?');
                    let negate = flags.contains('!');
                    match self.get(name) {
                        Some(_) if conditional && negate => {}
                        Some(body) => out.push_str(&self.expand_at(body, depth + 1)?),
                        None if conditional => {}
                        None => {
                            out.push('%');
                            out.push_str(&rest[..flags_end + name_len]);
                        }
                    }
                    rest = &rest[flags_end + name_len..];
                }
                _ => out.push('%'),
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    fn expand_braced(&self, inner: &str, depth: usize) -> Result<String> {
        if let Some((test @ ("with" | "without" | "defined" | "undefined"), arg)) =
            inner.split_once(char::is_whitespace)
        {
            let arg = self.expand_at(arg.trim(), depth + 1)?;
            let defined = match test {
                "with" | "without" => self.is_defined(&format!("with_{}", arg)),
                _ => self.is_defined(&arg),
            };
            let negate = matches!(test, "without" | "undefined");
            return Ok(if defined != negate { "1" } else { "0" }.to_owned());
        }

        let flags_end = inner
            .find(|c: char| c != '?' && c != '!')
            .unwrap_or(inner.len());
        let flags = &inner[..flags_end];
        let conditional = flags.contains('?');
        let negate = flags.contains('!');

        let (name, arg) = match inner[flags_end..].split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (&inner[flags_end..], None),
        };

        if conditional {
            if self.is_defined(name) == negate {
                return Ok(String::new());
            }
            return match (arg, self.get(name)) {
                (Some(arg), _) => self.expand_at(arg, depth + 1),
                (None, Some(body)) if !negate => self.expand_at(body, depth + 1),
                _ => Ok(String::new()),
            };
        }

        match (name, arg) {
            ("expand", Some(arg)) => {
                let once = self.expand_at(arg, depth + 1)?;
                self.expand_at(&once, depth + 1)
            }
            ("lower", Some(arg)) => Ok(self.expand_at(arg, depth + 1)?.to_lowercase()),
            ("upper", Some(arg)) => Ok(self.expand_at(arg, depth + 1)?.to_uppercase()),
            ("basename", Some(arg)) => {
                let value = self.expand_at(arg, depth + 1)?;
                Ok(value.rsplit('/').next().unwrap_or_default().to_owned())
            }
            ("dirname", Some(arg)) => {
                let value = self.expand_at(arg, depth + 1)?;
                Ok(match value.rfind('/') {
                    Some(0) => "/".to_owned(),
                    Some(pos) => value[..pos].to_owned(),
                    None => value,
                })
            }
            ("lua", Some(_)) => {
                warn!("lua expansion %{{{}}} is not executed", inner);
                Ok(format!("%{{{}}}", inner))
            }
            _ => match self.get(name) {
                Some(body) => self.expand_at(body, depth + 1),
                None => Ok(format!("%{{{}}}", inner)),
            },
        }
    }
}

/// Byte offset of the `close` matching an already consumed `open`.
fn find_close(text: &str, open: char, close: char) -> Option<usize> {
    let mut level = 0_usize;
    for (i, c) in text.char_indices() {
        if c == open {
            level += 1;
        } else if c == close {
            if level == 0 {
                return Some(i);
            }
            level -= 1;
        }
    }
    None
}
