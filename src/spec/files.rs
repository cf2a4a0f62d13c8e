use bitflags::bitflags;

use crate::utils::split_args;

bitflags! {
    /// File attributes from `%files` directives, valued as RPMFILE_* flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FileFlags: u32 {
        const CONFIG = 1 << 0;
        const DOC = 1 << 1;
        const MISSINGOK = 1 << 3;
        const NOREPLACE = 1 << 4;
        const GHOST = 1 << 6;
        const LICENSE = 1 << 7;
        const README = 1 << 8;
        const EXCLUDE = 1 << 9;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub path: String,
    pub flags: FileFlags,
    pub dir: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileList {
    pub entries: Vec<FileEntry>,
    /// Files named by `%files -f`, read at build time.
    pub list_files: Vec<String>,
}

impl FileList {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.list_files.is_empty()
    }

    /// Parses one macro-expanded line of a `%files` section.
    pub fn parse_line(&mut self, line: &str) -> Result<(), String> {
        let mut flags = FileFlags::empty();
        let mut dir = false;
        let mut paths = Vec::new();

        for token in split_args(line) {
            if !is_directive(&token) {
                paths.push(token);
                continue;
            }

            let (name, arg) = match token.split_once('(') {
                Some((name, arg)) => (name.to_owned(), arg.trim_end_matches(')').to_owned()),
                None => (token.clone(), String::new()),
            };
            match name.as_str() {
                "%defattr" | "%docdir" => return Ok(()),
                "%attr" | "%verify" | "%lang" | "%caps" => {}
                "%doc" => flags |= FileFlags::DOC,
                "%license" => flags |= FileFlags::LICENSE,
                "%readme" => flags |= FileFlags::README,
                "%ghost" => flags |= FileFlags::GHOST,
                "%exclude" => flags |= FileFlags::EXCLUDE,
                "%dir" => dir = true,
                "%config" => {
                    flags |= FileFlags::CONFIG;
                    for option in arg.split(',').map(str::trim).filter(|o| !o.is_empty()) {
                        match option {
                            "noreplace" => flags |= FileFlags::NOREPLACE,
                            "missingok" => flags |= FileFlags::MISSINGOK,
                            other => return Err(format!("Invalid %config token: {}", other)),
                        }
                    }
                }
                other => return Err(format!("Invalid file directive: {}", other)),
            }
        }

        let relative_allowed =
            flags.intersects(FileFlags::DOC | FileFlags::LICENSE | FileFlags::README);
        for path in paths {
            if !path.starts_with('/') && !relative_allowed {
                return Err(format!("File must begin with \"/\": {}", path));
            }
            self.entries.push(FileEntry { path, flags, dir });
        }
        Ok(())
    }
}

/// `%doc`-like tokens; `%{...}` leftovers and paths with `/` are file names.
fn is_directive(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next() == Some('%')
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && !token.split('(').next().unwrap_or(token).contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_paths() {
        let mut list = FileList::default();
        list.parse_line("/usr/bin/demo /usr/bin/demo2").unwrap();
        assert_eq!(list.entries.len(), 2);
        assert_eq!(list.entries[0].path, "/usr/bin/demo");
        assert_eq!(list.entries[0].flags, FileFlags::empty());
        assert!(!list.is_empty());
    }

    #[test]
    fn test_directives() {
        let mut list = FileList::default();
        list.parse_line("%defattr(-,root,root,-)").unwrap();
        list.parse_line("%doc README COPYING").unwrap();
        list.parse_line("%config(noreplace) %attr(0640, root, root) /etc/demo.conf").unwrap();
        list.parse_line("%dir /var/lib/demo").unwrap();
        list.parse_line("%ghost /var/log/demo.log").unwrap();

        let paths: Vec<_> = list.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["README", "COPYING", "/etc/demo.conf", "/var/lib/demo", "/var/log/demo.log"]
        );
        assert_eq!(list.entries[0].flags, FileFlags::DOC);
        assert_eq!(list.entries[2].flags, FileFlags::CONFIG | FileFlags::NOREPLACE);
        assert!(list.entries[3].dir);
        assert_eq!(list.entries[4].flags, FileFlags::GHOST);
    }

    #[test]
    fn test_defattr_only_is_empty() {
        let mut list = FileList::default();
        list.parse_line("%defattr(-,root,root)").unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_list_files_count_as_content() {
        let list = FileList {
            entries: Vec::new(),
            list_files: vec!["files.lst".to_owned()],
        };
        assert!(!list.is_empty());
    }

    #[test]
    fn test_errors() {
        let mut list = FileList::default();
        assert!(list.parse_line("usr/bin/demo").is_err());
        assert!(list.parse_line("%config(sometimes) /etc/x").is_err());
        assert!(list.parse_line("%bogus /etc/x").is_err());
    }

    #[test]
    fn test_unexpanded_macro_path() {
        let mut list = FileList::default();
        assert!(list.parse_line("%{_unknowndir}/demo").is_err());
        list.parse_line("%doc %{name}/README").unwrap();
        assert_eq!(list.entries[0].path, "%{name}/README");
    }
}
