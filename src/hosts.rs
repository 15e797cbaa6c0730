//! `/etc/hosts` override management.
//!
//! Lines appended by this module carry a trailing marker comment so they can
//! be told apart from entries written by hand or by other tools. Existing
//! lines are never rewritten or removed.

use crate::error::{Result, SplitRouteError};
use crate::reconciler::Change;
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Marker comment appended to every managed line.
const MANAGED_BY_MARKER: &str = "# managed by splitroute";

/// Default system hosts file.
pub const DEFAULT_HOSTS_FILE: &str = "/etc/hosts";

/// The name-resolution override table.
pub trait OverrideTable {
    /// Returns `true` if any record maps `name`, whatever its address.
    ///
    /// # Errors
    ///
    /// Returns an error if the table could not be read.
    fn has_mapping(&self, name: &str) -> Result<bool>;

    /// Appends an `address name` mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the table could not be written.
    fn append(&self, address: Ipv4Addr, name: &str) -> Result<()>;
}

/// Appends `address name` unless `name` is already mapped.
///
/// With `dry_run`, the check still runs but nothing is written.
///
/// # Errors
///
/// Propagates errors from the table.
pub fn ensure_override<T: OverrideTable + ?Sized>(
    table: &T,
    address: Ipv4Addr,
    name: &str,
    dry_run: bool,
) -> Result<Change> {
    if table.has_mapping(name)? {
        tracing::info!(name = %name, "Hosts entry already present, skipping");
        return Ok(Change::Unchanged);
    }

    if dry_run {
        tracing::info!(name = %name, address = %address, "Would add hosts entry");
        return Ok(Change::WouldApply);
    }

    table.append(address, name)?;
    tracing::info!(name = %name, address = %address, "Added hosts entry");
    Ok(Change::Applied)
}

/// One non-comment line of a hosts file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsRecord {
    /// Address column, verbatim (may be IPv6).
    pub address: String,
    /// Canonical name and aliases.
    pub names: Vec<String>,
    /// Whether the line carries the splitroute marker.
    pub managed: bool,
}

/// [`OverrideTable`] backed by a hosts file.
pub struct HostsFile {
    path: PathBuf,
    elevate: bool,
}

impl HostsFile {
    /// Targets the hosts file at `path`.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            elevate: false,
        }
    }

    /// Appends through `sudo -n tee -a` instead of opening the file directly.
    #[must_use]
    pub const fn with_sudo(mut self, elevate: bool) -> Self {
        self.elevate = elevate;
        self
    }

    /// Returns the hosts file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses every record in the file.
    ///
    /// A missing file has no records.
    ///
    /// # Errors
    ///
    /// Returns [`SplitRouteError::Io`] if the file exists but cannot be read.
    pub fn records(&self) -> Result<Vec<HostsRecord>> {
        Ok(parse_hosts(&self.read()?))
    }

    fn read(&self) -> Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_appended(&self, text: &str) -> Result<()> {
        if self.elevate {
            return tee_append(&self.path, text);
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }
}

impl OverrideTable for HostsFile {
    fn has_mapping(&self, name: &str) -> Result<bool> {
        let found = self
            .records()?
            .into_iter()
            .find(|r| r.names.iter().any(|n| n.eq_ignore_ascii_case(name)));
        if let Some(record) = found.as_ref().filter(|r| !r.managed) {
            tracing::info!(
                name = %name,
                address = %record.address,
                "Hosts entry written by hand or another tool, leaving it"
            );
        }
        Ok(found.is_some())
    }

    fn append(&self, address: Ipv4Addr, name: &str) -> Result<()> {
        let existing = self.read()?;
        let mut text = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&format_line(address, name));
        self.write_appended(&text)?;
        tracing::debug!(path = %self.path.display(), name = %name, "Appended hosts line");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File content helpers
// ---------------------------------------------------------------------------

/// Formats a managed hosts line.
///
/// ```text
/// 10.0.0.5 intranet.example.com # managed by splitroute
/// ```
fn format_line(address: Ipv4Addr, name: &str) -> String {
    format!("{address} {name} {MANAGED_BY_MARKER}\n")
}

/// Parses hosts file content, skipping blank and comment-only lines.
fn parse_hosts(content: &str) -> Vec<HostsRecord> {
    content
        .lines()
        .filter_map(|line| {
            let (data, comment) = match line.split_once('#') {
                Some((data, comment)) => (data, Some(comment)),
                None => (line, None),
            };
            let mut fields = data.split_whitespace();
            let address = fields.next()?;
            let names: Vec<String> = fields.map(ToString::to_string).collect();
            if names.is_empty() {
                return None;
            }
            Some(HostsRecord {
                address: address.to_string(),
                names,
                managed: comment
                    .is_some_and(|c| MANAGED_BY_MARKER.trim_start_matches('#').trim() == c.trim()),
            })
        })
        .collect()
}

/// Appends `text` to `path` via `sudo -n tee -a`.
fn tee_append(path: &Path, text: &str) -> Result<()> {
    let mut child = Command::new("sudo")
        .arg("-n")
        .arg("tee")
        .arg("-a")
        .arg(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(SplitRouteError::CommandFailed {
            command: format!("sudo -n tee -a {}", path.display()),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_HOSTS: &str = "\
##
# Host Database
##
127.0.0.1\tlocalhost
255.255.255.255\tbroadcasthost
::1             localhost
10.0.0.50 app.company.com\t# added by hand
";

    fn hosts_in(dir: &tempfile::TempDir, content: &str) -> HostsFile {
        let path = dir.path().join("hosts");
        std::fs::write(&path, content).unwrap();
        HostsFile::with_path(path)
    }

    #[test]
    fn parse_skips_comments_and_keeps_aliases() {
        let records = parse_hosts("# comment\n\n10.0.0.1 a.example b.example # x\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].names, ["a.example", "b.example"]);
        assert!(!records[0].managed);
    }

    #[test]
    fn has_mapping_matches_whole_names_only() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = hosts_in(&dir, SYSTEM_HOSTS);

        assert!(hosts.has_mapping("app.company.com").unwrap());
        assert!(!hosts.has_mapping("app.co").unwrap());
        assert!(!hosts.has_mapping("company.com").unwrap());
    }

    #[test]
    fn append_adds_marked_line_and_preserves_existing() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = hosts_in(&dir, SYSTEM_HOSTS);

        hosts
            .append(Ipv4Addr::new(10, 0, 0, 5), "intranet.example.com")
            .unwrap();

        let content = std::fs::read_to_string(hosts.path()).unwrap();
        assert!(content.starts_with(SYSTEM_HOSTS));
        assert!(content.ends_with("10.0.0.5 intranet.example.com # managed by splitroute\n"));

        let records = hosts.records().unwrap();
        let last = records.last().unwrap();
        assert_eq!(last.address, "10.0.0.5");
        assert!(last.managed);
    }

    #[test]
    fn append_fixes_missing_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = hosts_in(&dir, "127.0.0.1 localhost");
        hosts.append(Ipv4Addr::new(10, 0, 0, 5), "a.example").unwrap();
        assert_eq!(hosts.records().unwrap().len(), 2);
    }

    #[test]
    fn ensure_override_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = hosts_in(&dir, SYSTEM_HOSTS);
        let addr = Ipv4Addr::new(10, 0, 0, 5);

        assert_eq!(
            ensure_override(&hosts, addr, "intranet.example.com", false).unwrap(),
            Change::Applied
        );
        assert_eq!(
            ensure_override(&hosts, addr, "intranet.example.com", false).unwrap(),
            Change::Unchanged
        );
        let count = hosts
            .records()
            .unwrap()
            .iter()
            .filter(|r| r.names.iter().any(|n| n == "intranet.example.com"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn dry_run_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = hosts_in(&dir, SYSTEM_HOSTS);

        let change =
            ensure_override(&hosts, Ipv4Addr::new(10, 0, 0, 5), "new.example.com", true).unwrap();
        assert_eq!(change, Change::WouldApply);
        assert_eq!(std::fs::read_to_string(hosts.path()).unwrap(), SYSTEM_HOSTS);
    }

    #[test]
    fn missing_file_has_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = HostsFile::with_path(dir.path().join("absent"));
        assert!(hosts.records().unwrap().is_empty());
    }
}
