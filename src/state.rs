//! Persisted record of provisioned endpoints.
//!
//! One entry per line, `endpoint|address|gateway`, append-only and meant to
//! be readable and editable by hand. The same endpoint may appear more than
//! once after a re-provision; the last line for an endpoint wins.

use crate::endpoint::{Endpoint, parse_ipv4};
use crate::error::Result;
use std::collections::HashMap;
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// An endpoint with the address and gateway it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    /// The endpoint as declared.
    pub endpoint: Endpoint,
    /// Resolved IPv4 address.
    pub address: Ipv4Addr,
    /// Gateway the kernel chose at resolution time.
    pub gateway: Option<Ipv4Addr>,
}

impl ResolvedEntry {
    /// Creates an entry.
    #[must_use]
    pub const fn new(endpoint: Endpoint, address: Ipv4Addr, gateway: Option<Ipv4Addr>) -> Self {
        Self {
            endpoint,
            address,
            gateway,
        }
    }

    /// Formats the entry as a store line, without the newline.
    #[must_use]
    pub fn to_line(&self) -> String {
        let gateway = self.gateway.map(|g| g.to_string()).unwrap_or_default();
        format!("{}|{}|{gateway}", self.endpoint, self.address)
    }

    /// Parses a store line. Returns `None` for malformed lines.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split('|');
        let endpoint = fields.next()?.trim();
        let address = parse_ipv4(fields.next()?)?;
        let gateway = match fields.next().map(str::trim) {
            None | Some("") => None,
            Some(g) => Some(parse_ipv4(g)?),
        };
        if endpoint.is_empty() || fields.next().is_some() {
            return None;
        }
        Some(Self::new(Endpoint::new(endpoint), address, gateway))
    }
}

/// Collapses duplicate endpoints, keeping the last entry for each.
///
/// Endpoints keep the position of their first appearance.
#[must_use]
pub fn latest(entries: &[ResolvedEntry]) -> Vec<ResolvedEntry> {
    let mut index: HashMap<&Endpoint, usize> = HashMap::new();
    let mut out: Vec<ResolvedEntry> = Vec::new();
    for entry in entries {
        if let Some(&i) = index.get(&entry.endpoint) {
            out[i] = entry.clone();
        } else {
            index.insert(&entry.endpoint, out.len());
            out.push(entry.clone());
        }
    }
    out
}

/// File-backed state store.
pub struct StateStore {
    path: PathBuf,
    dry_run: bool,
}

impl StateStore {
    /// Creates a store at `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dry_run: false,
        }
    }

    /// In dry-run mode, [`append`](Self::append) and [`reset`](Self::reset)
    /// only report what they would do.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Returns the store path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every entry in file order.
    ///
    /// A missing file is an empty store. Malformed lines are skipped with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns [`SplitRouteError::Io`](crate::SplitRouteError::Io) if the
    /// file exists but cannot be read.
    pub fn load(&self) -> Result<Vec<ResolvedEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match ResolvedEntry::parse_line(line) {
                Some(entry) => entries.push(entry),
                None => tracing::warn!(
                    path = %self.path.display(),
                    line = n + 1,
                    "Skipping malformed state line"
                ),
            }
        }
        Ok(entries)
    }

    /// Returns `true` if the file is missing or holds only whitespace.
    ///
    /// Decided from the raw content, so a store whose lines are all
    /// malformed still counts as non-empty and is never reset implicitly.
    ///
    /// # Errors
    ///
    /// Returns [`SplitRouteError::Io`](crate::SplitRouteError::Io) if the
    /// file exists but cannot be read.
    pub fn is_empty(&self) -> Result<bool> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.trim().is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns `true` if some entry's endpoint equals `endpoint` exactly.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn contains(&self, endpoint: &Endpoint) -> Result<bool> {
        Ok(self.load()?.iter().any(|e| &e.endpoint == endpoint))
    }

    /// Appends one entry and syncs it to disk.
    ///
    /// # Errors
    ///
    /// Returns [`SplitRouteError::Io`](crate::SplitRouteError::Io) on write
    /// failure.
    pub fn append(&self, entry: &ResolvedEntry) -> Result<()> {
        if self.dry_run {
            tracing::info!(entry = %entry.to_line(), "Would record state");
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.to_line())?;
        file.sync_data()?;

        tracing::debug!(entry = %entry.to_line(), "Recorded state");
        Ok(())
    }

    /// Truncates the store.
    ///
    /// # Errors
    ///
    /// Returns [`SplitRouteError::Io`](crate::SplitRouteError::Io) on write
    /// failure.
    pub fn reset(&self) -> Result<()> {
        if self.dry_run {
            tracing::info!(path = %self.path.display(), "Would reset state");
            return Ok(());
        }
        if self.path.exists() {
            std::fs::write(&self.path, "")?;
            tracing::info!(path = %self.path.display(), "Reset state");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(endpoint: &str, address: [u8; 4], gateway: Option<[u8; 4]>) -> ResolvedEntry {
        ResolvedEntry::new(
            Endpoint::new(endpoint),
            Ipv4Addr::from(address),
            gateway.map(Ipv4Addr::from),
        )
    }

    #[test]
    fn line_format() {
        let e = entry("app.example.com", [10, 0, 0, 5], Some([192, 168, 8, 1]));
        assert_eq!(e.to_line(), "app.example.com|10.0.0.5|192.168.8.1");
        assert_eq!(ResolvedEntry::parse_line(&e.to_line()), Some(e));
    }

    #[test]
    fn empty_gateway_field() {
        let e = ResolvedEntry::parse_line("10.0.0.5:8443|10.0.0.5|").unwrap();
        assert_eq!(e.gateway, None);
        assert_eq!(e.endpoint.as_str(), "10.0.0.5:8443");
    }

    #[test]
    fn malformed_lines_rejected() {
        assert_eq!(ResolvedEntry::parse_line("app.example.com"), None);
        assert_eq!(ResolvedEntry::parse_line("app.example.com|not-an-ip|"), None);
        assert_eq!(ResolvedEntry::parse_line("|10.0.0.5|"), None);
        assert_eq!(ResolvedEntry::parse_line("a|10.0.0.5|10.0.0.1|extra"), None);
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state"));
        assert!(store.load().unwrap().is_empty());
        store.reset().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn append_load_and_contains() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("state"));

        store
            .append(&entry("app.company.com", [10, 0, 0, 5], Some([192, 168, 8, 1])))
            .unwrap();
        store
            .append(&entry("10.0.0.9:8443", [10, 0, 0, 9], Some([192, 168, 8, 1])))
            .unwrap();

        assert_eq!(store.load().unwrap().len(), 2);
        assert!(store.contains(&Endpoint::new("app.company.com")).unwrap());
        assert!(!store.contains(&Endpoint::new("app.co")).unwrap());
        assert!(!store.contains(&Endpoint::new("10.0.0.9")).unwrap());
    }

    #[test]
    fn malformed_lines_are_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        std::fs::write(&path, "a.example|10.0.0.1|10.0.0.254\ngarbage\n\nb.example|10.0.0.2|\n")
            .unwrap();
        let entries = StateStore::new(path).load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].endpoint.as_str(), "b.example");
    }

    #[test]
    fn dry_run_does_not_touch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        std::fs::write(&path, "a.example|10.0.0.1|10.0.0.254\n").unwrap();
        let store = StateStore::new(&path).with_dry_run(true);

        store.append(&entry("b.example", [10, 0, 0, 2], None)).unwrap();
        store.reset().unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "a.example|10.0.0.1|10.0.0.254\n"
        );
    }

    #[test]
    fn emptiness_follows_raw_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        let store = StateStore::new(&path);
        assert!(store.is_empty().unwrap());

        std::fs::write(&path, "\n  \n").unwrap();
        assert!(store.is_empty().unwrap());

        std::fs::write(&path, "intranet.example.com 10.0.0.5\n").unwrap();
        assert!(store.load().unwrap().is_empty());
        assert!(!store.is_empty().unwrap());
    }

    #[test]
    fn reset_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state"));
        store.append(&entry("a.example", [10, 0, 0, 1], None)).unwrap();
        store.reset().unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn latest_keeps_last_entry_per_endpoint() {
        let entries = vec![
            entry("a.example", [10, 0, 0, 1], None),
            entry("b.example", [10, 0, 0, 2], None),
            entry("a.example", [10, 0, 0, 3], None),
        ];
        let collapsed = latest(&entries);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].endpoint.as_str(), "a.example");
        assert_eq!(collapsed[0].address, Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(collapsed[1].endpoint.as_str(), "b.example");
    }
}
