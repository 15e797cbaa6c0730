//! Converges `/etc/hosts` and the routing table to the declared endpoints.
//!
//! A run goes through four phases:
//!
//! 1. Select the interface, if routes are bound to one. Failing here aborts
//!    before anything is written.
//! 2. Diff the declared endpoints against the state store. With an empty
//!    store file or `ignore_state`, the store is reset and every endpoint is
//!    pending; otherwise only endpoints the store has never seen are. A file
//!    holding only malformed lines is not empty and is kept.
//! 3. Resolve each pending endpoint to an address and gateway and append it
//!    to the store. Failures skip that endpoint for this run only.
//! 4. Replay every stored entry through the hosts writer and the route
//!    provisioner. Both are idempotent, so already-provisioned entries are
//!    re-verified rather than re-applied.

use crate::endpoint::Endpoint;
use crate::error::{Result, SplitRouteError};
use crate::hosts::{OverrideTable, ensure_override};
use crate::interface::{InterfaceSource, select_interface};
use crate::resolver::{DnsLookup, resolve};
use crate::routes::{RouteTarget, RoutingTable, ensure_route};
use crate::state::{ResolvedEntry, StateStore, latest};
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

/// Outcome of an idempotent ensure operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Already in place.
    Unchanged,
    /// Written.
    Applied,
    /// Would have been written (dry run).
    WouldApply,
}

/// Run-level switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Read everything, write nothing.
    pub dry_run: bool,
    /// Bind routes to an active interface instead of gateway + MAC.
    pub auto_detect_interface: bool,
    /// Discard the state store and re-resolve every endpoint.
    pub ignore_state: bool,
    /// Hardware port name to look for in auto-detect mode.
    pub hardware_port: String,
    /// MAC address used for gateway-bound routes.
    pub link_address: String,
}

/// The external resources a run reads and writes.
pub struct Ports<'a> {
    /// DNS.
    pub dns: &'a dyn DnsLookup,
    /// Kernel routing table.
    pub routes: &'a dyn RoutingTable,
    /// `/etc/hosts`.
    pub overrides: &'a dyn OverrideTable,
    /// Hardware port listing.
    pub interfaces: &'a dyn InterfaceSource,
}

/// Per-table tally of ensure outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Already present.
    pub unchanged: usize,
    /// Newly written.
    pub applied: usize,
    /// Would be written in a real run.
    pub would_apply: usize,
    /// Write or check failed.
    pub failed: usize,
}

impl Tally {
    fn record(&mut self, change: Change) {
        match change {
            Change::Unchanged => self.unchanged += 1,
            Change::Applied => self.applied += 1,
            Change::WouldApply => self.would_apply += 1,
        }
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} present, {} pending, {} failed",
            self.applied, self.unchanged, self.would_apply, self.failed
        )
    }
}

/// What a run did.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Entries resolved during this run.
    pub provisioned: Vec<ResolvedEntry>,
    /// Endpoints skipped this run, with the reason.
    pub skipped: Vec<(Endpoint, String)>,
    /// Hosts file outcomes.
    pub overrides: Tally,
    /// Routing table outcomes.
    pub routes: Tally,
    /// Interface routes were bound to, in auto-detect mode.
    pub interface: Option<String>,
    /// Non-fatal conditions worth surfacing to the operator.
    pub warnings: Vec<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

impl RunReport {
    /// One-line summary for logs and notifications.
    #[must_use]
    pub fn summary(&self) -> String {
        let prefix = if self.dry_run { "[dry run] " } else { "" };
        let mut summary = format!(
            "{prefix}{} new, {} skipped; hosts: {}; routes: {}",
            self.provisioned.len(),
            self.skipped.len(),
            self.overrides,
            self.routes,
        );
        match self.warnings.len() {
            0 => {}
            1 => summary.push_str("; 1 warning"),
            n => summary.push_str(&format!("; {n} warnings")),
        }
        summary.push_str(&format!(" ({:.1}s)", self.elapsed.as_secs_f64()));
        summary
    }
}

/// Drives a single reconciliation run.
pub struct Reconciler<'a> {
    ports: Ports<'a>,
    store: StateStore,
    options: RunOptions,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler. The store inherits `options.dry_run`.
    #[must_use]
    pub fn new(ports: Ports<'a>, store: StateStore, options: RunOptions) -> Self {
        let store = store.with_dry_run(options.dry_run);
        Self {
            ports,
            store,
            options,
        }
    }

    /// Runs one reconciliation pass over `declared`.
    ///
    /// # Errors
    ///
    /// Returns [`SplitRouteError::NoActiveInterface`] in auto-detect mode when
    /// no interface is up, or [`SplitRouteError::Io`] if the state store
    /// cannot be read or written. Per-endpoint failures are reported in
    /// [`RunReport::skipped`] instead.
    pub fn run(&self, declared: &[Endpoint]) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport {
            dry_run: self.options.dry_run,
            ..RunReport::default()
        };

        if self.options.auto_detect_interface {
            let choice = select_interface(self.ports.interfaces, &self.options.hardware_port)?;
            report.warnings.extend(choice.warning());
            report.interface = Some(choice.device);
        }

        let mut entries = self.store.load()?;
        let pending: Vec<&Endpoint> = if self.options.ignore_state || self.store.is_empty()? {
            if self.options.ignore_state {
                tracing::info!("Ignoring existing state");
            }
            self.store.reset()?;
            entries.clear();
            declared.iter().collect()
        } else {
            let known: HashSet<&Endpoint> = entries.iter().map(|e| &e.endpoint).collect();
            declared.iter().filter(|e| !known.contains(e)).collect()
        };

        tracing::info!(
            declared = declared.len(),
            pending = pending.len(),
            stored = entries.len(),
            "Computed pending endpoints"
        );

        for endpoint in pending {
            match self.resolve_entry(endpoint) {
                Ok(entry) => {
                    self.store.append(&entry)?;
                    report.provisioned.push(entry.clone());
                    entries.push(entry);
                }
                Err(e) if e.is_per_endpoint() => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Skipping endpoint");
                    report.skipped.push((endpoint.clone(), e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        let interface = report.interface.clone();
        for entry in latest(&entries) {
            self.apply(&entry, interface.as_deref(), &mut report);
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// Resolves an endpoint's address and current gateway.
    fn resolve_entry(&self, endpoint: &Endpoint) -> Result<ResolvedEntry> {
        let address = resolve(self.ports.dns, endpoint)?;
        let gateway_failed = || SplitRouteError::GatewayResolutionFailed {
            address: address.to_string(),
        };
        let gateway = match self.ports.routes.gateway_for(address) {
            Ok(Some(gateway)) => gateway,
            Ok(None) => return Err(gateway_failed()),
            Err(e) => {
                tracing::debug!(address = %address, error = %e, "Gateway lookup failed");
                return Err(gateway_failed());
            }
        };
        tracing::info!(
            endpoint = %endpoint,
            address = %address,
            gateway = %gateway,
            "Resolved endpoint"
        );
        Ok(ResolvedEntry::new(endpoint.clone(), address, Some(gateway)))
    }

    /// Ensures the hosts entry and the host route for one stored entry.
    ///
    /// The two steps are independent; a failure in one does not skip the other.
    fn apply(&self, entry: &ResolvedEntry, interface: Option<&str>, report: &mut RunReport) {
        let dry_run = self.options.dry_run;

        if entry.endpoint.is_hostname() {
            match ensure_override(
                self.ports.overrides,
                entry.address,
                entry.endpoint.as_str(),
                dry_run,
            ) {
                Ok(change) => report.overrides.record(change),
                Err(e) => {
                    tracing::warn!(
                        endpoint = %entry.endpoint,
                        error = %e,
                        "Failed to ensure hosts entry"
                    );
                    report.overrides.failed += 1;
                }
            }
        } else {
            tracing::debug!(endpoint = %entry.endpoint, "Not a plain hostname, no hosts entry");
        }

        let target = match (interface, entry.gateway) {
            (Some(name), _) => RouteTarget::Interface(name.to_string()),
            (None, Some(gateway)) => RouteTarget::Gateway {
                gateway,
                link_address: self.options.link_address.clone(),
            },
            (None, None) => {
                tracing::warn!(
                    endpoint = %entry.endpoint,
                    "No gateway recorded, cannot add route"
                );
                report.routes.failed += 1;
                return;
            }
        };

        match ensure_route(self.ports.routes, entry.address, &target, dry_run) {
            Ok(change) => report.routes.record(change),
            Err(e) => {
                tracing::warn!(address = %entry.address, error = %e, "Failed to ensure route");
                report.routes.failed += 1;
            }
        }
    }
}
