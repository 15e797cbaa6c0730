//! Kernel routing table inspection and host-route provisioning.

use crate::command::CommandRunner;
use crate::endpoint::parse_ipv4;
use crate::error::Result;
use crate::reconciler::Change;
use std::fmt;
use std::net::Ipv4Addr;

/// How a host route reaches its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Bound directly to an interface (e.g. `en5`).
    Interface(String),
    /// Via a gateway, pinned to a link-layer address.
    Gateway {
        /// Next hop.
        gateway: Ipv4Addr,
        /// MAC address of the interface the route leaves through.
        link_address: String,
    },
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interface(name) => write!(f, "interface {name}"),
            Self::Gateway {
                gateway,
                link_address,
            } => write!(f, "gateway {gateway} via {link_address}"),
        }
    }
}

/// The system routing table.
pub trait RoutingTable {
    /// Returns `true` if a route whose destination is exactly `address` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the table could not be read.
    fn route_exists(&self, address: Ipv4Addr) -> Result<bool>;

    /// Returns the gateway the kernel currently picks for `address`.
    ///
    /// `None` when the table has no route or the route is not via a gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the query could not be issued.
    fn gateway_for(&self, address: Ipv4Addr) -> Result<Option<Ipv4Addr>>;

    /// Installs a host route for `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the route could not be added.
    fn add_host_route(&self, address: Ipv4Addr, target: &RouteTarget) -> Result<()>;
}

/// Installs a host route for `address` unless one already exists.
///
/// With `dry_run`, the existence check still runs but nothing is installed.
///
/// # Errors
///
/// Propagates errors from the routing table.
pub fn ensure_route<T: RoutingTable + ?Sized>(
    table: &T,
    address: Ipv4Addr,
    target: &RouteTarget,
    dry_run: bool,
) -> Result<Change> {
    if table.route_exists(address)? {
        tracing::info!(address = %address, "Route already present, skipping");
        return Ok(Change::Unchanged);
    }

    if dry_run {
        tracing::info!(address = %address, target = %target, "Would add host route");
        return Ok(Change::WouldApply);
    }

    table.add_host_route(address, target)?;
    tracing::info!(address = %address, target = %target, "Added host route");
    Ok(Change::Applied)
}

// ---------------------------------------------------------------------------
// System implementation
// ---------------------------------------------------------------------------

/// [`RoutingTable`] backed by `netstat`, `route get` and `route add`.
pub struct SystemRoutingTable<R> {
    runner: R,
}

impl<R: CommandRunner> SystemRoutingTable<R> {
    /// Creates a routing table that shells out through `runner`.
    #[must_use]
    pub const fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Reads the IPv4 routing table.
    ///
    /// # Errors
    ///
    /// Returns an error if `netstat` fails.
    pub fn routes(&self) -> Result<Vec<RouteRecord>> {
        let args = ["-rn", "-f", "inet"];
        let stdout = self
            .runner
            .run("netstat", &args)?
            .into_stdout("netstat", &args)?;
        Ok(parse_netstat(&stdout))
    }
}

impl<R: CommandRunner> RoutingTable for SystemRoutingTable<R> {
    fn route_exists(&self, address: Ipv4Addr) -> Result<bool> {
        Ok(self.routes()?.iter().any(|r| r.is_host_route_to(address)))
    }

    fn gateway_for(&self, address: Ipv4Addr) -> Result<Option<Ipv4Addr>> {
        let addr = address.to_string();
        let out = self.runner.run("route", &["-n", "get", &addr])?;
        if !out.success {
            // "not in table" is reported through a non-zero exit.
            tracing::debug!(address = %address, stderr = %out.stderr.trim(), "route get failed");
            return Ok(None);
        }
        Ok(parse_route_get(&out.stdout))
    }

    fn add_host_route(&self, address: Ipv4Addr, target: &RouteTarget) -> Result<()> {
        let addr = address.to_string();
        let gateway;
        let args: Vec<&str> = match target {
            RouteTarget::Interface(name) => vec![
                "-n",
                "add",
                "-host",
                addr.as_str(),
                "-interface",
                name.as_str(),
            ],
            RouteTarget::Gateway {
                gateway: gw,
                link_address,
            } => {
                gateway = gw.to_string();
                vec![
                    "-n",
                    "add",
                    "-host",
                    addr.as_str(),
                    gateway.as_str(),
                    "-ifp",
                    link_address.as_str(),
                ]
            }
        };
        self.runner
            .run_privileged("route", &args)?
            .into_stdout("route", &args)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// One row of `netstat -rn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    /// Destination column (`default`, `10.0.0.5`, `192.168.1/24`, ...).
    pub destination: String,
    /// Gateway column.
    pub gateway: String,
    /// Flags column (`UGHS`, ...).
    pub flags: String,
    /// Interface column.
    pub netif: String,
}

impl RouteRecord {
    /// Returns `true` if this row routes exactly `address`.
    #[must_use]
    pub fn is_host_route_to(&self, address: Ipv4Addr) -> bool {
        let dest = self
            .destination
            .strip_suffix("/32")
            .unwrap_or(&self.destination);
        parse_ipv4(dest) == Some(address)
    }
}

/// Parses `netstat -rn -f inet` output into rows.
///
/// Section titles and the column header are skipped.
#[must_use]
pub fn parse_netstat(stdout: &str) -> Vec<RouteRecord> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let destination = cols.next()?;
            if destination == "Destination" || destination.ends_with(':') {
                return None;
            }
            let gateway = cols.next()?;
            let flags = cols.next()?;
            let netif = cols.next()?;
            Some(RouteRecord {
                destination: destination.to_string(),
                gateway: gateway.to_string(),
                flags: flags.to_string(),
                netif: netif.to_string(),
            })
        })
        .collect()
}

/// Extracts the IPv4 `gateway:` field from `route -n get` output.
#[must_use]
pub fn parse_route_get(stdout: &str) -> Option<Ipv4Addr> {
    stdout.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() == "gateway" {
            parse_ipv4(value)
        } else {
            None
        }
    })
}
