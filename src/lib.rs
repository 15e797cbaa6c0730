//! # splitroute
//!
//! Send traffic for a chosen set of domains and hosts over a specific macOS
//! network interface, leaving everything else on the default route.
//!
//! Each declared endpoint is resolved once, pinned in `/etc/hosts` (names
//! only) and given a host route, either bound directly to an active
//! hardware port or via the gateway the kernel picked at resolution time.
//! Resolutions are recorded in a state file so later runs only resolve
//! newly declared endpoints.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use splitroute::{
//!     Config, DigLookup, HostsFile, Ports, Reconciler, RunFlags, StateStore,
//!     SystemInterfaces, SystemRoutingTable, SystemRunner,
//! };
//!
//! let config = Config::load("/Users/me/.config/splitroute")?;
//! let runner = SystemRunner::new();
//! let dns = DigLookup::new(runner);
//! let routes = SystemRoutingTable::new(runner);
//! let interfaces = SystemInterfaces::new(runner);
//! let hosts = HostsFile::with_path(&config.settings.hosts_file);
//!
//! let ports = Ports { dns: &dns, routes: &routes, overrides: &hosts, interfaces: &interfaces };
//! let reconciler = Reconciler::new(
//!     ports,
//!     StateStore::new(config.state_file()),
//!     config.run_options(RunFlags::default()),
//! );
//! let report = reconciler.run(&config.endpoints)?;
//! println!("{}", report.summary());
//! ```
//!
//! ## Safety of repeated runs
//!
//! Both system tables are treated as append-only. Every write is preceded by
//! an exact-match existence check, so running twice changes nothing the
//! second time, and entries written by other tools are never touched.
//!
//! ## Permissions
//!
//! Writing `/etc/hosts` and adding routes requires root. The binary runs
//! those steps through `sudo -n` and keeps the credentials fresh with
//! [`KeepAlive`]; library callers handle elevation themselves.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod command;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod hosts;
pub mod interface;
pub mod keepalive;
pub mod notify;
pub mod reconciler;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod util;

pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use config::{Config, RunFlags, Settings};
pub use endpoint::Endpoint;
pub use error::{Result, SplitRouteError};
pub use hosts::{HostsFile, OverrideTable};
pub use interface::{HardwarePort, InterfaceChoice, InterfaceSource, SystemInterfaces};
pub use keepalive::KeepAlive;
pub use reconciler::{Change, Ports, Reconciler, RunOptions, RunReport, Tally};
pub use resolver::{DigLookup, DnsLookup};
pub use routes::{RouteTarget, RoutingTable, SystemRoutingTable};
pub use state::{ResolvedEntry, StateStore};
