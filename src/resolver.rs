//! Endpoint to IPv4 resolution.

use crate::command::CommandRunner;
use crate::endpoint::{Endpoint, parse_ipv4};
use crate::error::{Result, SplitRouteError};
use std::net::Ipv4Addr;

/// Answers DNS queries.
pub trait DnsLookup {
    /// Returns the raw answer records for `name`, in server order.
    ///
    /// Answers may include non-address records (e.g. CNAME targets).
    ///
    /// # Errors
    ///
    /// Returns an error if the query could not be issued.
    fn query(&self, name: &str) -> Result<Vec<String>>;
}

/// Resolves an endpoint to a single IPv4 address.
///
/// IPv4 literals (with or without `:port`) are returned directly and never
/// reach `dns`. Names are queried once and the first answer that parses as
/// an IPv4 address wins. There are no retries.
///
/// # Errors
///
/// Returns [`SplitRouteError::ResolutionFailed`] if no IPv4 answer exists or
/// the query itself failed.
pub fn resolve<D: DnsLookup + ?Sized>(dns: &D, endpoint: &Endpoint) -> Result<Ipv4Addr> {
    if let Some(addr) = endpoint.literal() {
        tracing::debug!(endpoint = %endpoint, address = %addr, "Endpoint is an IPv4 literal");
        return Ok(addr);
    }

    let failed = || SplitRouteError::ResolutionFailed {
        endpoint: endpoint.to_string(),
    };

    let answers = dns.query(endpoint.host()).map_err(|e| {
        tracing::debug!(endpoint = %endpoint, error = %e, "DNS query failed");
        failed()
    })?;

    answers
        .iter()
        .find_map(|answer| parse_ipv4(answer))
        .ok_or_else(failed)
}

/// [`DnsLookup`] backed by `dig +short`.
pub struct DigLookup<R> {
    runner: R,
}

impl<R: CommandRunner> DigLookup<R> {
    /// Creates a lookup that shells out through `runner`.
    #[must_use]
    pub const fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> DnsLookup for DigLookup<R> {
    fn query(&self, name: &str) -> Result<Vec<String>> {
        let args = ["+short", name];
        let stdout = self.runner.run("dig", &args)?.into_stdout("dig", &args)?;
        Ok(parse_dig_short(&stdout))
    }
}

/// Splits `dig +short` output into answer records.
fn parse_dig_short(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(";;"))
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::command::canned::CannedRunner;

    #[test]
    fn literal_skips_dns() {
        let runner = CannedRunner::default();
        let dns = DigLookup::new(&runner);
        let addr = resolve(&dns, &Endpoint::new("10.0.0.5:8443")).unwrap();
        assert_eq!(addr, Ipv4Addr::new(10, 0, 0, 5));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn first_address_after_cname_wins() {
        let runner = CannedRunner::default().on(
            "dig +short intranet.example.com",
            CommandOutput::ok("edge.example.net.\n10.0.0.5\n10.0.0.6\n"),
        );
        let dns = DigLookup::new(&runner);
        let addr = resolve(&dns, &Endpoint::new("intranet.example.com")).unwrap();
        assert_eq!(addr, Ipv4Addr::new(10, 0, 0, 5));
    }

    #[test]
    fn no_address_answer_fails() {
        let runner = CannedRunner::default().on(
            "dig +short gone.example.com",
            CommandOutput::ok("alias.example.net.\n"),
        );
        let dns = DigLookup::new(&runner);
        let err = resolve(&dns, &Endpoint::new("gone.example.com")).unwrap_err();
        assert!(matches!(err, SplitRouteError::ResolutionFailed { .. }));
    }

    #[test]
    fn query_error_is_resolution_failure() {
        let runner = CannedRunner::default();
        let dns = DigLookup::new(&runner);
        let err = resolve(&dns, &Endpoint::new("x.example.com")).unwrap_err();
        assert!(err.is_per_endpoint());
    }

    #[test]
    fn dig_comments_are_ignored() {
        assert_eq!(
            parse_dig_short(";; connection timed out; no servers could be reached\n"),
            Vec::<String>::new()
        );
    }
}
