//! Active hardware interface discovery.

use crate::command::CommandRunner;
use crate::error::{Result, SplitRouteError};

/// A hardware port as listed by `networksetup -listallhardwareports`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwarePort {
    /// Port name (e.g. `"USB 10/100/1000 LAN"`).
    pub name: String,
    /// BSD device name (e.g. `"en5"`).
    pub device: String,
}

/// Source of hardware ports and their link state.
pub trait InterfaceSource {
    /// Lists every hardware port, in OS order.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing could not be obtained.
    fn hardware_ports(&self) -> Result<Vec<HardwarePort>>;

    /// Returns `true` if `device` reports an active link.
    ///
    /// # Errors
    ///
    /// Returns an error if the device could not be queried.
    fn is_active(&self, device: &str) -> Result<bool>;
}

/// Returns the active devices whose port name contains `hardware_port`
/// (case-insensitive), in enumeration order.
///
/// An empty result is not an error here.
///
/// # Errors
///
/// Propagates errors from listing the ports. A device that cannot be
/// queried is treated as inactive.
pub fn active_interfaces<S: InterfaceSource + ?Sized>(
    source: &S,
    hardware_port: &str,
) -> Result<Vec<String>> {
    let wanted = hardware_port.to_lowercase();
    let mut active = Vec::new();
    for port in source.hardware_ports()? {
        if !port.name.to_lowercase().contains(&wanted) {
            continue;
        }
        match source.is_active(&port.device) {
            Ok(true) => active.push(port.device),
            Ok(false) => tracing::debug!(device = %port.device, "Interface inactive"),
            Err(e) => {
                tracing::warn!(device = %port.device, error = %e, "Could not query interface");
            }
        }
    }
    Ok(active)
}

/// The interface routes are bound to, and the active ones passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceChoice {
    /// Chosen device.
    pub device: String,
    /// Other active devices of the same type, in enumeration order.
    pub passed_over: Vec<String>,
}

impl InterfaceChoice {
    /// Returns `true` if more than one device was active.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        !self.passed_over.is_empty()
    }

    /// Warning text for an ambiguous choice.
    #[must_use]
    pub fn warning(&self) -> Option<String> {
        self.is_ambiguous().then(|| {
            format!(
                "multiple active interfaces; using {} over {}",
                self.device,
                self.passed_over.join(", ")
            )
        })
    }
}

/// Picks the interface to bind routes to.
///
/// The first active device in enumeration order wins; more than one match
/// is logged as a warning and recorded in [`InterfaceChoice::passed_over`].
///
/// # Errors
///
/// Returns [`SplitRouteError::NoActiveInterface`] if nothing matches.
pub fn select_interface<S: InterfaceSource + ?Sized>(
    source: &S,
    hardware_port: &str,
) -> Result<InterfaceChoice> {
    let mut active = active_interfaces(source, hardware_port)?.into_iter();
    let Some(device) = active.next() else {
        return Err(SplitRouteError::NoActiveInterface {
            hardware_port: hardware_port.to_string(),
        });
    };
    let choice = InterfaceChoice {
        device,
        passed_over: active.collect(),
    };
    if choice.is_ambiguous() {
        tracing::warn!(
            hardware_port = %hardware_port,
            chosen = %choice.device,
            passed_over = ?choice.passed_over,
            "Multiple active interfaces, using the first"
        );
    }
    tracing::info!(interface = %choice.device, "Selected interface");
    Ok(choice)
}

// ---------------------------------------------------------------------------
// System implementation
// ---------------------------------------------------------------------------

/// [`InterfaceSource`] backed by `networksetup` and `ifconfig`.
pub struct SystemInterfaces<R> {
    runner: R,
}

impl<R: CommandRunner> SystemInterfaces<R> {
    /// Creates a source that shells out through `runner`.
    #[must_use]
    pub const fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> InterfaceSource for SystemInterfaces<R> {
    fn hardware_ports(&self) -> Result<Vec<HardwarePort>> {
        let args = ["-listallhardwareports"];
        let stdout = self
            .runner
            .run("networksetup", &args)?
            .into_stdout("networksetup", &args)?;
        Ok(parse_hardware_ports(&stdout))
    }

    fn is_active(&self, device: &str) -> Result<bool> {
        let args = [device];
        let stdout = self
            .runner
            .run("ifconfig", &args)?
            .into_stdout("ifconfig", &args)?;
        Ok(parse_link_active(&stdout))
    }
}

/// Parses `networksetup -listallhardwareports` output.
#[must_use]
pub fn parse_hardware_ports(stdout: &str) -> Vec<HardwarePort> {
    let mut ports = Vec::new();
    let mut name: Option<&str> = None;
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Hardware Port:") {
            name = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("Device:") {
            if let Some(n) = name.take() {
                ports.push(HardwarePort {
                    name: n.to_string(),
                    device: rest.trim().to_string(),
                });
            }
        }
    }
    ports
}

/// Returns `true` if `ifconfig` output has `status: active`.
#[must_use]
pub fn parse_link_active(stdout: &str) -> bool {
    stdout.lines().any(|line| {
        line.trim()
            .strip_prefix("status:")
            .is_some_and(|s| s.trim() == "active")
    })
}
