//! Network address lookup for the status line.

use anyhow::{Context, Result};

use crate::error::HatError;

/// Looks up the addresses assigned to a network interface.
pub trait AddressSource: Send + 'static {
    /// Returns every address of `interface`, IPv4 first. An unknown
    /// interface yields an empty list.
    fn addresses(&self, interface: &str) -> Result<Vec<String>>;

    /// First address of `interface`.
    fn first_address(&self, interface: &str) -> Result<String> {
        self.addresses(interface)?
            .into_iter()
            .next()
            .ok_or_else(|| HatError::NoAddress(interface.to_string()).into())
    }
}

/// Reads interface addresses from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAddresses;

impl AddressSource for SystemAddresses {
    fn addresses(&self, interface: &str) -> Result<Vec<String>> {
        let mut matching: Vec<_> = if_addrs::get_if_addrs()
            .context("Failed to enumerate network interfaces")?
            .into_iter()
            .filter(|iface| iface.name == interface)
            .map(|iface| iface.ip())
            .collect();

        // stable: keeps the OS order within each family
        matching.sort_by_key(|ip| ip.is_ipv6());

        Ok(matching.into_iter().map(|ip| ip.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::StaticAddresses;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_address_of_known_interface() {
        let source = StaticAddresses::with("eth0", "192.168.1.20");
        assert_eq!(source.first_address("eth0").unwrap(), "192.168.1.20");
    }

    #[test]
    fn missing_interface_is_no_address() {
        let source = StaticAddresses::with("eth0", "192.168.1.20");
        let err = source.first_address("wlan0").unwrap_err();
        assert_eq!(
            err.downcast_ref::<HatError>(),
            Some(&HatError::NoAddress("wlan0".to_string()))
        );
    }

    #[test]
    fn system_lookup_of_unknown_interface_is_empty() {
        let addresses = SystemAddresses.addresses("no-such-iface0").unwrap();
        assert!(addresses.is_empty());
    }
}
