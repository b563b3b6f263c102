use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// IPv4 block in CIDR notation, e.g. "192.168.0.0/16"
///
/// The address must be the network address of the block (no host bits set).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cidr {
    network: u32,
    prefix: u8,
}

impl Cidr {
    /// The whole IPv4 space
    pub const ANY: Cidr = Cidr {
        network: 0,
        prefix: 0,
    };

    pub fn new(address: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(Error::InvalidCidr(format!("{address}/{prefix}")));
        }

        let network = u32::from(address);

        if network & Self::mask(prefix) != network {
            return Err(Error::InvalidCidr(format!("{address}/{prefix}")));
        }

        Ok(Cidr { network, prefix })
    }

    fn mask(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        }
    }

    pub fn address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    fn first(&self) -> u32 {
        self.network
    }

    fn last(&self) -> u32 {
        self.network | !Self::mask(self.prefix)
    }

    pub fn is_any(&self) -> bool {
        self.prefix == 0
    }

    /// True when every address of `other` belongs to this block
    pub fn contains(&self, other: &Cidr) -> bool {
        self.prefix <= other.prefix && other.network & Self::mask(self.prefix) == self.network
    }

    pub fn overlaps(&self, other: &Cidr) -> bool {
        self.first() <= other.last() && other.first() <= self.last()
    }
}

impl FromStr for Cidr {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = || Error::InvalidCidr(value.to_string());
        let (address, prefix) = value.trim().split_once('/').ok_or_else(invalid)?;
        let address = address.parse::<Ipv4Addr>().map_err(|_| invalid())?;
        let prefix = prefix.parse::<u8>().map_err(|_| invalid())?;
        Cidr::new(address, prefix).map_err(|_| invalid())
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address(), self.prefix)
    }
}

impl Serialize for Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
