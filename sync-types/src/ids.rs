//! Device addressing for nebula-sync.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::SyncError;

/// A raw radio hardware address (6 bytes).
///
/// This is the unique key of a device on the link. Displayed as
/// colon-separated upper-case hex (`AA:BB:CC:DD:EE:FF`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Number of bytes in an address.
    pub const LEN: usize = 6;

    /// The link-layer broadcast address; every device receives frames sent here.
    pub const BROADCAST: Self = Self([0xFF; 6]);

    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Create a MacAddress from a byte slice of exactly 6 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 6] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Whether this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Generate a random unicast, locally-administered address.
    ///
    /// Used by hosts that have no radio hardware address of their own.
    pub fn random_local() -> Result<Self, SyncError> {
        let mut bytes = [0u8; 6];
        getrandom::getrandom(&mut bytes).map_err(|e| SyncError::Entropy(e.to_string()))?;
        // Set the locally-administered bit, clear the multicast bit
        bytes[0] = (bytes[0] | 0x02) & 0xFE;
        Ok(Self(bytes))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

impl FromStr for MacAddress {
    type Err = SyncError;

    /// Parse `AA:BB:CC:DD:EE:FF`, `AA-BB-CC-DD-EE-FF` or `AABBCCDDEEFF`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        let bytes = hex::decode(&digits)
            .map_err(|e| SyncError::InvalidData(format!("address {:?}: {}", s, e)))?;
        Self::from_bytes(&bytes).ok_or_else(|| {
            SyncError::InvalidData(format!(
                "address {:?}: expected 6 bytes, got {}",
                s,
                bytes.len()
            ))
        })
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_colon_hex() {
        let addr = MacAddress::new([0x24, 0x0A, 0xC4, 0x12, 0x34, 0xAB]);
        assert_eq!(addr.to_string(), "24:0A:C4:12:34:AB");
    }

    #[test]
    fn parse_accepts_common_separators() {
        let expected = MacAddress::new([0x24, 0x0A, 0xC4, 0x12, 0x34, 0xAB]);
        assert_eq!("24:0a:c4:12:34:ab".parse::<MacAddress>().unwrap(), expected);
        assert_eq!("24-0A-C4-12-34-AB".parse::<MacAddress>().unwrap(), expected);
        assert_eq!("240AC41234AB".parse::<MacAddress>().unwrap(), expected);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!("24:0A:C4".parse::<MacAddress>().is_err());
        assert!("24:0A:C4:12:34:AB:CD".parse::<MacAddress>().is_err());
        assert!("zz:0A:C4:12:34:AB".parse::<MacAddress>().is_err());
    }

    #[test]
    fn from_bytes_requires_six_bytes() {
        assert!(MacAddress::from_bytes(&[1, 2, 3, 4, 5]).is_none());
        assert!(MacAddress::from_bytes(&[1, 2, 3, 4, 5, 6]).is_some());
    }

    #[test]
    fn broadcast_address() {
        assert!(MacAddress::BROADCAST.is_broadcast());
        assert_eq!(MacAddress::BROADCAST.to_string(), "FF:FF:FF:FF:FF:FF");
        assert!(!MacAddress::new([0; 6]).is_broadcast());
    }

    #[test]
    fn random_local_is_unicast_and_locally_administered() {
        for _ in 0..16 {
            let addr = MacAddress::random_local().unwrap();
            assert_eq!(addr.as_bytes()[0] & 0x01, 0, "multicast bit must be clear");
            assert_eq!(addr.as_bytes()[0] & 0x02, 0x02, "local bit must be set");
        }
    }

    #[test]
    fn serde_uses_display_form() {
        let addr = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x01]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"AA:BB:CC:DD:EE:01\"");
        let restored: MacAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, addr);
    }
}
