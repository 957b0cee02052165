use std::fmt;
use std::str::FromStr;

use super::error::Error;

/// Length of a link-layer hardware address in bytes
pub const ADDRESS_LEN: usize = 6;

/// Link-layer hardware address identifying a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HardwareAddress(pub [u8; ADDRESS_LEN]);

impl HardwareAddress {
    /// The all-ones broadcast address
    pub const BROADCAST: HardwareAddress = HardwareAddress([0xff; ADDRESS_LEN]);

    /// Creates an address from its six octets
    pub const fn new(octets: [u8; ADDRESS_LEN]) -> Self {
        HardwareAddress(octets)
    }

    /// Generates a random locally administered unicast address
    pub fn random_local() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; ADDRESS_LEN];
        rng.fill(&mut bytes);
        bytes[0] = (bytes[0] | 0x02) & !0x01;
        HardwareAddress(bytes)
    }

    /// Returns whether this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Returns the raw octets
    pub fn octets(&self) -> [u8; ADDRESS_LEN] {
        self.0
    }
}

impl From<[u8; ADDRESS_LEN]> for HardwareAddress {
    fn from(octets: [u8; ADDRESS_LEN]) -> Self {
        HardwareAddress(octets)
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for HardwareAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; ADDRESS_LEN];
        let mut parts = s.split(|c| c == ':' || c == '-');

        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| Error::config(format!("Hardware address too short: {s}")))?;
            if part.len() != 2 {
                return Err(Error::config(format!("Malformed octet `{part}` in {s}")));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|e| Error::config(format!("Malformed octet `{part}` in {s}: {e}")))?;
        }

        if parts.next().is_some() {
            return Err(Error::config(format!("Hardware address too long: {s}")));
        }

        Ok(HardwareAddress(octets))
    }
}

/// Sensor values carried by a report packet
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSnapshot {
    /// Temperature in degrees Celsius
    pub temperature: f32,
    /// First presence channel (PIR)
    pub presence_a: bool,
    /// Second presence channel (radar)
    pub presence_b: bool,
}

impl SensorSnapshot {
    /// Creates a new snapshot
    pub fn new(temperature: f32, presence_a: bool, presence_b: bool) -> Self {
        SensorSnapshot {
            temperature,
            presence_a,
            presence_b,
        }
    }

    /// Returns whether either presence channel is set
    pub fn any_presence(&self) -> bool {
        self.presence_a || self.presence_b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_and_parse() {
        let addr = HardwareAddress::new([0x3c, 0x61, 0x05, 0x13, 0x75, 0xe4]);
        assert_eq!(addr.to_string(), "3c:61:05:13:75:e4");
        assert_eq!("3c:61:05:13:75:e4".parse::<HardwareAddress>().unwrap(), addr);
        assert_eq!("3C-61-05-13-75-E4".parse::<HardwareAddress>().unwrap(), addr);
    }

    #[test]
    fn test_address_parse_rejects_malformed() {
        assert!("3c:61:05:13:75".parse::<HardwareAddress>().is_err());
        assert!("3c:61:05:13:75:e4:00".parse::<HardwareAddress>().is_err());
        assert!("3c:61:05:13:75:zz".parse::<HardwareAddress>().is_err());
        assert!("3c:61:5:13:75:e4".parse::<HardwareAddress>().is_err());
    }

    #[test]
    fn test_random_local_address() {
        let addr = HardwareAddress::random_local();
        assert_eq!(addr.0[0] & 0x02, 0x02);
        assert_eq!(addr.0[0] & 0x01, 0x00);
        assert!(!addr.is_broadcast());
        assert!(HardwareAddress::BROADCAST.is_broadcast());
    }

    #[test]
    fn test_snapshot_presence() {
        assert!(!SensorSnapshot::default().any_presence());
        assert!(SensorSnapshot::new(20.0, false, true).any_presence());
    }
}
