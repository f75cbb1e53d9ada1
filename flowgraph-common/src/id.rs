use std::fmt;

/// The datapath identifier of a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwitchId(u64);

impl SwitchId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SwitchId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SwitchId {
    /// Formats the datapath id the way controllers print it, e.g. `00:00:00:00:00:00:00:01`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        for (i, byte) in bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A port number local to a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortNo(u32);

impl PortNo {
    #[inline]
    pub const fn new(port: u32) -> Self {
        Self(port)
    }

    #[inline]
    pub const fn number(&self) -> u32 {
        self.0
    }
}

impl From<u32> for PortNo {
    fn from(port: u32) -> Self {
        Self(port)
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A port qualified by the switch it belongs to. This is the endpoint of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwitchPort {
    pub switch: SwitchId,
    pub port: PortNo,
}

impl SwitchPort {
    #[inline]
    pub const fn new(switch: SwitchId, port: PortNo) -> Self {
        Self { switch, port }
    }
}

impl From<(u64, u32)> for SwitchPort {
    fn from((switch, port): (u64, u32)) -> Self {
        Self::new(SwitchId::new(switch), PortNo::new(port))
    }
}

impl fmt::Display for SwitchPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.switch, self.port)
    }
}
