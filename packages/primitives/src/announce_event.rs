use std::fmt;

/// The event tag a client attaches to a tracker announce.
///
/// See [BEP 3](https://www.bittorrent.org/beps/bep_0003.html). `None` is the
/// regular re-announce and is sent with no `event` parameter on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnounceEvent {
    Started,
    None,
    Completed,
    Stopped,
}

impl AnnounceEvent {
    /// The value of the `event` query parameter, or `None` when the parameter
    /// is omitted entirely.
    #[must_use]
    pub fn wire_value(&self) -> Option<&'static str> {
        match self {
            Self::Started => Some("started"),
            Self::None => None,
            Self::Completed => Some("completed"),
            Self::Stopped => Some("stopped"),
        }
    }
}

impl fmt::Display for AnnounceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::None => write!(f, "none"),
            Self::Completed => write!(f, "completed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
