//! Error types
//!
//! Protocol decisions never fail. Errors only come from the radio and timer
//! collaborators and from invalid configuration. A full send table drops the
//! send with a warning.

/// Configuration error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The channel set is empty
    NoChannels,
    /// More channels than the tables can hold
    TooManyChannels,
    /// Channel ids are not strictly ascending
    ChannelsNotAscending,
    /// A timing parameter that must be positive is zero
    ZeroTiming,
}

/// Scanner error
#[derive(Debug)]
pub enum ScanError<RE, TE> {
    /// Radio collaborator error
    Radio(RE),
    /// Timer collaborator error
    Timer(TE),
    /// Invalid configuration
    Config(ConfigError),
    /// Channel id not part of the configured set
    UnknownChannel(u8),
}

impl<RE, TE> From<ConfigError> for ScanError<RE, TE> {
    fn from(error: ConfigError) -> Self {
        ScanError::Config(error)
    }
}

/// Error while registering a send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError<TE> {
    /// No room left for another pending send
    TableFull,
    /// Timer collaborator error
    Timer(TE),
}
