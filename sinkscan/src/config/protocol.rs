use heapless::Vec;

use crate::error::ConfigError;
use crate::time::Ticks;

/// Maximum number of channels tracked in one session
pub const MAX_CHANNELS: usize = 8;

/// Where inside a predicted reception window a send is aimed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendTarget {
    /// Beginning of the window
    WindowStart,
    /// Half a repeat unit into the window
    WindowMidpoint,
}

/// One tracked channel and the addressing of the sink on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelSpec {
    /// Radio channel identifier
    pub id: u8,
    /// PAN identifier of the sink
    pub pan_id: u16,
    /// Short address of the sink
    pub short_addr: u16,
}

impl ChannelSpec {
    /// Create a channel whose sink uses the same value for PAN id and short address
    pub const fn new(id: u8, sink_addr: u16) -> Self {
        Self {
            id,
            pan_id: sink_addr,
            short_addr: sink_addr,
        }
    }
}

/// Protocol configuration
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Tracked channels, strictly ascending by id
    pub channels: Vec<ChannelSpec, MAX_CHANNELS>,
    /// Own PAN identifier written into outgoing frames
    pub own_pan_id: u16,
    /// Own short address written into outgoing frames
    pub own_short_addr: u16,
    /// Silence after which the next beacon is taken as the first of a new cycle
    pub idle_threshold: Ticks,
    /// Minimum distance between two pending discovery switches
    pub min_separation: Ticks,
    /// Extra distance added when retrying a conflicting discovery switch
    pub retry_margin: Ticks,
    /// Shortest possible gap between a value-one beacon and the next cycle
    pub min_cycle_gap: Ticks,
    /// How early the value-one revisit is placed before `min_cycle_gap`
    pub anchor_lead: Ticks,
    /// How early a wake-up revisit is placed before the predicted cycle start
    pub wake_lead: Ticks,
    /// Delay between a send and the chained switch back
    pub send_guard: Ticks,
    /// Step used to move a send off an occupied instant
    pub perturb_step: Ticks,
    /// Lookahead for full scheduling, measured from session start
    pub horizon: Option<Ticks>,
    /// Maximum number of future windows scheduled per channel
    pub max_cycles: u8,
    /// Aim point inside each reception window
    pub send_target: SendTarget,
    /// Deadline handed to the radio when reception starts
    pub listen_window: Option<Ticks>,
}

impl ProtocolConfig {
    /// Preset for the discrete-event simulation deployment
    ///
    /// Five sinks on channels 11 to 15, sends aimed at window starts and a
    /// 60 second scheduling horizon.
    pub fn simulation() -> Self {
        Self {
            channels: channel_set(&[11, 12, 13, 14, 15], 0x11),
            own_pan_id: 0x11,
            own_short_addr: 0x11,
            idle_threshold: Ticks::from_micros(1_500_001),
            min_separation: Ticks::from_micros(10_000_010),
            retry_margin: Ticks::from_micros(10_000_010),
            min_cycle_gap: Ticks::from_secs(6),
            anchor_lead: Ticks::from_micros(200),
            wake_lead: Ticks::from_micros(100),
            send_guard: Ticks::from_micros(1),
            perturb_step: Ticks::from_millis(5),
            horizon: Some(Ticks::from_secs(60)),
            max_cycles: 10,
            send_target: SendTarget::WindowStart,
            listen_window: None,
        }
    }

    /// Preset for the embedded mote deployment
    ///
    /// Three sinks on channels 0 to 2, sends aimed at window midpoints and
    /// reception restarted with a 20 second deadline.
    pub fn firmware() -> Self {
        Self {
            channels: channel_set(&[0, 1, 2], 0x11),
            own_pan_id: 0x11,
            own_short_addr: 0x11,
            idle_threshold: Ticks::from_micros(1_500_001),
            min_separation: Ticks::from_millis(1_510),
            retry_margin: Ticks::from_millis(1_501),
            min_cycle_gap: Ticks::from_secs(6),
            anchor_lead: Ticks::from_micros(200),
            wake_lead: Ticks::from_millis(250),
            send_guard: Ticks::from_millis(5),
            perturb_step: Ticks::from_millis(5),
            horizon: None,
            max_cycles: 10,
            send_target: SendTarget::WindowMidpoint,
            listen_window: Some(Ticks::from_secs(20)),
        }
    }

    /// Replace the channel set
    pub fn with_channels(mut self, channels: &[ChannelSpec]) -> Result<Self, ConfigError> {
        if channels.len() > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels);
        }
        self.channels.clear();
        for spec in channels {
            self.channels
                .push(*spec)
                .map_err(|_| ConfigError::TooManyChannels)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check the configuration for values the protocol cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        if self.channels.windows(2).any(|pair| pair[0].id >= pair[1].id) {
            return Err(ConfigError::ChannelsNotAscending);
        }
        if self.perturb_step.is_zero() || self.min_separation.is_zero() {
            return Err(ConfigError::ZeroTiming);
        }
        Ok(())
    }

    /// Position of a channel id in the channel set
    pub fn index_of(&self, channel: u8) -> Option<usize> {
        self.channels.iter().position(|spec| spec.id == channel)
    }

    /// Lowest channel id, where rotation starts
    pub fn first_channel(&self) -> Option<u8> {
        self.channels.first().map(|spec| spec.id)
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::simulation()
    }
}

/// Build a channel set whose sinks are addressed `first_addr`, `first_addr + 1`, ...
fn channel_set(ids: &[u8], first_addr: u16) -> Vec<ChannelSpec, MAX_CHANNELS> {
    let mut channels = Vec::new();
    for (offset, &id) in ids.iter().enumerate().take(MAX_CHANNELS) {
        let _ = channels.push(ChannelSpec::new(id, first_addr + offset as u16));
    }
    channels
}
