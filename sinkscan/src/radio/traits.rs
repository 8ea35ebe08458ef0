use crate::time::Timestamp;

/// Single half-duplex radio that listens to one channel at a time
///
/// Only the rotation controller calls these methods. Received frames are
/// delivered back to the core by the host through
/// [`SinkScanner::on_receive`](crate::scanner::SinkScanner::on_receive).
pub trait Radio {
    /// Error type for radio operations
    type Error;

    /// Tune the radio to a channel
    fn tune(&mut self, channel: u8) -> Result<(), Self::Error>;

    /// Start receiving on the tuned channel until `deadline`, or indefinitely
    fn start_receive(&mut self, deadline: Option<Timestamp>) -> Result<(), Self::Error>;

    /// Stop receiving
    fn stop_receive(&mut self) -> Result<(), Self::Error>;

    /// Transmit `len` bytes of `frames` starting at `offset` as soon as possible
    fn transmit(&mut self, frames: &[u8], offset: usize, len: usize) -> Result<(), Self::Error>;
}
