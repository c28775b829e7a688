use thiserror::Error as ThisError;

/// Failures raised by the driver itself, as opposed to the SPI/GPIO transport.
///
/// Hardware bindings fold this into their own error type (see [crate::DisplayHw::Error]), so
/// every driver call returns a single error type.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The pixel buffer passed to `show` doesn't match the panel.
    #[error("frame is {actual} bytes, expected {expected}")]
    FrameLength { expected: usize, actual: usize },
    /// The driver thread couldn't be started.
    #[error("failed to start the button driver thread")]
    Spawn(#[source] std::io::Error),
    /// The driver thread panicked, so its outcome is unknown.
    #[error("button driver thread has stopped")]
    DriverStopped,
}
