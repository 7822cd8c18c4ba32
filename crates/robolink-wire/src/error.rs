/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The buffer ends before the expected fields do.
    #[error("buffer too short (need {needed} bytes, have {available})")]
    ShortBuffer { needed: usize, available: usize },

    /// A string field exceeds its wire limit.
    #[error("{what} too long ({len} bytes, max {max})")]
    StringTooLong {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// A data map holds more entries than the wire format can carry.
    #[error("too many {what} entries ({count}, max {max})")]
    TooManyEntries {
        what: &'static str,
        count: usize,
        max: usize,
    },

    /// The encoded frame would exceed the maximum packet size.
    #[error("packet too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;
