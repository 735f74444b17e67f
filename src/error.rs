use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The operation is deliberately not implemented.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// A marshalled value type could not construct a blank instance to
    /// decode into. This signals a misconfigured value type, not a
    /// recoverable condition.
    #[error("cannot instantiate blank value of type {0}")]
    Instantiation(&'static str),

    /// A cursor read or write ran past the end of its region.
    #[error("access of {requested} bytes exceeds remaining capacity {remaining}")]
    OutOfBounds { requested: usize, remaining: usize },

    /// Stored bytes did not decode back into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}
