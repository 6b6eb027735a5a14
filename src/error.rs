use std::fmt;

/// A simple macro to report all kinds of errors.
#[macro_export]
macro_rules! e_fmt {
  ($($arg:tt)+) => {
      $crate::Error::Msg(format!($($arg)+))
  };
}

/// A basic error type from this library.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The requested record type is outside the set the resolver handles.
    InvalidRecordType(String),

    /// A delegation could not be followed: no usable name server, a
    /// receive failure, or the hop ceiling was exceeded.
    NameServerFetch(String),

    /// An outbound datagram exceeds the UDP payload ceiling.
    MessageTooLong(usize),

    /// A configured file path is not absolute.
    NotAbsolutePath(String),

    /// A cache or root-hints line lacks the expected field count.
    ParametersMissing(String),

    /// A received datagram failed to parse as a DNS message.
    FormatError(String),

    /// A generic error message.
    Msg(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRecordType(s) => {
                write!(f, "record type {} is not supported by the resolver", s)
            }
            Error::NameServerFetch(s) => {
                write!(f, "unable to fetch name server details: {}", s)
            }
            Error::MessageTooLong(n) => {
                write!(f, "udp message size {} exceeds the payload ceiling", n)
            }
            Error::NotAbsolutePath(s) => write!(f, "file path must be absolute: {}", s),
            Error::ParametersMissing(s) => {
                write!(f, "parameters are missing in resource record: {}", s)
            }
            Error::FormatError(s) => write!(f, "malformed dns message: {}", s),
            Error::Msg(s) => write!(f, "{}", s),
        }
    }
}

impl std::error::Error for Error {}

/// One and only `Result` type from this library crate.
pub type Result<T> = core::result::Result<T, Error>;
