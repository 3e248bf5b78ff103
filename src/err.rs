use std::{cmp, fmt, error, io};

/// Represents possible errors returned from LOB values and their streams
#[derive(Debug)]
pub enum Error {
    /// API misuse that is not covered by the more specific kinds
    Interface(String),
    /// Error reported by the server through the connection
    Server(i32,String),
    /// Invalid position, offset, length or window argument
    OutOfRange(String),
    /// Absent buffer passed to a bulk read or write
    NullArgument(&'static str),
    /// Fragments supplied fewer bytes than the declared length
    InsufficientData { declared: usize, missing: usize },
    /// Remote call made on behalf of a stream failed
    RemoteFetch(Box<Error>),
    /// Operation on a closed stream
    ClosedStream,
    /// Locator operation on a value that is no longer locator-backed
    StaleLocator,
    /// Operation on a value that has been freed
    Freed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Interface(errmsg)          => write!(f, "{}", errmsg),
            Error::Server(errcode, errmsg)    => write!(f, "SRV-{:05}: {}", errcode, errmsg),
            Error::OutOfRange(errmsg)         => write!(f, "out of range: {}", errmsg),
            Error::NullArgument(name)         => write!(f, "{} is absent", name),
            Error::InsufficientData { declared, missing } => write!(f, "source data is {} bytes short of the declared length {}", missing, declared),
            Error::RemoteFetch(cause)         => write!(f, "remote LOB call failed: {}", cause),
            Error::ClosedStream               => write!(f, "stream is closed"),
            Error::StaleLocator               => write!(f, "LOB value is not locator-backed"),
            Error::Freed                      => write!(f, "LOB value has been freed"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::RemoteFetch(cause) => Some(cause.as_ref()),
            _ => None
        }
    }
}

impl cmp::PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::Server(this_code, _),    Error::Server(other_code, _))    => this_code == other_code,
            (Error::Interface(this_msg),     Error::Interface(other_msg))     => this_msg  == other_msg,
            (Error::OutOfRange(_),           Error::OutOfRange(_))            => true,
            (Error::NullArgument(this_name), Error::NullArgument(other_name)) => this_name == other_name,
            (Error::InsufficientData { missing: this_missing, .. }, Error::InsufficientData { missing: other_missing, .. }) => this_missing == other_missing,
            (Error::RemoteFetch(this_cause), Error::RemoteFetch(other_cause)) => this_cause == other_cause,
            (Error::ClosedStream,            Error::ClosedStream)             => true,
            (Error::StaleLocator,            Error::StaleLocator)             => true,
            (Error::Freed,                   Error::Freed)                    => true,
            _ => false,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::OutOfRange(_) | Error::NullArgument(_) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other
        };
        io::Error::new(kind, err)
    }
}

impl Error {
    pub(crate) fn new(msg: &str) -> Self {
        Error::Interface( msg.to_owned() )
    }

    pub(crate) fn out_of_range(msg: String) -> Self {
        Error::OutOfRange(msg)
    }

    /// Wraps the error of a remote call. Errors that are already wrapped are passed through.
    pub(crate) fn remote(cause: Error) -> Self {
        match cause {
            Error::RemoteFetch(_) => cause,
            _ => Error::RemoteFetch(Box::new(cause))
        }
    }

    /**
        Returns the crate error carried by an `io::Error` that a stream returned, if any.

        # Example
        ```
        use std::io;
        use lobstream::Error;

        let err = io::Error::from(Error::ClosedStream);
        assert_eq!(Error::from_io(&err), Some(&Error::ClosedStream));
        ```
    */
    pub fn from_io(err: &io::Error) -> Option<&Error> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Error>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn io_conversion_keeps_cause() {
        let err = Error::remote(Error::Server(17, "connection reset".to_string()));
        let io_err = io::Error::from(err);
        assert_eq!(io_err.kind(), io::ErrorKind::Other);

        let inner = Error::from_io(&io_err).expect("crate error");
        match inner {
            Error::RemoteFetch(cause) => assert_eq!(cause.as_ref(), &Error::Server(17, String::new())),
            _ => panic!("unexpected error: {:?}", inner),
        }
        let source = inner.source().expect("cause");
        assert_eq!(source.to_string(), "SRV-00017: connection reset");
    }

    #[test]
    fn remote_is_wrapped_once() {
        let err = Error::remote(Error::remote(Error::new("boom")));
        match err {
            Error::RemoteFetch(cause) => assert_eq!(*cause, Error::new("boom")),
            _ => panic!("unexpected error: {:?}", err),
        }
    }

    #[test]
    fn argument_errors_are_invalid_input() {
        let io_err = io::Error::from(Error::NullArgument("buffer"));
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(io_err.to_string(), "buffer is absent");
    }
}
