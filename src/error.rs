use std::net::SocketAddr;

/// Startup errors. Once the rescan loop is running nothing is escalated.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create kubernetes client: {0}")]
    Client(#[source] crate::discovery::Error),
    #[error("failed to bind HTTP listener on `{addr}`: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait ResultOkLogExt<T, E> {
    /// Logs the error at error level, prefixed with `context`, and discards it.
    fn ok_log(self, context: &str) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self, context: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{context}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_log_passes_value_through() {
        let res: std::result::Result<u8, std::io::Error> = Ok(7);
        assert_eq!(res.ok_log("unused"), Some(7));
    }

    #[test]
    fn test_ok_log_discards_error() {
        let res: std::result::Result<u8, std::io::Error> =
            Err(std::io::Error::other("boom"));
        assert_eq!(res.ok_log("listing pods"), None);
    }
}
