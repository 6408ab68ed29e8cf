//! Upload timeouts.
//!
//! Both the per-request timeout and the total resource timeout are
//! mandatory and finite; there is no way to build an unbounded upload.

use std::time::Duration;

use crate::error::{Result, UploadError};

/// Time allowed for the request: connect, handshake, send and response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Time allowed for the whole operation, file read included.
pub const DEFAULT_RESOURCE_TIMEOUT: Duration = Duration::from_secs(300);

/// Time allowed to establish the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    pub request_timeout: Duration,
    pub resource_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            resource_timeout: DEFAULT_RESOURCE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl UploadSettings {
    /// Settings with the given request and resource timeouts.
    pub fn with_timeouts(request_timeout: Duration, resource_timeout: Duration) -> Self {
        Self {
            request_timeout,
            resource_timeout,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT.min(request_timeout),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero()
            || self.resource_timeout.is_zero()
            || self.connect_timeout.is_zero()
        {
            return Err(UploadError::InvalidRequest(
                "timeouts must be non-zero".into(),
            ));
        }
        if self.request_timeout > self.resource_timeout {
            return Err(UploadError::InvalidRequest(format!(
                "request timeout ({:?}) exceeds resource timeout ({:?})",
                self.request_timeout, self.resource_timeout
            )));
        }
        Ok(())
    }
}
