//! Message identifiers and the boxed message type handed to `enqueue`.
//!
//! Message contents are opaque to the control block; only the id is
//! inspected, and only to tell requests, responses and async messages apart.

use std::fmt;

use serde::{Deserialize, Serialize};

const RESPONSE_FLAG: u64 = 1 << 63;
const HIGH_PRIORITY_FLAG: u64 = 1 << 62;
const REQUEST_ID_MASK: u64 = HIGH_PRIORITY_FLAG - 1;

/// Tags a message as async, request or response.
///
/// The two upper bits hold the response and priority flags, the remaining
/// bits a request counter. A counter of zero marks an async message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// Id for fire-and-forget messages.
    pub const fn async_() -> Self {
        Self(0)
    }

    /// Request id for the given counter value. The counter is truncated to
    /// the bits not used by flags.
    pub const fn make_request(counter: u64) -> Self {
        Self(counter & REQUEST_ID_MASK)
    }

    pub const fn from_integer(value: u64) -> Self {
        Self(value)
    }

    pub const fn integer_value(&self) -> u64 {
        self.0
    }

    pub const fn request_id(&self) -> u64 {
        self.0 & REQUEST_ID_MASK
    }

    pub const fn is_async(&self) -> bool {
        self.request_id() == 0
    }

    pub const fn is_request(&self) -> bool {
        !self.is_response() && !self.is_async()
    }

    pub const fn is_response(&self) -> bool {
        self.0 & RESPONSE_FLAG != 0
    }

    pub const fn is_high_priority(&self) -> bool {
        self.0 & HIGH_PRIORITY_FLAG != 0
    }

    pub const fn with_high_priority(self) -> Self {
        Self(self.0 | HIGH_PRIORITY_FLAG)
    }

    pub const fn with_normal_priority(self) -> Self {
        Self(self.0 & !HIGH_PRIORITY_FLAG)
    }

    /// Id a reply to this message must carry. Async messages and responses
    /// have no reply, so they map to the async id.
    pub const fn response_id(&self) -> Self {
        if self.is_request() {
            Self(self.0 | RESPONSE_FLAG)
        } else {
            Self::async_()
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mid:{}", self.request_id())?;
        if self.is_response() {
            f.write_str("+response")?;
        }
        if self.is_high_priority() {
            f.write_str("+urgent")?;
        }
        Ok(())
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_id() {
        let mid = MessageId::async_();
        assert!(mid.is_async());
        assert!(!mid.is_request());
        assert!(!mid.is_response());
        assert_eq!(mid.response_id(), MessageId::async_());
    }

    #[test]
    fn test_request_response_pair() {
        let req = MessageId::make_request(42).with_high_priority();
        assert!(req.is_request());
        assert!(req.is_high_priority());

        let resp = req.response_id();
        assert!(resp.is_response());
        assert!(resp.is_high_priority());
        assert_eq!(resp.request_id(), 42);
        assert_eq!(resp.response_id(), MessageId::async_());
        assert_eq!(resp.to_string(), "mid:42+response+urgent");
    }

    #[test]
    fn test_counter_is_truncated() {
        let mid = MessageId::make_request(u64::MAX);
        assert!(!mid.is_response());
        assert!(!mid.is_high_priority());
    }
}
