//! Convenience re-exports for downstream callers.

pub use crate::providers::{self, PaymentProvider};
pub use crate::verifiers::{self, VerificationProvider};
pub use crate::{Error, Fields, PaymentDetails, Result};
