//! Telegram dispatcher glue.
//!
//! Updates are modeled as exhaustive command enums plus the content path;
//! there is no reflective handler registration. The endpoints here only
//! translate teloxide types into core calls and map handler errors onto the
//! single user-facing notice.

pub mod commands;
pub mod dispatch;
