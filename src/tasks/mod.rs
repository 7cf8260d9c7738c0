//! Background Tasks Module
//!
//! Contains the timers that drive expiration independently of caller threads.
//!
//! # Tasks
//! - Expiration check: one-shot timer re-armed by each table for its next deadline

mod expiration;

pub use expiration::{schedule_expiration_check, ExpirationTimer};
