//! Middleware

pub mod tracking;
