//! Utility functions.

pub mod on_error;

pub use self::on_error::OnError;
