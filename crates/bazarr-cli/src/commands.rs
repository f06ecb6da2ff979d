//! Command handlers.

pub(crate) mod request;
