//! Flutter bridge crate for the Toolshed core.

pub mod api;
