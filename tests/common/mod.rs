//! Common function use by functional tests

/* mod declaration */
pub mod constant;
pub mod generator;
