//! Context test suites
//!
//! Every test here starts a context, so all of them are `#[serial]`.
