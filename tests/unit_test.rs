//! Unit-level integration tests, one module per component.

mod unit;
