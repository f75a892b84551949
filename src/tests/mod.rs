//! Scenario and property suites for the compiler and the execution
//! coordinator, run against the deterministic mocks in `test_utils`.

mod helpers;
