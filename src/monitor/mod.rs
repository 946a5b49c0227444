//! Live disk observation for the pressure control loop.

pub mod disk;
