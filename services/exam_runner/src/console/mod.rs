pub mod commands;
pub mod driver;
pub mod protocol;

// Re-export the control loop so the binary can drive a session directly.
pub use driver::run_session;
