//! bsock-test-utils: Test infrastructure for the bsock broker.
//!
//! Provides:
//! - FakeAdapter / FakeSocket: in-memory device adapter with per-operation
//!   call counters, scriptable failures, and a completion gate for
//!   in-flight-race tests
//! - CaptureEvents: event sink that records published events for assertions

mod capture;
mod fake_adapter;

pub use capture::CaptureEvents;
pub use fake_adapter::{CallCounters, FakeAdapter, FakeSocket};
