#![forbid(unsafe_code)]

//! Test harness and reference fixtures for sgraph.
//!
//! - [`fixture`] - Ready-made viewers, content parts and seeded streams
//! - [`recorder`] - Records delivered [`SceneEvent`](sgraph_core::SceneEvent)s
//! - [`lifecycle`] - Adapters that log their lifecycle calls
//! - [`capture`] - Captures `tracing` spans and events for assertions

pub mod capture;
pub mod fixture;
pub mod lifecycle;
pub mod recorder;

pub use capture::{CaptureHandle, CapturedEvent, CapturedSpan, with_captured_tracing};
pub use fixture::{FixtureError, Lcg, SceneFixture, content_factory, fixture_seed};
pub use lifecycle::{CallLog, LoggingAdapter};
pub use recorder::EventRecorder;
