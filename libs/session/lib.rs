// Copyright 2025-2026 the Headlamp authors. MIT license.

//! The Headlamp session engine: projections over the DevTools event
//! stream, a pause-aware evaluation facade, the fetch interception rule
//! engine, and the browser launcher.

pub mod console;
pub mod debug_state;
mod errors;
pub mod fetch;
pub mod launcher;
pub mod network;
pub mod patterns;
pub mod scripts;
mod session;
mod state;

pub use errors::SessionError;
pub use session::BreakpointAware;
pub use session::BreakpointRequest;
pub use session::DebugSession;
pub use session::EvaluateOptions;
pub use session::EvaluateOutcome;
pub use session::SessionOptions;
pub use state::SessionEvent;
pub use state::SessionState;
