//! Async side of Scrape QA: HTTP service, progress socket, identity storage
//! and the runtime that executes controller effects.
mod identity;
mod persist;
mod runtime;
mod service;
mod socket;

pub use identity::{FileIdentityStore, IdentityError, IdentityStore, MemoryIdentityStore};
pub use persist::{write_atomic, PersistError};
pub use runtime::{RuntimeHandle, RuntimeOptions, SessionRuntime, UiSink};
pub use service::{RemoteService, ReqwestService, ServiceSettings, SESSION_HEADER};
pub use socket::{progress_url, run_progress_socket};
