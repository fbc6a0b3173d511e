//! Rift backstub: a mock backend that serves stub files and merges them
//! with live upstream responses.
//!
//! Stubs live in directory trees (`users/:id/get.json`), are registered
//! programmatically through [`StubServer`], or both. A stub bound to an
//! upstream service is merged with the service's JSON response; the
//! `_$$` key in a stub mapping decides whether live values or stub
//! literals win.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fetch;
pub mod headers;
pub mod mount;
pub mod network;
pub mod registry;
pub mod request;
pub mod response;
pub mod route;
pub mod script;
pub mod server;
pub mod status;
pub mod stub;
pub mod transform;

pub use config::{ClientConfig, Config, ListenConfig};
pub use dispatcher::RequestDispatcher;
pub use error::{ComputeError, FetchError, InvalidPatternError, LoadError, MountError};
pub use fetch::{Fetcher, ResponseMeta, Service};
pub use registry::{RouteKind, StubRegistry, Verb};
pub use request::RequestContext;
pub use server::{BoundServer, ListenOptions, StubServer};
pub use status::StatusPattern;
pub use stub::{Computed, Stub, StubFormat, MERGE_CONTROL_KEY};
pub use transform::transform;
