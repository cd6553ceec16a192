//! remotedocker: an authenticated HTTP gateway in front of a Docker daemon.
//!
//! Callers present a signed bearer token on every request. Image builds run
//! asynchronously: `POST /build` returns a build id straight away and the
//! build's status and logs are polled from the job registry. Everything else
//! is a synchronous pass-through to the daemon or to `docker compose`.

pub mod auth;
pub mod builds;
pub mod config;
pub mod error;
pub mod gateway;
pub mod runtime;
pub mod testing;
