//! HTTP access to the parts backend.
//!
//! [`Transport`] is the single network seam; [`ApiClient`] layers timeout,
//! retry and status-code classification on top of it and implements
//! [`Dispatch`] so handlers never see raw HTTP.

pub mod client;
pub mod transport;

pub use client::{classify_response, ApiClient, Dispatch};
pub use transport::{RawResponse, ReqwestTransport, Transport, TransportBuildError, TransportError};
