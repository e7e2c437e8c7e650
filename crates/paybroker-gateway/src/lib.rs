//! Provider-facing half of the payment broker.
//!
//! Annotates tenant calls with tenant-scoped composite identifiers, forwards
//! them to the shared provider account, and reverse-routes provider callbacks
//! to the tenant that originated them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod annotate;
pub mod callback;
pub mod client;
pub mod error;
pub mod upstream;
pub mod webhook;

pub use annotate::{AnnotatedRequest, OperationKind, RequestAnnotator};
pub use callback::CallbackForwarder;
pub use client::ClientConfig;
pub use error::{GatewayError, Result};
pub use upstream::{UpstreamGateway, UpstreamResponse};
pub use webhook::{RoutedWebhook, WebhookPayload, WebhookRouter};
