//! kubestrap OIDC thumbprint
//!
//! CloudFormation custom resource backing the cluster's IAM OIDC provider:
//! it reports the SHA-1 thumbprint of the certificate chain served at the
//! provider URL. [`ThumbprintHandler::handle`] turns every request into a
//! [`CustomResourceResponse`]; [`send_response`] delivers it.

pub mod delivery;
pub mod error;
pub mod handler;
pub mod request;
pub mod thumbprint;

pub use delivery::send_response;
pub use error::{Result, ThumbprintError};
pub use handler::ThumbprintHandler;
pub use request::{CustomResourceRequest, CustomResourceResponse, RequestType, ResponseStatus};
pub use thumbprint::{CertificateSource, Endpoint, TlsCertificateSource, sha1_thumbprint, thumbprint};
