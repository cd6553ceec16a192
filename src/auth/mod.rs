//! Stateless bearer authentication.
//!
//! ```text
//! Authorization: Bearer <jwt>
//!        │
//!        ▼
//!  auth_middleware ──► CredentialCodec::verify ──► subject
//!        │                      │
//!        │ ok                   └─ Malformed / Expired / MissingSubject ─► 401
//!        ▼
//!   route handler (AuthenticatedSubject in extensions)
//! ```
//!
//! There is no session store and no revocation list: a token is valid purely
//! as a function of its signature and expiry.

pub mod codec;
pub mod middleware;

pub use codec::{CredentialCodec, IssuedToken};
pub use middleware::{AuthenticatedSubject, auth_middleware};
