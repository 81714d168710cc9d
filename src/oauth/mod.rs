//! Sign-in for the OAuth variant of the gate.
//!
//! - `endpoints.rs`: authorization-code + PKCE client for the identity provider
//! - `session.rs`: the identity stored in the encrypted session cookie

pub mod endpoints;
pub mod session;

pub use endpoints::OauthProvider;
pub use session::SessionUser;
