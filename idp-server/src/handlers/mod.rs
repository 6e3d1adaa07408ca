//! HTTP handlers, one module per §6 endpoint group. Every handler is a
//! thin adapter: decode the transport-specific request, call straight
//! into the owning `auth-oauth`/`crypto`/`config-engine` operation, and
//! render the result. No protocol logic lives here.

pub mod authorize;
pub mod discovery;
pub mod health;
pub mod introspect;
pub mod par;
pub mod register;
pub mod revoke;
pub mod token;
pub mod userinfo;
