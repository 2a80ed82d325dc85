//! Viewer identity for ranking reads and live connections.
//!
//! Accounts and logins live elsewhere; this module only verifies the JWT
//! access tokens they issue and turns them into a [`Viewer`] with a role:
//! - `staff` / `organizer`: every ranking, plus recompute and configuration
//! - `judge`: rankings of competitions the judge is assigned to
//! - `spectator` or no token: rankings of public competitions
//!
//! ## Example
//!
//! ```
//! use live_ranking::auth::{TokenService, Viewer, ViewerRole};
//!
//! let tokens = TokenService::new("a-secret-of-at-least-thirty-two-chars").unwrap();
//! let token = tokens.issue(7, "organizer", ViewerRole::Organizer).unwrap();
//!
//! let viewer = tokens.viewer_from_token(Some(&token)).unwrap();
//! assert!(viewer.is_manager());
//! assert_eq!(tokens.viewer_from_token(None).unwrap(), Viewer::Anonymous);
//! ```

pub mod errors;
pub mod models;
pub mod tokens;

pub use errors::{AuthError, AuthResult};
pub use models::{AccessTokenClaims, UserId, Viewer, ViewerRole};
pub use tokens::{DEFAULT_TOKEN_LIFETIME_SECS, MIN_SECRET_LEN, TokenService};
