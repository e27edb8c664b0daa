//! Authentication and Authorization
//!
//! Verifies session tokens issued by the sign-in flow and guards operations
//! by account state and role.

mod guard;
pub mod jwt;
mod session;

pub use guard::{
    require_admin, require_admin_or_moderator, require_auth, require_role, AuthContext,
    RequiredRole,
};
pub use session::{CurrentSession, JwtSessionProvider, Session, SessionProvider, SESSION_COOKIE};
