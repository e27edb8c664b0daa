//! Issue a session token for local testing.
//!
//! Usage: `cargo run --bin issue_session -- <user-id>`
//!
//! Signs with `SESSION_SECRET` and `SESSION_EXPIRY` from the environment, the
//! same way the sign-in flow does.

use anyhow::{Context, Result};
use uuid::Uuid;

use wiki_server::{auth::jwt::create_session_token, config::Config};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let user_id: Uuid = std::env::args()
        .nth(1)
        .context("usage: issue_session <user-id>")?
        .parse()
        .context("user id must be a UUID")?;

    let token = create_session_token(user_id, &config.session_secret, config.session_expiry)?;
    println!("{token}");
    Ok(())
}
