//! PlayKit Auth: sign players in from devices without a convenient browser.
//!
//! Implements the OAuth 2.0 Device Authorization Grant (RFC 8628) with PKCE
//! (RFC 7636, `S256`) against the PlayKit API, then exchanges the resulting
//! access token for a game-scoped player token.
//!
//! # Quick Start
//!
//! ```no_run
//! use playkit_auth::prelude::*;
//!
//! # async fn example() -> playkit_auth::error::Result<()> {
//! let config = PlayKitConfig::load()?;
//! let game_id = config.require_game_id()?.to_string();
//! let flow = DeviceAuthFlow::new(&config)?;
//! let result = flow.authorize(game_id, config.scope()).await?;
//! println!("signed in as {}", result.user_id);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
