//! FractiVerse Client SDK.
//!
//! A typed client for the token endpoints, used by application features (chat,
//! image generation) to check balances and spend tokens on behalf of a signed-in
//! user.
//!
//! # Example
//!
//! ```no_run
//! use fractiverse_client::{ClientError, FractiverseClient, UseTokensRequest};
//!
//! # async fn example(session_token: &str) -> Result<(), ClientError> {
//! let client = FractiverseClient::new("http://fractiverse:8080")?;
//!
//! match client
//!     .use_tokens(
//!         session_token,
//!         &UseTokensRequest::new(30, "chat message").with_idempotency_key("msg-8812"),
//!     )
//!     .await
//! {
//!     Ok(spent) => println!("{} tokens left", spent.new_balance),
//!     Err(ClientError::InsufficientBalance { balance, .. }) => {
//!         println!("only {balance} tokens left, time to top up");
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, FractiverseClient};
pub use error::ClientError;
pub use types::*;
