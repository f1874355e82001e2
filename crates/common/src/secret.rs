//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types the gateway uses for every credential
//! that passes through it: user passwords, the app client secret, and the
//! access/refresh/id tokens returned by the identity provider.
//!
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` that holds one stays safe to log via `{:?}` or `tracing`. The
//! value is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginInput {
//!     email: String,
//!     password: SecretString,
//! }
//!
//! let input = LoginInput {
//!     email: "alice@example.com".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! // password is redacted
//! println!("{:?}", input);
//!
//! // Reading the value is always explicit
//! let password: &str = input.password.expose_secret();
//! ```
//!
//! # Serde
//!
//! With the `serde` feature enabled, request bodies can deserialize straight
//! into secrets:
//!
//! ```rust
//! use serde::Deserialize;
//! use common::secret::SecretString;
//!
//! #[derive(Debug, Deserialize)]
//! struct ResetInput {
//!     email: String,
//!     password: SecretString,
//! }
//!
//! let json = r#"{"email": "bob@example.com", "password": "N3w-Passw0rd"}"#;
//! let input: ResetInput = serde_json::from_str(json).unwrap();
//! println!("{:?}", input);
//! ```

pub use secrecy::{ExposeSecret, SecretString};
