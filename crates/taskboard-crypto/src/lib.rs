//! Taskboard Crypto Library
//!
//! Invite tokens are bearer credentials. The raw secret only ever leaves the
//! server inside an invite link; storage keeps an Argon2id hash of it, so a
//! lookup from token to invite is a verify against each candidate hash.
//! Account passwords go through the same hasher.

pub mod hasher;
pub mod token;

pub use hasher::SecretHasher;
pub use token::{IssuedToken, TOKEN_BYTES, TokenCodec};
