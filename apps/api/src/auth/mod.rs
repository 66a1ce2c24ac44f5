// Authentication: credentials, JWT access tokens, Google sign-in,
// email verification and password reset.

pub mod extractor;
pub mod handlers;
pub mod jwt;
pub mod oauth;
pub mod password;
pub mod service;
pub mod tokens;
pub mod validation;

pub use extractor::CurrentUser;
