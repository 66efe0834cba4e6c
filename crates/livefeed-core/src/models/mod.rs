//! Data models for backend entities.
//!
//! - `User`, `LoginCredentials`, `SignupProfile`: account data
//! - `Post`, `SocialAccountLink`: feed items and social account linking

pub mod post;
pub mod user;

pub use post::{Post, SocialAccountLink};
pub use user::{LoginCredentials, SignupProfile, User};
