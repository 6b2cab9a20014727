//! Admin authentication
//!
//! Handles:
//! - Password hashing and verification
//! - Admin credential extraction (HTTP Basic)
//! - Client identity extraction

mod middleware;
mod password;

pub use middleware::{AdminUser, ClientIp, client_ip_from};
pub use password::{
    AdminCredentials, MIN_PASSWORD_LENGTH, PBKDF2_ITERATIONS, PASSWORD_HASH_KEY, hash_password,
    verify_password,
};
