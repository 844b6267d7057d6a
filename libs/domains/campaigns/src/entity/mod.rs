//! Sea-ORM entities backing the Postgres stores.

pub mod campaign;
pub mod email_log;
pub mod suppression;
