//! Schema CLI for the mailer tables (`up`, `down`, `status`, `fresh`).
//!
//! Reads `DATABASE_URL` like the dispatch worker does.

use migration::Migrator;
use sea_orm_migration::cli;

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
