//! Dispatch Worker - Entry Point
//!
//! Consumes campaign and single-send jobs from the email queue.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dispatch_worker::run().await
}
