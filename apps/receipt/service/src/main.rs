//! Receipt Service - Entry Point
//!
//! Accepts receipts over HTTP, relays them through the broker and mails them
//! to customers from the same process.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    receipt_service::run().await
}
