//! Mock Notifier - Entry Point
//!
//! Stand-in for the transactional mail API used in local runs and load tests.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    mock_notifier::run().await
}
