//! Notification Worker Service - Entry Point
//!
//! Background worker that processes notification jobs from the queue.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    campus_notification_worker::run().await
}
