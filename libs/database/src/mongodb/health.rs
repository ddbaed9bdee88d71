use mongodb::bson::doc;
use mongodb::Client;

/// Check MongoDB connectivity with a ping command
///
/// Returns `false` on any error so callers can use it directly in
/// readiness probes.
pub async fn check_health(client: &Client, database: &str) -> bool {
    client
        .database(database)
        .run_command(doc! { "ping": 1 })
        .await
        .is_ok()
}
