use redis::aio::ConnectionManager;

/// Check Redis connectivity with a PING
///
/// Returns `false` on any error so callers can use it directly in
/// readiness probes.
pub async fn check_health(manager: &ConnectionManager) -> bool {
    let mut conn = manager.clone();
    matches!(
        redis::cmd("PING").query_async::<String>(&mut conn).await,
        Ok(ref pong) if pong == "PONG"
    )
}
