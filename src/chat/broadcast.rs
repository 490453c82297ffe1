//! Broadcast fan-out for parley.
//!
//! One broadcast round delivers a single line to a point-in-time snapshot
//! of the registry. Sends run concurrently and independently; the round
//! completes when every dispatched send has finished or failed.

use futures::future::join_all;
use tracing::debug;

use super::registry::Registry;
use super::roster::roster_frame;

/// Fan one line out to every registered session except `exclude`.
///
/// The recipient set is a single registry snapshot, so a session joining
/// or leaving mid-round may or may not see this particular line. A
/// per-recipient send failure is logged and discarded; it never blocks
/// delivery to the others. Plain chat passes `exclude = None`, so the
/// sender gets their own line round-tripped through the server.
pub async fn broadcast(registry: &Registry, line: &str, exclude: Option<&str>) {
    let recipients = registry.snapshot_sessions().await;
    let sends = recipients
        .iter()
        .filter(|(nickname, _)| exclude != Some(nickname.as_str()))
        .map(|(nickname, session)| async move {
            if let Err(e) = session.send(line).await {
                debug!("send to {} failed, dropping line: {}", nickname, e);
            }
        });
    join_all(sends).await;
    debug!("broadcast: {}", line);
}

/// Push the current roster to every session.
pub async fn broadcast_roster(registry: &Registry) {
    let names = registry.snapshot_sorted_nicknames().await;
    broadcast(registry, &roster_frame(&names), None).await;
}
