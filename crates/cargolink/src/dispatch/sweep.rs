use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::notify::DispatchNotifier;
use super::routing::RouteEstimator;
use super::service::DispatchService;

/// Periodic pass expiring stale, unaccepted requests. Runs until the process
/// exits; the CAS inside [`DispatchService::expire_stale`] makes racing a
/// concurrent acceptance harmless.
pub async fn run_expiry_sweep<E, N>(service: Arc<DispatchService<E, N>>, period: Duration)
where
    E: RouteEstimator + 'static,
    N: DispatchNotifier + 'static,
{
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        if service.expire_stale(Utc::now()) == 0 {
            debug!("expiry sweep found nothing stale");
        }
    }
}
