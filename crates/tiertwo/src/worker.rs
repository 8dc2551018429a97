use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bczd_consensus::unix_time;
use bczd_log::{log_category, log_info, Category};
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::context::TierTwoContext;
use crate::peer::PeerSet;

const WAKE_INTERVAL: Duration = Duration::from_secs(1);
const MAINTENANCE_INTERVAL_SECS: i64 = 60;

/// Runs the sync tick every `tick_secs` seconds and the registry maintenance
/// once a minute after the chain is synced. Sending on (or dropping) the
/// shutdown channel stops the thread within a second.
pub fn spawn_sync_worker(
    ctx: Arc<TierTwoContext>,
    peers: Arc<dyn PeerSet>,
    tick_secs: u64,
    shutdown_rx: Receiver<()>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("tiertwo-sync".to_string())
        .spawn(move || run_sync_worker(ctx, peers, tick_secs.max(1), shutdown_rx))
}

fn run_sync_worker(
    ctx: Arc<TierTwoContext>,
    peers: Arc<dyn PeerSet>,
    tick_secs: u64,
    shutdown_rx: Receiver<()>,
) {
    let mut ticks: u64 = 0;
    let mut last_maintenance = unix_time();
    loop {
        match shutdown_rx.recv_timeout(WAKE_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        ticks += 1;
        let now = unix_time();

        if ticks % tick_secs == 0 {
            ctx.sync.process(now, peers.as_ref());
        }

        if ctx.sync_state.is_blockchain_synced()
            && now - last_maintenance >= MAINTENANCE_INTERVAL_SECS
        {
            last_maintenance = now;
            let removed = ctx.maintenance(now);
            log_category!(
                Category::Masternode,
                "maintenance removed {removed} masternodes; {}; {}",
                ctx.masternodes,
                ctx.fulfilled
            );
        }
    }
    log_info!("tier-two sync worker stopped");
}
