//! Background sweeps: expired invites and member-less rooms.

use std::{future::Future, sync::Arc, time::Duration};

use roomsync_core::Environment;
use tokio::{sync::watch, task::JoinHandle};

use crate::hub::Hub;

/// Running maintenance tasks. Stop them with [`Maintenance::shutdown`].
pub struct Maintenance {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Maintenance {
    /// Spawn the invite and room sweepers on the current Tokio runtime,
    /// using the intervals in the hub's config.
    pub fn start<E: Environment>(hub: Arc<Hub<E>>) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let config = *hub.config();

        let invites = {
            let hub = Arc::clone(&hub);
            sweep(hub.env().clone(), config.invite_sweep_interval, rx.clone(), move || {
                hub.reap_expired_invites()
            })
        };
        let rooms = sweep(hub.env().clone(), config.room_sweep_interval, rx, move || {
            hub.reap_empty_rooms()
        });

        Self { shutdown, tasks: vec![tokio::spawn(invites), tokio::spawn(rooms)] }
    }

    /// Signal the sweepers to stop and wait for them.
    pub async fn shutdown(self) {
        // Receivers only drop when their task ended already
        let _ = self.shutdown.send(true);

        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "maintenance task ended abnormally");
            }
        }
    }
}

fn sweep<E: Environment>(
    env: E,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut pass: impl FnMut() -> usize + Send + 'static,
) -> impl Future<Output = ()> + Send + 'static {
    async move {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                },
                () = env.sleep(interval) => {
                    let removed = pass();
                    if removed > 0 {
                        tracing::debug!(removed, "maintenance sweep");
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::{config::HubConfig, hub::ClipboardShare};

    #[derive(Clone)]
    struct Clock(Arc<AtomicU64>);

    impl Environment for Clock {
        fn wall_clock_secs(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }

        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            tokio::time::sleep(duration)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_expired_invites_and_empty_rooms() {
        let clock = Arc::new(AtomicU64::new(1_000));
        let hub = Arc::new(Hub::new(Clock(Arc::clone(&clock)), HubConfig::default()));

        let host = roomsync_core::UserId::host();
        let room = hub.create_room("Lobby", &host).unwrap().id;
        let a = hub.register_user("Alice").unwrap().id;
        let b = hub.register_user("Bob").unwrap().id;
        let invite = hub.invite(&a, &b, "").unwrap().invite;
        hub.share_clipboard(&a, &roomsync_core::RoomId::global(), ClipboardShare::text("x"))
            .unwrap();

        let maintenance = Maintenance::start(Arc::clone(&hub));

        clock.store(1_100, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(hub.directory().invite_by_id(&invite.id).is_none());
        assert!(hub.directory().room(&room).is_some());

        tokio::time::sleep(Duration::from_secs(30 * 60)).await;
        assert!(hub.directory().room(&room).is_none());
        assert!(!hub.history().is_empty(&roomsync_core::RoomId::global()));

        maintenance.shutdown().await;
    }
}
