use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    watch, RwLock,
};
use tradepost_core::UserId;
use uuid::Uuid;

use crate::server::{
    gateway_events::GatewayEvent,
    metrics::{
        record_gateway_event_dropped, record_gateway_event_emitted, record_liveness_termination,
        GATEWAY_DROP_REASON_CLOSED, GATEWAY_DROP_REASON_FULL_QUEUE,
        GATEWAY_DROP_REASON_OVERSIZED_OUTBOUND,
    },
};

const USER_SCOPE: &str = "user";

/// Lifecycle of one registered socket. Only `Open` sockets receive events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SocketState {
    Open,
    Closing,
    Closed,
}

/// Instruction from the registry to the task that owns the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionControl {
    Open,
    /// Send a policy-violation close frame, then stop.
    Close,
    /// Drop the socket without a closing handshake.
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutboundFrame {
    Event(String),
    Ping,
}

struct SocketHandle {
    connection_id: Uuid,
    state: SocketState,
    alive: Arc<AtomicBool>,
    outbound: mpsc::Sender<OutboundFrame>,
    control: watch::Sender<ConnectionControl>,
}

/// The socket task's side of a registration.
pub(crate) struct SocketLease {
    pub(crate) connection_id: Uuid,
    pub(crate) alive: Arc<AtomicBool>,
    pub(crate) outbound_rx: mpsc::Receiver<OutboundFrame>,
    pub(crate) control_rx: watch::Receiver<ConnectionControl>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SweepReport {
    pub(crate) pinged: usize,
    pub(crate) terminated: usize,
}

/// Live sockets per user.
///
/// Owned by `AppState` and handed to every component that pushes events, so
/// tests can build an isolated registry and read frames straight off the
/// leases it returns.
pub(crate) struct SocketRegistry {
    sockets: RwLock<HashMap<UserId, Vec<SocketHandle>>>,
    outbound_queue: usize,
    max_event_bytes: usize,
}

impl SocketRegistry {
    pub(crate) fn new(outbound_queue: usize, max_event_bytes: usize) -> Self {
        Self {
            sockets: RwLock::new(HashMap::new()),
            outbound_queue,
            max_event_bytes,
        }
    }

    pub(crate) async fn register(&self, user_id: UserId) -> SocketLease {
        let connection_id = Uuid::new_v4();
        let alive = Arc::new(AtomicBool::new(true));
        let (outbound, outbound_rx) = mpsc::channel(self.outbound_queue.max(1));
        let (control, control_rx) = watch::channel(ConnectionControl::Open);

        let mut sockets = self.sockets.write().await;
        let handles = sockets.entry(user_id).or_default();
        handles.push(SocketHandle {
            connection_id,
            state: SocketState::Open,
            alive: Arc::clone(&alive),
            outbound,
            control,
        });
        tracing::debug!(
            event = "gateway.socket.registered",
            user_id = %user_id,
            connection_id = %connection_id,
            sockets_for_user = handles.len(),
        );

        SocketLease {
            connection_id,
            alive,
            outbound_rx,
            control_rx,
        }
    }

    /// Removes one socket; the user entry goes away with its last socket.
    pub(crate) async fn unregister(&self, user_id: UserId, connection_id: Uuid) -> bool {
        let mut sockets = self.sockets.write().await;
        let Some(handles) = sockets.get_mut(&user_id) else {
            return false;
        };
        let before = handles.len();
        handles.retain(|handle| handle.connection_id != connection_id);
        let removed = handles.len() != before;
        if handles.is_empty() {
            sockets.remove(&user_id);
        }
        if removed {
            tracing::debug!(
                event = "gateway.socket.unregistered",
                user_id = %user_id,
                connection_id = %connection_id,
            );
        }
        removed
    }

    /// Queues `event` on every open socket of `user_id`.
    ///
    /// Returns whether the user had any registered socket. Delivery is best
    /// effort: a socket whose queue is full is asked to close instead of
    /// stalling the caller.
    pub(crate) async fn emit_to_user(&self, user_id: UserId, event: &GatewayEvent) -> bool {
        if event.payload.len() > self.max_event_bytes {
            record_gateway_event_dropped(
                USER_SCOPE,
                event.event_type,
                GATEWAY_DROP_REASON_OVERSIZED_OUTBOUND,
            );
            tracing::warn!(
                event = "gateway.event.oversized",
                event_type = event.event_type,
                payload_bytes = event.payload.len(),
                max_payload_bytes = self.max_event_bytes,
            );
            return self.sockets.read().await.contains_key(&user_id);
        }

        let mut sockets = self.sockets.write().await;
        let Some(handles) = sockets.get_mut(&user_id) else {
            tracing::debug!(
                event = "gateway.event.emit",
                scope = USER_SCOPE,
                event_type = event.event_type,
                user_id = %user_id,
                delivered = 0,
            );
            return false;
        };

        let mut delivered = 0_usize;
        for handle in handles.iter_mut() {
            if handle.state != SocketState::Open {
                continue;
            }
            match handle
                .outbound
                .try_send(OutboundFrame::Event(event.payload.clone()))
            {
                Ok(()) => delivered += 1,
                Err(TrySendError::Closed(_)) => {
                    handle.state = SocketState::Closed;
                    record_gateway_event_dropped(
                        USER_SCOPE,
                        event.event_type,
                        GATEWAY_DROP_REASON_CLOSED,
                    );
                }
                Err(TrySendError::Full(_)) => {
                    handle.state = SocketState::Closing;
                    let _ = handle.control.send(ConnectionControl::Close);
                    record_gateway_event_dropped(
                        USER_SCOPE,
                        event.event_type,
                        GATEWAY_DROP_REASON_FULL_QUEUE,
                    );
                }
            }
        }
        handles.retain(|handle| handle.state != SocketState::Closed);
        if handles.is_empty() {
            sockets.remove(&user_id);
        }

        if delivered > 0 {
            record_gateway_event_emitted(USER_SCOPE, event.event_type);
        }
        tracing::debug!(
            event = "gateway.event.emit",
            scope = USER_SCOPE,
            event_type = event.event_type,
            user_id = %user_id,
            delivered,
        );
        true
    }

    /// One liveness round. Sockets that did not answer the previous ping are
    /// terminated and dropped; the rest are marked pending and pinged again.
    pub(crate) async fn sweep_liveness(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut sockets = self.sockets.write().await;
        for (user_id, handles) in sockets.iter_mut() {
            handles.retain_mut(|handle| {
                if !handle.alive.swap(false, Ordering::AcqRel) {
                    let _ = handle.control.send(ConnectionControl::Terminate);
                    report.terminated += 1;
                    record_liveness_termination();
                    tracing::info!(
                        event = "gateway.liveness.terminated",
                        user_id = %user_id,
                        connection_id = %handle.connection_id,
                    );
                    return false;
                }
                match handle.outbound.try_send(OutboundFrame::Ping) {
                    Ok(()) => {
                        report.pinged += 1;
                        true
                    }
                    Err(TrySendError::Full(_)) => true,
                    Err(TrySendError::Closed(_)) => false,
                }
            });
        }
        sockets.retain(|_, handles| !handles.is_empty());
        report
    }

    pub(crate) async fn socket_count(&self, user_id: UserId) -> usize {
        self.sockets.read().await.get(&user_id).map_or(0, Vec::len)
    }
}
