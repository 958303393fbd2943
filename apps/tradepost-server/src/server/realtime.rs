use std::{sync::atomic::Ordering, time::Duration};

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tradepost_core::UserId;
use tradepost_protocol::ProtocolError;

mod liveness;
mod registry;

pub(crate) use liveness::spawn_liveness_sweep;
pub(crate) use registry::{ConnectionControl, OutboundFrame, SocketLease, SocketRegistry};

use super::{
    auth::{authenticate_with_token, bearer_token},
    core::{AppState, AuthContext},
    gateway_events::GatewayEvent,
    metrics::{record_auth_failure, record_gateway_event_serialize_error, record_ws_disconnect},
    types::GatewayAuthQuery,
};

const SEND_TASK_GRACE: Duration = Duration::from_secs(1);

pub(crate) async fn gateway_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GatewayAuthQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = query
        .token
        .or_else(|| bearer_token(&headers).map(ToOwned::to_owned));
    let auth = token.and_then(|token| authenticate_with_token(&state, &token).ok());

    ws.on_upgrade(move |socket| async move {
        match auth {
            Some(auth) => handle_gateway_connection(state, socket, auth).await,
            None => reject_unauthenticated(socket).await,
        }
    })
}

/// The handshake already succeeded at the HTTP layer, so a failed credential
/// can only be reported through the close frame.
async fn reject_unauthenticated(mut socket: WebSocket) {
    record_auth_failure("gateway_unauthorized");
    record_ws_disconnect("unauthorized");
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: "unauthorized".into(),
        })))
        .await;
}

pub(crate) async fn handle_gateway_connection(
    state: AppState,
    socket: WebSocket,
    auth: AuthContext,
) {
    let SocketLease {
        connection_id,
        alive,
        mut outbound_rx,
        control_rx,
    } = state.registry.register(auth.user_id).await;
    let (mut sink, mut stream) = socket.split();

    let mut send_control = control_rx.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                control_change = send_control.changed() => {
                    if control_change.is_err() {
                        break;
                    }
                    let control = *send_control.borrow();
                    match control {
                        ConnectionControl::Open => {}
                        ConnectionControl::Close => {
                            let _ = sink
                                .send(Message::Close(Some(CloseFrame {
                                    code: close_code::POLICY,
                                    reason: "slow_consumer".into(),
                                })))
                                .await;
                            break;
                        }
                        ConnectionControl::Terminate => break,
                    }
                }
                frame = outbound_rx.recv() => {
                    let sent = match frame {
                        Some(OutboundFrame::Event(payload)) => {
                            sink.send(Message::Text(payload.into())).await
                        }
                        Some(OutboundFrame::Ping) => {
                            sink.send(Message::Ping(Vec::<u8>::new().into())).await
                        }
                        None => break,
                    };
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_control = control_rx;
    let mut disconnect_reason = "connection_closed";
    loop {
        tokio::select! {
            control_change = recv_control.changed() => {
                if control_change.is_err() {
                    disconnect_reason = "unregistered";
                    break;
                }
                let control = *recv_control.borrow();
                match control {
                    ConnectionControl::Open => {}
                    ConnectionControl::Close => {
                        disconnect_reason = "slow_consumer";
                        break;
                    }
                    ConnectionControl::Terminate => {
                        disconnect_reason = "liveness_timeout";
                        break;
                    }
                }
            }
            incoming = stream.next() => {
                let Some(incoming) = incoming else {
                    break;
                };
                let Ok(message) = incoming else {
                    disconnect_reason = "socket_error";
                    break;
                };
                match message {
                    Message::Pong(_) | Message::Ping(_) => alive.store(true, Ordering::Release),
                    Message::Close(_) => {
                        disconnect_reason = "client_close";
                        break;
                    }
                    Message::Text(_) | Message::Binary(_) => {
                        tracing::debug!(
                            event = "gateway.ingress.ignored",
                            user_id = %auth.user_id,
                            connection_id = %connection_id,
                        );
                    }
                }
            }
        }
    }

    record_ws_disconnect(disconnect_reason);
    state
        .registry
        .unregister(auth.user_id, connection_id)
        .await;
    if tokio::time::timeout(SEND_TASK_GRACE, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
    tracing::debug!(
        event = "gateway.socket.closed",
        user_id = %auth.user_id,
        connection_id = %connection_id,
        reason = disconnect_reason,
    );
}

/// Best-effort push: absent sockets and serialization failures never reach
/// the caller.
pub(crate) async fn push_user_event(
    state: &AppState,
    user_id: UserId,
    event: Result<GatewayEvent, ProtocolError>,
    event_type: &'static str,
) {
    match event {
        Ok(event) => {
            let _ = state.registry.emit_to_user(user_id, &event).await;
        }
        Err(error) => {
            record_gateway_event_serialize_error("user", event_type);
            tracing::warn!(
                event = "gateway.event.serialize_failed",
                event_type,
                error = %error,
            );
        }
    }
}
