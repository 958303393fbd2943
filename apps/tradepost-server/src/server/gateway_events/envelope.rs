use serde::Serialize;
use tradepost_protocol::{encode_envelope, ProtocolError};

#[derive(Debug, Clone)]
pub(crate) struct GatewayEvent {
    pub(crate) event_type: &'static str,
    pub(crate) payload: String,
}

pub(super) fn try_build_event<T: Serialize>(
    event_type: &'static str,
    payload: &T,
) -> Result<GatewayEvent, ProtocolError> {
    Ok(GatewayEvent {
        event_type,
        payload: encode_envelope(event_type, payload)?,
    })
}
