use tradepost_protocol::{ProtocolError, CONNECTION_REQUEST_EVENT, CONNECTION_UPDATE_EVENT};

use super::{try_build_event, GatewayEvent};
use crate::server::types::{ConnectionDetailResponse, ConnectionResponse};

pub(crate) fn try_connection_request(
    connection: &ConnectionResponse,
) -> Result<GatewayEvent, ProtocolError> {
    try_build_event(CONNECTION_REQUEST_EVENT, connection)
}

pub(crate) fn try_connection_update(
    connection: &ConnectionDetailResponse,
) -> Result<GatewayEvent, ProtocolError> {
    try_build_event(CONNECTION_UPDATE_EVENT, connection)
}
