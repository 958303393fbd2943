mod connection;
mod envelope;
mod message;

pub(crate) use connection::{try_connection_request, try_connection_update};
pub(crate) use envelope::GatewayEvent;
use envelope::try_build_event;
pub(crate) use message::try_new_message;
pub(crate) use tradepost_protocol::{
    CONNECTION_REQUEST_EVENT, CONNECTION_UPDATE_EVENT, NEW_MESSAGE_EVENT,
};
