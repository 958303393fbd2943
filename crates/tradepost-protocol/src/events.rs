use serde::Serialize;

pub const NEW_MESSAGE_EVENT: &str = "new_message";
pub const CONNECTION_REQUEST_EVENT: &str = "connection_request";
pub const CONNECTION_UPDATE_EVENT: &str = "connection_update";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEventScope {
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GatewayEventManifestEntry {
    pub event_type: &'static str,
    pub scope: GatewayEventScope,
    pub description: &'static str,
}

const MANIFEST: &[GatewayEventManifestEntry] = &[
    GatewayEventManifestEntry {
        event_type: NEW_MESSAGE_EVENT,
        scope: GatewayEventScope::User,
        description: "a direct message was delivered to the receiving user",
    },
    GatewayEventManifestEntry {
        event_type: CONNECTION_REQUEST_EVENT,
        scope: GatewayEventScope::User,
        description: "a connection request was addressed to the user's company",
    },
    GatewayEventManifestEntry {
        event_type: CONNECTION_UPDATE_EVENT,
        scope: GatewayEventScope::User,
        description: "a connection request sent by the user's company was answered",
    },
];

/// Every server-to-client event the gateway may emit.
#[must_use]
pub fn gateway_event_manifest() -> &'static [GatewayEventManifestEntry] {
    MANIFEST
}

#[must_use]
pub fn manifest_entry(event_type: &str) -> Option<&'static GatewayEventManifestEntry> {
    MANIFEST.iter().find(|entry| entry.event_type == event_type)
}
