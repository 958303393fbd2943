use tradepost_protocol::{ProtocolError, NEW_MESSAGE_EVENT};

use super::{try_build_event, GatewayEvent};
use crate::server::types::MessageResponse;

/// `new_message` carries the full message projection, company fields included.
pub(crate) fn try_new_message(message: &MessageResponse) -> Result<GatewayEvent, ProtocolError> {
    try_build_event(NEW_MESSAGE_EVENT, message)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tradepost_core::{CompanyId, MessageId, UserId};

    use super::try_new_message;
    use crate::server::types::{CompanySummary, MessageResponse};

    fn summary(name: &str) -> CompanySummary {
        CompanySummary {
            id: CompanyId::new(),
            name: name.to_owned(),
            logo: Some(String::from("https://cdn.example/logo.png")),
            industry_type: Some(String::from("Textiles")),
        }
    }

    #[test]
    fn new_message_event_embeds_sender_company_display_fields() {
        let sender_company = summary("Acme Mills");
        let receiver_company = summary("Globex");
        let message = MessageResponse {
            id: MessageId::new(),
            sender_id: UserId::new(),
            sender_company_id: sender_company.id,
            sender_company: sender_company.clone(),
            receiver_id: UserId::new(),
            receiver_company_id: receiver_company.id,
            receiver_company,
            subject: None,
            content: String::from("Hello"),
            is_read: false,
            read_at: None,
            created_at: 42,
        };

        let event = try_new_message(&message).expect("event should encode");
        let value: Value = serde_json::from_str(&event.payload).expect("payload should be json");
        assert_eq!(value["event"], "new_message");
        assert_eq!(value["data"]["content"], "Hello");
        assert_eq!(value["data"]["isRead"], false);
        assert_eq!(value["data"]["senderCompany"]["name"], "Acme Mills");
        assert_eq!(value["data"]["senderCompany"]["industryType"], "Textiles");
    }
}
