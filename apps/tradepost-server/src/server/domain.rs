mod companies;
mod connections;
mod messages;

pub(crate) use companies::{create_company, require_company, set_company_banned};
pub(crate) use connections::{
    create_connection_request, list_accepted, list_received, list_sent, respond_to_connection,
};
pub(crate) use messages::{
    count_unread, get_thread, list_conversations, list_inbox, list_sent_messages,
    mark_message_read, send_message,
};
