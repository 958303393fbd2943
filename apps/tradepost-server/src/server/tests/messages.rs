use axum::http::StatusCode;
use serde_json::{json, Value};

use super::{next_event, test_app, Member, TestApp};

async fn unread(test: &TestApp, member: &Member) -> i64 {
    let (status, body) = test.get("/api/messages/unread-count", member).await;
    assert_eq!(status, StatusCode::OK);
    body["count"].as_i64().unwrap()
}

fn contents(list: &Value) -> Vec<String> {
    list["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|message| message["content"].as_str().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn thread_fetch_marks_incoming_messages_read() {
    let test = test_app();
    let (ua, _) = test.member_with_company("Alpha Supply").await;
    let (ub, _) = test.member_with_company("Beta Foods").await;

    let sent = test.send_message(&ua, &ub, "Hello").await;
    assert_eq!(sent["isRead"], false);
    assert_eq!(sent["senderCompany"]["name"], "Alpha Supply");
    assert_eq!(sent["receiverCompany"]["name"], "Beta Foods");
    assert_eq!(unread(&test, &ub).await, 1);
    assert_eq!(unread(&test, &ua).await, 0);

    let (status, thread) = test
        .get(&format!("/api/messages/{}", ua.user_id), &ub)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(contents(&thread), vec!["Hello"]);
    assert_eq!(thread["messages"][0]["isRead"], true);
    assert!(thread["messages"][0]["readAt"].is_i64());
    assert_eq!(unread(&test, &ub).await, 0);
}

#[tokio::test]
async fn second_thread_fetch_is_identical() {
    let test = test_app();
    let (ua, _) = test.member_with_company("Alpha Supply").await;
    let (ub, _) = test.member_with_company("Beta Foods").await;
    test.send_message(&ua, &ub, "one").await;
    test.send_message(&ub, &ua, "two").await;
    test.send_message(&ua, &ub, "three").await;

    let uri = format!("/api/messages/{}", ua.user_id);
    let (_, first) = test.get(&uri, &ub).await;
    let (_, second) = test.get(&uri, &ub).await;
    assert_eq!(contents(&first), vec!["one", "two", "three"]);
    assert_eq!(first, second);
    assert_eq!(
        first["messages"][1]["isRead"], false,
        "messages the viewer sent stay untouched"
    );
    assert_eq!(unread(&test, &ua).await, 1);
}

#[tokio::test]
async fn send_preconditions_are_checked_in_order() {
    let test = test_app();
    let outsider = test.member();
    let (ua, _) = test.member_with_company("Alpha Supply").await;
    let (ub, _) = test.member_with_company("Beta Foods").await;
    let no_company = test.member();

    let (status, body) = test
        .post(
            "/api/messages",
            &outsider,
            json!({ "receiverId": ub.user_id.to_string(), "content": "hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no_company_profile");

    let (status, body) = test
        .post(
            "/api/messages",
            &ua,
            json!({ "receiverId": no_company.user_id.to_string(), "content": "hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "recipient_not_found");

    for payload in [
        json!({ "receiverId": ub.user_id.to_string() }),
        json!({ "receiverId": ub.user_id.to_string(), "content": "   " }),
    ] {
        let (status, body) = test.post("/api/messages", &ua, payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_content");
        assert_eq!(body["field"], "content");
    }
    assert_eq!(unread(&test, &ub).await, 0);
}

#[tokio::test]
async fn inbox_and_sent_are_newest_first() {
    let test = test_app();
    let (ua, _) = test.member_with_company("Alpha Supply").await;
    let (ub, _) = test.member_with_company("Beta Foods").await;
    test.send_message(&ua, &ub, "first").await;
    test.send_message(&ua, &ub, "second").await;
    test.send_message(&ub, &ua, "reply").await;

    let (_, inbox) = test.get("/api/messages/inbox", &ub).await;
    assert_eq!(contents(&inbox), vec!["second", "first"]);
    let (_, sent) = test.get("/api/messages/sent", &ua).await;
    assert_eq!(contents(&sent), vec!["second", "first"]);
    let (_, sent_b) = test.get("/api/messages/sent", &ub).await;
    assert_eq!(contents(&sent_b), vec!["reply"]);
}

#[tokio::test]
async fn conversations_group_by_counterpart() {
    let test = test_app();
    let (me, _) = test.member_with_company("Me Trading").await;
    let (alpha, alpha_company) = test.member_with_company("Alpha Supply").await;
    let (beta, _) = test.member_with_company("Beta Foods").await;

    test.send_message(&alpha, &me, "a1").await;
    test.send_message(&alpha, &me, "a2").await;
    test.send_message(&beta, &me, "b1").await;
    test.send_message(&me, &alpha, "a3").await;

    let (status, body) = test.get("/api/messages/conversations", &me).await;
    assert_eq!(status, StatusCode::OK);
    let conversations = body["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 2);

    assert_eq!(conversations[0]["otherUser"]["id"], alpha.user_id.to_string());
    assert_eq!(conversations[0]["otherUser"]["companyId"], alpha_company);
    assert_eq!(conversations[0]["otherUser"]["slug"], "alpha-supply");
    assert_eq!(conversations[0]["lastMessage"]["content"], "a3");
    assert_eq!(
        conversations[0]["lastMessage"]["senderId"],
        me.user_id.to_string()
    );
    assert_eq!(conversations[0]["unreadCount"], 2);

    assert_eq!(conversations[1]["otherUser"]["id"], beta.user_id.to_string());
    assert_eq!(conversations[1]["lastMessage"]["content"], "b1");
    assert_eq!(conversations[1]["unreadCount"], 1);
}

#[tokio::test]
async fn mark_read_is_receiver_only_and_idempotent() {
    let test = test_app();
    let (ua, _) = test.member_with_company("Alpha Supply").await;
    let (ub, _) = test.member_with_company("Beta Foods").await;
    let message = test.send_message(&ua, &ub, "ping").await;
    let uri = format!("/api/messages/{}/read", message["id"].as_str().unwrap());

    let (status, body) = test.put(&uri, &ua).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert_eq!(unread(&test, &ub).await, 1);

    let (status, first) = test.put(&uri, &ub).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["isRead"], true);
    assert_eq!(unread(&test, &ub).await, 0);

    let (status, second) = test.put(&uri, &ub).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["readAt"], first["readAt"]);
    assert_eq!(unread(&test, &ub).await, 0);

    let (status, _) = test.put("/api/messages/not-a-message/read", &ub).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn new_message_is_pushed_to_the_receiver() {
    let test = test_app();
    let (ua, _) = test.member_with_company("Alpha Supply").await;
    let (ub, _) = test.member_with_company("Beta Foods").await;
    let mut socket = test.watch(&ub).await;

    let message = test.send_message(&ua, &ub, "live").await;
    let event = next_event(&mut socket);
    assert_eq!(event["event"], "new_message");
    assert_eq!(event["data"], message);
    assert_eq!(event["data"]["senderCompany"]["name"], "Alpha Supply");
}

#[tokio::test]
async fn offline_receiver_does_not_fail_the_send() {
    let test = test_app();
    let (ua, _) = test.member_with_company("Alpha Supply").await;
    let (ub, _) = test.member_with_company("Beta Foods").await;
    assert_eq!(test.state.registry.socket_count(ub.user_id).await, 0);
    test.send_message(&ua, &ub, "stored anyway").await;
    assert_eq!(unread(&test, &ub).await, 1);
}
