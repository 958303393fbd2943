use axum::http::StatusCode;
use serde_json::json;

use super::test_app;

#[tokio::test]
async fn create_then_fetch_own_company() {
    let test = test_app();
    let owner = test.member();

    let (status, missing) = test.get("/api/companies/me", &owner).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(missing["error"], "no_company_profile");

    let (status, created) = test
        .post(
            "/api/companies",
            &owner,
            json!({
                "name": "  Northwind Traders ",
                "industryType": "Logistics",
                "logo": "https://cdn.example/northwind.png",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Northwind Traders");
    assert_eq!(created["slug"], "northwind-traders");
    assert_eq!(created["ownerUserId"], owner.user_id.to_string());
    assert_eq!(created["connectionCount"], 0);
    assert_eq!(created["isBanned"], false);

    let (status, fetched) = test.get("/api/companies/me", &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);
}

#[tokio::test]
async fn one_company_per_owner() {
    let test = test_app();
    let (owner, _) = test.member_with_company("Globex").await;
    let (status, body) = test
        .post("/api/companies", &owner, json!({ "name": "Globex Two" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "company_exists");
}

#[tokio::test]
async fn invalid_company_fields_name_the_offending_field() {
    let test = test_app();
    let owner = test.member();

    let (status, body) = test
        .post("/api/companies", &owner, json!({ "name": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "name");

    let (_, body) = test
        .post(
            "/api/companies",
            &owner,
            json!({ "name": "Initech", "logo": "ftp://files.example/logo.png" }),
        )
        .await;
    assert_eq!(body["field"], "logo");

    let (_, body) = test
        .post(
            "/api/companies",
            &owner,
            json!({ "name": "Initech", "industryType": "<script>" }),
        )
        .await;
    assert_eq!(body["field"], "industryType");
}

#[tokio::test]
async fn moderation_requires_admin_role() {
    let test = test_app();
    let (owner, company_id) = test.member_with_company("Umbrella").await;
    let admin = test.admin();

    let (status, body) = test
        .put(&format!("/api/admin/companies/{company_id}/ban"), &owner)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, banned) = test
        .put(&format!("/api/admin/companies/{company_id}/ban"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(banned["isBanned"], true);

    let (status, restored) = test
        .put(&format!("/api/admin/companies/{company_id}/unban"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["isBanned"], false);

    let (status, _) = test
        .put("/api/admin/companies/not-a-company/ban", &admin)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn banned_companies_cannot_be_targeted() {
    let test = test_app();
    let (requester, _) = test.member_with_company("Requester Co").await;
    let (receiver, receiver_company) = test.member_with_company("Banned Co").await;
    let admin = test.admin();
    let (status, _) = test
        .put(&format!("/api/admin/companies/{receiver_company}/ban"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = test.request_connection(&requester, &receiver_company).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = test
        .post(
            "/api/messages",
            &requester,
            json!({ "receiverId": receiver.user_id.to_string(), "content": "hello" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "recipient_not_found");
}

#[tokio::test]
async fn banned_companies_cannot_request_send_or_respond() {
    let test = test_app();
    let (outcast, outcast_company) = test.member_with_company("Banned Co").await;
    let (partner, partner_company) = test.member_with_company("Partner Co").await;
    let admin = test.admin();

    let (status, pending) = test.request_connection(&partner, &outcast_company).await;
    assert_eq!(status, StatusCode::CREATED);
    let pending_id = pending["id"].as_str().unwrap().to_owned();

    let (status, _) = test
        .put(&format!("/api/admin/companies/{outcast_company}/ban"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = test.request_connection(&outcast, &partner_company).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = test
        .post(
            "/api/messages",
            &outcast,
            json!({ "receiverId": partner.user_id.to_string(), "content": "still here" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = test
        .put(&format!("/api/connections/{pending_id}/accept"), &outcast)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, sent) = test.get("/api/connections/sent", &outcast).await;
    assert_eq!(sent["connections"].as_array().map(Vec::len), Some(0));
    let (_, unread) = test.get("/api/messages/unread-count", &partner).await;
    assert_eq!(unread["count"], 0);

    let (status, _) = test
        .put(&format!("/api/admin/companies/{outcast_company}/unban"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = test
        .put(&format!("/api/connections/{pending_id}/accept"), &outcast)
        .await;
    assert_eq!(status, StatusCode::OK);
}
