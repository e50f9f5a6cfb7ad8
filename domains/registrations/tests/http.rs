//! HTTP routes exercised through `tower::ServiceExt::oneshot`

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{Participant, TestHarness};

fn router(h: &TestHarness) -> Router {
    roster_registrations::routes().with_state(h.state())
}

async fn call(
    h: &TestHarness,
    method: Method,
    uri: &str,
    caller: Option<&Participant>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header("authorization", caller.bearer());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router(h).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[test_log::test(tokio::test)]
async fn test_register_and_read_status() {
    let h = TestHarness::new();
    let competition = h.competition(10, 4).await;
    let leader = Participant::new("lead@x.com");
    h.profile(&leader, "Ferris").await;

    let (status, body) = call(
        &h,
        Method::POST,
        &format!("/v1/competitions/{}/register", competition.id),
        Some(&leader),
        Some(json!({"type": "team", "teamName": "Crabs", "declaredSize": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["declaredSize"], 3);
    assert_eq!(body["completeness"], "pending_invitations");
    assert_eq!(h.seats_remaining(competition.id).await, 7);

    let (status, view) = call(
        &h,
        Method::GET,
        &format!("/v1/competitions/{}/registration-status", competition.id),
        Some(&leader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["isRegistered"], true);
    assert_eq!(view["registration"]["teamName"], "Crabs");
    assert_eq!(view["registration"]["isComplete"], false);
    assert_eq!(view["team"]["currentSize"], 1);
    assert_eq!(view["team"]["maxSize"], 3);
    assert_eq!(view["team"]["openSlots"], 2);
    assert_eq!(view["team"]["leader"]["displayName"], "Ferris");
    assert_eq!(view["permissions"]["canManageTeam"], true);
    assert_eq!(view["permissions"]["canWithdraw"], true);
}

#[test_log::test(tokio::test)]
async fn test_status_for_unregistered_caller() {
    let h = TestHarness::new();
    let competition = h.competition(10, 4).await;
    let visitor = Participant::new("visitor@x.com");

    let (status, view) = call(
        &h,
        Method::GET,
        &format!("/v1/competitions/{}/registration-status", competition.id),
        Some(&visitor),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["isRegistered"], false);
    assert!(view["registration"].is_null());
    assert_eq!(view["permissions"]["canRegisterIndividual"], true);
    assert_eq!(view["permissions"]["canRegisterTeam"], true);
}

#[test_log::test(tokio::test)]
async fn test_requests_without_token_are_unauthorized() {
    let h = TestHarness::new();
    let competition = h.competition(10, 4).await;

    let (status, _) = call(
        &h,
        Method::POST,
        &format!("/v1/competitions/{}/register", competition.id),
        None,
        Some(json!({"type": "individual"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.seats_remaining(competition.id).await, 10);
}

#[test_log::test(tokio::test)]
async fn test_insufficient_seats_maps_to_conflict() {
    let h = TestHarness::new();
    let competition = h.competition(2, 4).await;
    let leader = Participant::new("lead@x.com");

    let (status, body) = call(
        &h,
        Method::POST,
        &format!("/v1/competitions/{}/register", competition.id),
        Some(&leader),
        Some(json!({"type": "team", "teamName": "Big", "declaredSize": 3})),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_SEATS");
}

#[test_log::test(tokio::test)]
async fn test_invalid_body_is_bad_request() {
    let h = TestHarness::new();
    let competition = h.competition(10, 4).await;
    let leader = Participant::new("lead@x.com");

    let (status, _) = call(
        &h,
        Method::POST,
        &format!("/v1/competitions/{}/register", competition.id),
        Some(&leader),
        Some(json!({"type": "team"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &h,
        Method::POST,
        &format!("/v1/competitions/{}/register", competition.id),
        Some(&leader),
        Some(json!({"type": "squad"})),
    )
    .await;
    assert!(status.is_client_error());
    assert_eq!(h.seats_remaining(competition.id).await, 10);
}

#[test_log::test(tokio::test)]
async fn test_invitation_round_trip_over_http() {
    let h = TestHarness::new();
    let competition = h.competition(10, 4).await;
    let leader = Participant::new("lead@x.com");
    let mate = Participant::new("mate@x.com");
    let registration = h.register_team(competition.id, &leader, 2).await;

    let (status, issued) = call(
        &h,
        Method::POST,
        &format!("/v1/registrations/{}/invitations", registration.id),
        Some(&leader),
        Some(json!({"contacts": ["Mate@X.com"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(issued[0]["contact"], "mate@x.com");
    let token = issued[0]["token"].as_str().unwrap().to_string();

    let (status, landing) = call(
        &h,
        Method::GET,
        &format!("/v1/invitations/{}", token),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(landing["invitation"]["status"], "pending");
    assert_eq!(landing["registration"]["teamName"], "Borrow Checkers");
    assert_eq!(landing["competition"]["title"], "Rust Systems Cup");
    assert!(landing["invitation"].get("token").is_none());

    let (status, resolved) = call(
        &h,
        Method::POST,
        &format!("/v1/invitations/{}/respond", token),
        Some(&mate),
        Some(json!({"action": "accept"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["invitation"]["status"], "accepted");
    assert_eq!(resolved["registration"]["completeness"], "complete");
    assert!(resolved["invitation"].get("token").is_none());

    let (status, view) = call(
        &h,
        Method::GET,
        &format!("/v1/competitions/{}/registration-status", competition.id),
        Some(&mate),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["registration"]["isComplete"], true);
    assert_eq!(view["permissions"]["canManageTeam"], false);
}

#[test_log::test(tokio::test)]
async fn test_unknown_invitation_token_is_not_found() {
    let h = TestHarness::new();
    let caller = Participant::new("who@x.com");

    let (status, body) = call(
        &h,
        Method::POST,
        "/v1/invitations/not-a-real-token/respond",
        Some(&caller),
        Some(json!({"action": "reject"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[test_log::test(tokio::test)]
async fn test_cancel_and_resend_require_leader() {
    let h = TestHarness::new();
    let competition = h.competition(10, 4).await;
    let leader = Participant::new("lead@x.com");
    let outsider = Participant::new("outsider@x.com");
    let registration = h.register_team(competition.id, &leader, 3).await;
    let invitations = h
        .invite(registration.id, &leader, &["a@x.com", "b@x.com"])
        .await;

    let (status, body) = call(
        &h,
        Method::DELETE,
        &format!("/v1/invitations/{}", invitations[0].id),
        Some(&outsider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NOT_TEAM_LEADER");

    let (status, resent) = call(
        &h,
        Method::POST,
        &format!("/v1/invitations/{}/resend", invitations[0].id),
        Some(&leader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(resent["token"].is_string());
    assert_ne!(resent["id"], json!(invitations[0].id));

    let (status, cancelled) = call(
        &h,
        Method::DELETE,
        &format!("/v1/invitations/{}", invitations[1].id),
        Some(&leader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
}

#[test_log::test(tokio::test)]
async fn test_operator_status_route() {
    let h = TestHarness::new();
    let competition = h.competition(10, 4).await;
    let leader = Participant::new("lead@x.com");
    let operator = Participant::operator();
    let registration = h.register_individual(competition.id, &leader).await;

    let (status, _) = call(
        &h,
        Method::POST,
        &format!("/v1/registrations/{}/status", registration.id),
        Some(&leader),
        Some(json!({"status": "confirmed"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &h,
        Method::POST,
        &format!("/v1/registrations/{}/status", registration.id),
        Some(&operator),
        Some(json!({"status": "confirmed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
    assert!(body["confirmedAt"].is_string());

    let (status, body) = call(
        &h,
        Method::POST,
        &format!("/v1/registrations/{}/status", registration.id),
        Some(&operator),
        Some(json!({"status": "waitlisted"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
}

#[test_log::test(tokio::test)]
async fn test_withdraw_and_finalize_routes() {
    let h = TestHarness::new();
    let competition = h.competition(10, 4).await;
    let leader = Participant::new("lead@x.com");
    let other = Participant::new("other@x.com");
    let team = h.register_team(competition.id, &leader, 3).await;
    let solo = h.register_individual(competition.id, &other).await;
    assert_eq!(h.seats_remaining(competition.id).await, 6);

    let (status, body) = call(
        &h,
        Method::POST,
        &format!("/v1/registrations/{}/finalize", team.id),
        Some(&leader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["declaredSize"], 1);
    assert_eq!(h.seats_remaining(competition.id).await, 8);

    let (status, _) = call(
        &h,
        Method::POST,
        &format!("/v1/registrations/{}/withdraw", solo.id),
        Some(&leader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &h,
        Method::POST,
        &format!("/v1/registrations/{}/withdraw", solo.id),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "withdrawn");
    assert_eq!(h.seats_remaining(competition.id).await, 9);
}
