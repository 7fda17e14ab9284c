mod support;

use axum::http::StatusCode;
use axum_test::TestRequest;
use serde_json::{Value, json};
use support::{TestApp, data, identity};
use waypost_core::api::routes::{HEALTH, utils::replace_param, utils::replace_params, v1};
use waypost_model::{Actor, OperatorId};

fn as_actor(request: TestRequest, actor: &Actor) -> TestRequest {
    let [(id_name, id), (role_name, role)] = identity(actor);
    request.add_header(id_name, id).add_header(role_name, role)
}

async fn start_trip(app: &TestApp) -> String {
    let response = as_actor(app.server.post(v1::trips::COLLECTION), &app.operator)
        .json(&json!({ "carrier_id": app.carrier }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    data(&body)["id"].as_str().expect("trip id").to_string()
}

async fn arrive(app: &TestApp, trip_id: &str, stop: usize) {
    as_actor(
        app.server.post(&replace_param(v1::trips::ARRIVE, "{id}", trip_id)),
        &app.operator,
    )
    .json(&json!({ "stop_id": app.stops[stop] }))
    .await
    .assert_status_ok();
}

async fn operator_statuses(app: &TestApp, trip_id: &str) -> Value {
    let response = as_actor(
        app.server.get(&replace_param(v1::trips::STOPS, "{id}", trip_id)),
        &app.operator,
    )
    .await;
    response.assert_status_ok();
    let body: Value = response.json();
    data(&body)["statuses"].clone()
}

#[tokio::test]
async fn health_reports_store_status() {
    let app = TestApp::new();
    let response = app.server.get(HEALTH).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["store"]["status"], "healthy");
}

#[tokio::test]
async fn requests_without_identity_are_rejected() {
    let app = TestApp::new();
    let response = app
        .server
        .post(v1::trips::COLLECTION)
        .json(&json!({ "carrier_id": app.carrier }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "unauthenticated");
}

#[tokio::test]
async fn one_trip_per_carrier_and_riders_see_it_live() {
    let app = TestApp::new();
    let (rider, _, _) = app.rider(0);
    let active_path = replace_param(v1::carriers::ACTIVE_TRIP, "{id}", app.carrier.to_string());

    let response = as_actor(app.server.get(&active_path), &rider).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "no_active_trip");

    let trip_id = start_trip(&app).await;

    let second = as_actor(
        app.server.post(v1::trips::COLLECTION),
        &Actor::operator(OperatorId::new()),
    )
    .json(&json!({ "carrier_id": app.carrier }))
    .await;
    second.assert_status(StatusCode::CONFLICT);
    let body: Value = second.json();
    assert_eq!(body["error"]["code"], "already_active");

    let response = as_actor(app.server.get(&active_path), &rider).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(data(&body)["id"], trip_id.as_str());
}

#[tokio::test]
async fn wait_request_turns_the_stop_yellow_until_the_window_closes() {
    let app = TestApp::new();
    let trip_id = start_trip(&app).await;
    arrive(&app, &trip_id, 0).await;

    let statuses = operator_statuses(&app, &trip_id).await;
    assert_eq!(statuses[0]["color"], "red");
    assert_eq!(statuses[1]["color"], "green");

    let (rider, rider_id, stop_id) = app.rider(0);
    let wait_path = replace_param(v1::signals::WAIT, "{id}", &trip_id);
    as_actor(app.server.post(&wait_path), &rider)
        .json(&json!({ "rider_id": rider_id, "stop_id": stop_id }))
        .await
        .assert_status_ok();

    app.advance_secs(301);
    let statuses = operator_statuses(&app, &trip_id).await;
    assert_eq!(statuses[0]["color"], "yellow");
    assert_eq!(statuses[0]["wait_count"], 1);

    app.advance_secs(120);
    let statuses = operator_statuses(&app, &trip_id).await;
    assert_eq!(statuses[0]["color"], "green");

    let late = as_actor(app.server.post(&wait_path), &rider)
        .json(&json!({ "rider_id": rider_id, "stop_id": stop_id }))
        .await;
    late.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = late.json();
    assert_eq!(body["error"]["code"], "not_eligible");
    assert_eq!(body["error"]["reason"], "window_closed");
    assert_eq!(body["error"]["elapsed_secs"], 421);
}

#[tokio::test]
async fn absence_is_idempotent_and_blocks_waiting() {
    let app = TestApp::new();
    let trip_id = start_trip(&app).await;
    arrive(&app, &trip_id, 0).await;

    let (rider, rider_id, stop_id) = app.rider(0);
    let absent_path = replace_param(v1::signals::ABSENT, "{id}", &trip_id);
    let body = json!({ "rider_id": rider_id, "stop_id": stop_id });

    let first = as_actor(app.server.post(&absent_path), &rider).json(&body).await;
    first.assert_status(StatusCode::CREATED);
    let again = as_actor(app.server.post(&absent_path), &rider).json(&body).await;
    again.assert_status_ok();
    let again: Value = again.json();
    assert_eq!(data(&again)["newly_marked"], false);

    let wait = as_actor(
        app.server.post(&replace_param(v1::signals::WAIT, "{id}", &trip_id)),
        &rider,
    )
    .json(&body)
    .await;
    wait.assert_status(StatusCode::CONFLICT);
    let wait: Value = wait.json();
    assert_eq!(wait["error"]["code"], "already_absent");

    let (other, other_id, _) = app.rider(1);
    as_actor(app.server.post(&absent_path), &other)
        .json(&json!({ "rider_id": other_id, "stop_id": stop_id }))
        .await
        .assert_status(StatusCode::CREATED);

    app.advance_secs(600);
    let statuses = operator_statuses(&app, &trip_id).await;
    assert_eq!(statuses[0]["color"], "grey");
}

#[tokio::test]
async fn riders_cannot_drive_and_only_see_their_stop() {
    let app = TestApp::new();
    let trip_id = start_trip(&app).await;
    let (rider, _, own_stop) = app.rider(2);

    let response = as_actor(
        app.server.post(&replace_param(v1::trips::ARRIVE, "{id}", &trip_id)),
        &rider,
    )
    .json(&json!({ "stop_id": own_stop }))
    .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = as_actor(
        app.server.get(&replace_param(v1::trips::STOPS, "{id}", &trip_id)),
        &rider,
    )
    .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let statuses = data(&body)["statuses"].as_array().expect("statuses").clone();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0]["stop_id"], own_stop.to_string());

    let other_stop = replace_params(
        v1::trips::STOP,
        [("{id}", trip_id.clone()), ("{stop_id}", app.stops[0].to_string())],
    );
    as_actor(app.server.get(&other_stop), &rider)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn ended_trips_refuse_further_transitions() {
    let app = TestApp::new();
    let trip_id = start_trip(&app).await;

    let depart_path = replace_param(v1::trips::DEPART, "{id}", &trip_id);
    let response = as_actor(app.server.post(&depart_path), &app.operator).await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "not_at_stop");

    let end_path = replace_param(v1::trips::END, "{id}", &trip_id);
    let response = as_actor(app.server.post(&end_path), &app.operator).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(!data(&body)["ended_at"].is_null());

    let response = as_actor(app.server.post(&end_path), &app.operator).await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "trip_ended");

    let position = as_actor(
        app.server.post(&replace_param(v1::trips::POSITION, "{id}", &trip_id)),
        &app.operator,
    )
    .json(&json!({ "latitude": 52.0, "longitude": 4.0 }))
    .await;
    position.assert_status_ok();
    let body: Value = position.json();
    assert_eq!(data(&body)["accepted"], false);
}

#[tokio::test]
async fn invalid_positions_are_bad_requests() {
    let app = TestApp::new();
    let trip_id = start_trip(&app).await;

    let response = as_actor(
        app.server.post(&replace_param(v1::trips::POSITION, "{id}", &trip_id)),
        &app.operator,
    )
    .json(&json!({ "latitude": 123.0, "longitude": 4.0 }))
    .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn trip_reads_follow_visibility() {
    let app = TestApp::new();
    let trip_id = start_trip(&app).await;
    arrive(&app, &trip_id, 1).await;

    let item = replace_param(v1::trips::ITEM, "{id}", &trip_id);
    let (rider, _, own_stop) = app.rider(2);
    let response = as_actor(app.server.get(&item), &rider).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(data(&body)["phase"], "at_stop");
    assert_eq!(data(&body)["current_stop"], own_stop.to_string());

    let stranger = Actor::operator(OperatorId::new());
    as_actor(app.server.get(&item), &stranger)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let unknown = replace_param(v1::trips::ITEM, "{id}", waypost_model::TripId::new().to_string());
    let response = as_actor(app.server.get(&unknown), &app.operator).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "not_found");
}
