use pretty_assertions::assert_eq;
use quakeready::api::models::{ChecklistItem, MeetingPoint, NewFamilyMember, SafetyScore};
use quakeready::api::{ApiClient, ApiError};
use quakeready::app::{AppError, Services, Settings};
use quakeready::storage::Store;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn signed_in(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri()).unwrap().with_token(Some("secret".into()))
}

#[tokio::test]
async fn login_stores_the_bearer_token() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "d@example.org", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "abc",
            "user": {"id": "u1", "name": "Deniz", "email": "d@example.org"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "u1", "name": "Deniz", "email": "d@example.org"}
        })))
        .mount(&server)
        .await;

    let mut client = ApiClient::new(&server.uri()).unwrap();
    let session = client.login("d@example.org", "pw").await.unwrap();
    assert_eq!(session.user.name, "Deniz");
    assert_eq!(client.token(), Some("abc"));
    assert_eq!(client.me().await.unwrap().id, "u1");
}

#[tokio::test]
async fn family_crud_uses_the_expected_routes() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/family"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [
                {"id": "1", "name": "Anne", "phoneNumber": "+905551112233", "relation": "mother"},
                {"id": "2", "name": "Baba", "phone": "05552223344"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/family"))
        .and(body_json(json!({"name": "Can", "phoneNumber": "05553334455"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "member": {"id": "3", "name": "Can", "phoneNumber": "05553334455"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/family/3"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = signed_in(&server).await;
    let members = client.family().await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].relation.as_deref(), Some("mother"));
    assert_eq!(members[1].phone_number, "05552223344");

    let added = client
        .add_family_member(&NewFamilyMember { name: "Can".into(), phone_number: "05553334455".into(), relation: None })
        .await
        .unwrap();
    assert_eq!(added.id, "3");
    client.remove_family_member("3").await.unwrap();
}

#[tokio::test]
async fn authenticated_calls_need_a_token() {
    let server = MockServer::start().await;
    let client = ApiClient::new(&server.uri()).unwrap();
    assert!(matches!(client.family().await, Err(ApiError::Unauthenticated)));
    assert!(matches!(client.analyze_bag(b"jpeg").await, Err(ApiError::Unauthenticated)));
}

#[tokio::test]
async fn server_errors_carry_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/safety/score"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "token expired"})))
        .mount(&server)
        .await;

    let err = signed_in(&server).await.safety_score().await.unwrap_err();
    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "token expired");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn missing_meeting_point_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/family/meeting-point"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/family/meeting-point"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meetingPoint": {"name": "Park", "latitude": 41.0, "longitude": 29.0}
        })))
        .mount(&server)
        .await;

    let client = signed_in(&server).await;
    assert_eq!(client.meeting_point().await.unwrap(), None);
    let saved = client
        .set_meeting_point(&MeetingPoint { name: "Park".into(), address: None, latitude: Some(41.0), longitude: Some(29.0) })
        .await
        .unwrap();
    assert_eq!(saved.name, "Park");
}

#[tokio::test]
async fn analyses_send_base64_images() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/safety/analyze-room"))
        .and(body_json(json!({"imageBase64": "aW1n"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "analysis": {"score": 72, "summary": "Mostly safe", "hazards": ["unanchored shelf"]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/emergency/analyze-bag"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "score": 40, "missingItems": ["water", "whistle"]
        })))
        .mount(&server)
        .await;

    let client = signed_in(&server).await;
    let room = client.analyze_room(b"img").await.unwrap();
    assert_eq!(room.score, 72);
    assert_eq!(room.hazards, vec!["unanchored shelf".to_string()]);
    let bag = client.analyze_bag(b"img").await.unwrap();
    assert_eq!(bag.missing_items, vec!["water".to_string(), "whistle".to_string()]);
}

#[tokio::test]
async fn earthquake_feed_is_public_and_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/earthquakes"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "q1", "mag": 4.1, "place": "Kahramanmaras", "time": "2023-02-06T01:17:00Z", "lat": 37.2, "lng": 37.0, "depth": 8.6},
            {"id": "q2", "magnitude": 3.0, "location": "Izmir", "date": "2023-02-06T02:00:00Z", "latitude": 38.4, "longitude": 27.1}
        ])))
        .mount(&server)
        .await;

    let client = ApiClient::new(&server.uri()).unwrap();
    let feed = client.earthquakes(2).await.unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].depth_km, 8.6);
    assert_eq!(feed[1].place, "Izmir");
    assert_eq!(feed[1].depth_km, 0.0);
}

#[tokio::test]
async fn services_fall_back_to_cache_when_offline() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/family"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "name": "Anne", "phoneNumber": "+905551112233"}
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/family"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let settings = Settings { base_url: server.uri(), token: Some("secret".into()), ..Settings::default() };
    let mut services = Services::new(settings, Store::open_in_memory().unwrap()).unwrap();
    assert_eq!(services.family().await.unwrap()[0].name, "Anne");
    assert_eq!(services.family().await.unwrap()[0].name, "Anne");

    let mut cold = Services::new(services.settings.clone(), Store::open_in_memory().unwrap()).unwrap();
    assert!(matches!(cold.family().await, Err(AppError::Api(ApiError::Status { status: 503, .. }))));
}

#[tokio::test]
async fn fresh_data_survives_a_cache_too_small_to_hold_it() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/family"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "name": "Anne", "phoneNumber": "+905551112233"}
        ])))
        .mount(&server)
        .await;

    let settings = Settings {
        base_url: server.uri(),
        token: Some("secret".into()),
        cache_budget_bytes: 10,
        ..Settings::default()
    };
    let mut services = Services::new(settings, Store::open_in_memory().unwrap()).unwrap();
    let members = services.family().await.unwrap();
    assert_eq!(members[0].name, "Anne");
    assert_eq!(services.store.cache_bytes().unwrap(), 0);
}

#[tokio::test]
async fn register_keeps_the_issued_token() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(json!({"name": "Deniz", "email": "d@example.org", "password": "pw"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "session": {
                "accessToken": "fresh",
                "user": {"id": "u2", "name": "Deniz", "email": "d@example.org"}
            }
        })))
        .mount(&server)
        .await;

    let mut client = ApiClient::new(&server.uri()).unwrap();
    let session = client.register("Deniz", "d@example.org", "pw").await.unwrap();
    assert_eq!(session.user.id, "u2");
    assert_eq!(client.token(), Some("fresh"));
}

#[tokio::test]
async fn updates_put_the_full_record() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/family/2"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({"name": "Baba", "phoneNumber": "05552223344", "relation": "father"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "2", "name": "Baba", "phoneNumber": "05552223344", "relation": "father"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/safety/score"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({
            "score": 70,
            "checklist": [{"id": "water", "label": "Water for 3 days", "done": true}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "safetyScore": {
                "score": 70,
                "updatedAt": "2024-02-06T01:17:00Z",
                "checklist": [{"id": "water", "label": "Water for 3 days", "done": true}]
            }
        })))
        .mount(&server)
        .await;

    let client = signed_in(&server).await;
    let member = NewFamilyMember {
        name: "Baba".into(),
        phone_number: "05552223344".into(),
        relation: Some("father".into()),
    };
    let updated = client.update_family_member("2", &member).await.unwrap();
    assert_eq!(updated.relation.as_deref(), Some("father"));

    let score = SafetyScore {
        score: 70,
        updated_at: None,
        checklist: vec![ChecklistItem { id: "water".into(), label: "Water for 3 days".into(), done: true }],
    };
    let saved = client.update_safety_score(&score).await.unwrap();
    assert_eq!(saved.score, 70);
    assert!(saved.updated_at.is_some());
    assert_eq!(saved.checklist, score.checklist);
}
