//! End-to-end coverage of the login pipeline (spec §4.8) and the welcome
//! bundle's packet ordering (testable property 7), driven over HTTP
//! against a real `banchod` process.

mod common;

use common::{seed_user, TestServer};

fn login_body(username: &str, password: &str) -> String {
    format!("{username}\n{password}\nb20230101|0|1|aaaa:bbbb:cccc:dddd|0\n")
}

fn tourney_login_body(username: &str, password: &str) -> String {
    format!("{username}\n{password}\nb20230101tourney|0|1|aaaa:bbbb:cccc:dddd|0\n")
}

/// Walks the concatenated frame stream, returning the packet ids in order.
fn frame_ids(body: &[u8]) -> Vec<u16> {
    bancho_proto::split_frames(body).expect("welcome bundle must be well-formed frames").into_iter().map(|f| f.id).collect()
}

#[tokio::test]
async fn successful_login_returns_token_and_ordered_welcome_bundle() {
    let port = 15001;
    let db_path = std::env::temp_dir().join(format!("bancho-test-{port}/bancho.db"));
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();
    let seeded = seed_user(db_path.to_str().unwrap(), "testuser", "hunter2", 3, false).await.unwrap();

    let server = TestServer::spawn(port).await.unwrap();

    let client = reqwest::Client::new();
    let resp = client.post(server.base_url()).body(login_body("testuser", "hunter2")).send().await.unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let token = resp.headers().get("cho-token").expect("login reply must carry a session token").to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&token).is_ok());

    let body = resp.bytes().await.unwrap();
    let ids = frame_ids(&body);

    use bancho_proto::packets::server;
    assert_eq!(ids[0], server::SILENCE_END);
    assert_eq!(ids[1], server::USER_ID);
    assert_eq!(ids[2], server::PROTOCOL_VERSION);
    assert_eq!(ids[3], server::PRIVILEGES);
    assert_eq!(ids[4], server::USER_PRESENCE);
    assert_eq!(ids[5], server::USER_STATS);
    assert_eq!(ids[6], server::CHANNEL_INFO_END);
    assert_eq!(ids[7], server::FRIENDS_LIST);

    let user_id_frame = bancho_proto::split_frames(&body).unwrap().into_iter().find(|f| f.id == server::USER_ID).unwrap();
    assert_eq!(bancho_proto::Reader::new(&user_id_frame.payload).i32().unwrap(), seeded.id);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let port = 15002;
    let db_path = std::env::temp_dir().join(format!("bancho-test-{port}/bancho.db"));
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();
    seed_user(db_path.to_str().unwrap(), "wrongpass", "correct-password", 3, false).await.unwrap();

    let server = TestServer::spawn(port).await.unwrap();

    let client = reqwest::Client::new();
    let resp = client.post(server.base_url()).body(login_body("wrongpass", "incorrect-password")).send().await.unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert!(resp.headers().get("cho-token").is_none());
    let body = resp.bytes().await.unwrap();
    assert_eq!(&body[..], bancho_proto::packets::literal::LOGIN_FAILED);
}

#[tokio::test]
async fn restricted_user_cannot_log_in() {
    let port = 15003;
    let db_path = std::env::temp_dir().join(format!("bancho-test-{port}/bancho.db"));
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();
    // NORMAL only, no PUBLIC bit and no PENDING_VERIFICATION: fails passes_login_gate.
    seed_user(db_path.to_str().unwrap(), "banneduser", "hunter2", 1, false).await.unwrap();

    let server = TestServer::spawn(port).await.unwrap();

    let client = reqwest::Client::new();
    let resp = client.post(server.base_url()).body(login_body("banneduser", "hunter2")).send().await.unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert!(resp.headers().get("cho-token").is_none());
}

#[tokio::test]
async fn unknown_username_is_rejected() {
    let port = 15004;
    let server = TestServer::spawn(port).await.unwrap();

    let client = reqwest::Client::new();
    let resp = client.post(server.base_url()).body(login_body("nobody", "hunter2")).send().await.unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body = resp.bytes().await.unwrap();
    assert_eq!(&body[..], bancho_proto::packets::literal::LOGIN_FAILED);
}

/// S5: a tournament-client build logging in twice coexists with the first
/// session instead of kicking it, unlike a regular client's second login.
#[tokio::test]
async fn tournament_client_logins_coexist() {
    let port = 15005;
    let db_path = std::env::temp_dir().join(format!("bancho-test-{port}/bancho.db"));
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();
    let seeded = seed_user(db_path.to_str().unwrap(), "tourneyuser", "hunter2", 3, false).await.unwrap();

    let server = TestServer::spawn(port).await.unwrap();
    let client = reqwest::Client::new();

    let first = client.post(server.base_url()).body(tourney_login_body("tourneyuser", "hunter2")).send().await.unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);
    let first_token = first.headers().get("cho-token").unwrap().to_str().unwrap().to_string();

    let second = client.post(server.base_url()).body(tourney_login_body("tourneyuser", "hunter2")).send().await.unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::OK);
    let second_token = second.headers().get("cho-token").unwrap().to_str().unwrap().to_string();

    assert_ne!(first_token, second_token);

    // Both tokens still work: a tourney login must not have kicked the
    // other one off, unlike the regular-client path.
    let first_ping = client.post(server.base_url()).header("osu-token", &first_token).body(Vec::new()).send().await.unwrap();
    assert_eq!(first_ping.status(), reqwest::StatusCode::OK);
    let first_ping_body = first_ping.bytes().await.unwrap();
    assert_ne!(&first_ping_body[..], bancho_proto::packets::literal::LOGIN_FAILED);

    let second_ping = client.post(server.base_url()).header("osu-token", &second_token).body(Vec::new()).send().await.unwrap();
    assert_eq!(second_ping.status(), reqwest::StatusCode::OK);

    let online = client.get(format!("{}/api/v1/isOnline?id={}", server.base_url(), seeded.id)).send().await.unwrap();
    let online: serde_json::Value = online.json().await.unwrap();
    assert_eq!(online["result"], 1);
}
