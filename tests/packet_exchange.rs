//! Packet-exchange coverage for the chat router: scenario S1 (self-exclusion
//! on public message delivery) and S4 (silenced senders are rejected and
//! notified, recipients see nothing) from spec §8.

mod common;

use bancho_proto::{packets, Writer};
use common::{seed_channel, seed_user, TestServer};

fn login_body(username: &str, password: &str) -> String {
    format!("{username}\n{password}\nb20230101|0|1|aaaa:bbbb:cccc:dddd|0\n")
}

fn channel_join_frame(name: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.string(name);
    bancho_proto::frame(packets::client::CHANNEL_JOIN, w.as_bytes())
}

fn public_message_frame(sender: &str, message: &str, to: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.string(sender);
    w.string(message);
    w.string(to);
    bancho_proto::frame(packets::client::SEND_PUBLIC_MESSAGE, w.as_bytes())
}

fn ping_frame() -> Vec<u8> {
    bancho_proto::frame(packets::client::PING, &[])
}

async fn login(client: &reqwest::Client, base: &str, username: &str, password: &str) -> String {
    let resp = client.post(base).body(login_body(username, password)).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    resp.headers().get("cho-token").expect("login must succeed").to_str().unwrap().to_string()
}

async fn exchange(client: &reqwest::Client, base: &str, token: &str, body: Vec<u8>) -> Vec<u8> {
    let resp = client.post(base).header("osu-token", token).body(body).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    resp.bytes().await.unwrap().to_vec()
}

#[tokio::test]
async fn public_message_excludes_sender_and_reaches_channel_members() {
    let port = 15101;
    let db_path = std::env::temp_dir().join(format!("bancho-test-{port}/bancho.db"));
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();
    let db = db_path.to_str().unwrap();

    seed_user(db, "alice", "hunter2", 3, false).await.unwrap();
    seed_user(db, "bob", "hunter2", 3, false).await.unwrap();
    seed_channel(db, "#osu", "default channel").await.unwrap();

    let server = TestServer::spawn(port).await.unwrap();
    let base = server.base_url();
    let client = reqwest::Client::new();

    let alice_token = login(&client, &base, "alice", "hunter2").await;
    let bob_token = login(&client, &base, "bob", "hunter2").await;

    exchange(&client, &base, &alice_token, channel_join_frame("#osu")).await;
    exchange(&client, &base, &bob_token, channel_join_frame("#osu")).await;

    let alice_drain = exchange(&client, &base, &alice_token, public_message_frame("alice", "hi", "#osu")).await;
    let alice_ids: Vec<u16> = bancho_proto::split_frames(&alice_drain).unwrap().into_iter().map(|f| f.id).collect();
    assert!(!alice_ids.contains(&packets::server::SEND_MESSAGE), "sender must not receive its own message back");

    let bob_drain = exchange(&client, &base, &bob_token, ping_frame()).await;
    let bob_message = bancho_proto::split_frames(&bob_drain)
        .unwrap()
        .into_iter()
        .find(|f| f.id == packets::server::SEND_MESSAGE)
        .expect("bob must receive alice's message");

    let mut r = bancho_proto::Reader::new(&bob_message.payload);
    let from = r.string().unwrap();
    let message = r.string().unwrap();
    let to = r.string().unwrap();
    assert_eq!(from, "alice");
    assert_eq!(message, "hi");
    assert_eq!(to, "#osu");
}

#[tokio::test]
async fn silenced_user_message_is_rejected_and_recipients_see_nothing() {
    let port = 15102;
    let db_path = std::env::temp_dir().join(format!("bancho-test-{port}/bancho.db"));
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();
    let db = db_path.to_str().unwrap();

    seed_user(db, "silenced", "hunter2", 3, false).await.unwrap();
    seed_user(db, "listener", "hunter2", 3, false).await.unwrap();
    seed_channel(db, "#osu", "default channel").await.unwrap();

    let server = TestServer::spawn(port).await.unwrap();
    let base = server.base_url();
    let client = reqwest::Client::new();

    // Silence the sender directly in the store before login, so the
    // session picks up silence_end on provisioning (§4.8 step 6).
    {
        let options = sqlx::sqlite::SqliteConnectOptions::new().filename(db);
        let pool = sqlx::SqlitePool::connect_with(options).await.unwrap();
        sqlx::query("UPDATE users SET silence_end = ? WHERE username = 'silenced'")
            .bind(chrono::Utc::now().timestamp() + 60)
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    let silenced_token = login(&client, &base, "silenced", "hunter2").await;
    let listener_token = login(&client, &base, "listener", "hunter2").await;

    exchange(&client, &base, &silenced_token, channel_join_frame("#osu")).await;
    exchange(&client, &base, &listener_token, channel_join_frame("#osu")).await;

    let sender_drain = exchange(&client, &base, &silenced_token, public_message_frame("silenced", "hello", "#osu")).await;
    let sender_ids: Vec<u16> = bancho_proto::split_frames(&sender_drain).unwrap().into_iter().map(|f| f.id).collect();
    assert!(sender_ids.contains(&packets::server::SILENCE_END), "silenced sender must be notified with its remaining silence");
    assert!(!sender_ids.contains(&packets::server::SEND_MESSAGE), "silenced sender's own message must not echo back");

    let listener_drain = exchange(&client, &base, &listener_token, ping_frame()).await;
    let listener_ids: Vec<u16> = bancho_proto::split_frames(&listener_drain).unwrap().into_iter().map(|f| f.id).collect();
    assert!(!listener_ids.contains(&packets::server::SEND_MESSAGE), "recipients must receive nothing from a silenced sender");
}
