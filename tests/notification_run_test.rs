use birthday_notifier::adapters::clock::FixedClock;
use birthday_notifier::adapters::greeter::{build_greeter, NoopGreeter};
use birthday_notifier::config::GreetingsConfig;
use birthday_notifier::core::composer::{MessageComposer, TextFormat};
use birthday_notifier::core::dispatch::Dispatcher;
use birthday_notifier::core::schedule;
use birthday_notifier::domain::model::{DeliveryFailure, DeliveryStatus, RecipientId, RunReport, RunSummary};
use birthday_notifier::domain::ports::Greeter;
use birthday_notifier::{
    LocalStorage, NotificationJob, NotifierError, RosterStore, RunSource, TelegramNotifier, TriggerState,
};
use chrono::{FixedOffset, TimeZone, Utc};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TOKEN: &str = "123456:TEST-TOKEN";

fn send_path() -> String {
    format!("/bot{}/sendMessage", TOKEN)
}

fn write_roster(dir: &TempDir, roster: serde_json::Value) {
    std::fs::write(dir.path().join("birthdays.json"), roster.to_string()).unwrap();
}

fn build_job(
    server: &MockServer,
    dir: &TempDir,
    token: Option<&str>,
    recipients: &[i64],
    greeter: Box<dyn Greeter>,
) -> NotificationJob<LocalStorage> {
    build_job_in_format(server, dir, token, recipients, greeter, TextFormat::Html)
}

fn build_job_in_format(
    server: &MockServer,
    dir: &TempDir,
    token: Option<&str>,
    recipients: &[i64],
    greeter: Box<dyn Greeter>,
    format: TextFormat,
) -> NotificationJob<LocalStorage> {
    let parse_mode = match format {
        TextFormat::Html => Some("HTML".to_string()),
        TextFormat::Plain => None,
    };
    let notifier = TelegramNotifier::new(
        &server.base_url(),
        token.map(str::to_string),
        parse_mode,
        Duration::from_secs(5),
    )
    .unwrap();

    // 06:00 UTC on 5 July is 09:00 at +03:00.
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 7, 5, 6, 0, 0).unwrap()));

    NotificationJob::new(
        RosterStore::new(LocalStorage::new(dir.path()), "birthdays.json"),
        MessageComposer::new(greeter).with_format(format),
        Dispatcher::new(Arc::new(notifier), Duration::from_secs(5)),
        recipients.iter().copied().map(RecipientId).collect(),
        FixedOffset::east_opt(3 * 3600).unwrap(),
        clock,
    )
}

#[tokio::test]
async fn test_run_delivers_digest_and_fails_forward() {
    let dir = TempDir::new().unwrap();
    write_roster(
        &dir,
        json!([
            {"name": "Ivanov Ivan", "birthday": "05.07"},
            {"name": "Petrova Anna", "birthday": "05.07"},
            {"name": "Sidorov Oleg", "birthday": "06.07"},
            {"name": "Nobody", "birthday": "01.01"}
        ]),
    );

    let server = MockServer::start_async().await;
    let first = server
        .mock_async(|when, then| {
            when.method(POST).path(send_path()).json_body_partial(r#"{"chat_id": 111}"#);
            then.status(200).json_body(json!({"ok": true, "result": {"message_id": 1}}));
        })
        .await;
    let blocked = server
        .mock_async(|when, then| {
            when.method(POST).path(send_path()).json_body_partial(r#"{"chat_id": 222}"#);
            then.status(403).json_body(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            }));
        })
        .await;
    let third = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(send_path())
                .json_body_partial(r#"{"chat_id": 333, "parse_mode": "HTML"}"#)
                .body_contains("Today are the birthdays of: Ivanov Ivan, Petrova Anna!")
                .body_contains("Tomorrow is Sidorov Oleg's birthday!");
            then.status(200).json_body(json!({"ok": true, "result": {"message_id": 3}}));
        })
        .await;

    let job = build_job(&server, &dir, Some(TOKEN), &[111, 222, 333], Box::new(NoopGreeter));
    let report = job.run_once(RunSource::Manual).await.unwrap();

    first.assert_async().await;
    blocked.assert_async().await;
    third.assert_async().await;

    let RunReport::Dispatched { matches, outcomes, summary, .. } = report else {
        panic!("expected a dispatched run");
    };
    assert_eq!(matches.today, vec!["Ivanov Ivan", "Petrova Anna"]);
    assert_eq!(matches.tomorrow, vec!["Sidorov Oleg"]);
    assert_eq!(summary, RunSummary { sent: 2, failed: 1 });

    let recipients: Vec<i64> = outcomes.iter().map(|o| o.recipient.0).collect();
    assert_eq!(recipients, vec![111, 222, 333]);
    assert_eq!(outcomes[0].status, DeliveryStatus::Sent);
    assert!(matches!(
        outcomes[1].status,
        DeliveryStatus::Failed(DeliveryFailure::RecipientBlocked(_))
    ));
    assert_eq!(outcomes[2].status, DeliveryStatus::Sent);
    assert_eq!(job.state(), TriggerState::Idle);
}

#[tokio::test]
async fn test_missing_roster_file_sends_nothing() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let any_send = server
        .mock_async(|when, then| {
            when.method(POST).path(send_path());
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    let job = build_job(&server, &dir, Some(TOKEN), &[111], Box::new(NoopGreeter));
    let report = job.run_once(RunSource::Scheduled).await.unwrap();

    assert!(matches!(report, RunReport::NothingToSend { .. }));
    assert_eq!(any_send.hits_async().await, 0);
}

#[tokio::test]
async fn test_placeholder_token_aborts_before_any_send() {
    let dir = TempDir::new().unwrap();
    write_roster(&dir, json!([{"name": "Anna", "birthday": "05.07"}]));

    let server = MockServer::start_async().await;
    let any_send = server
        .mock_async(|when, then| {
            when.method(POST).path_contains("sendMessage");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    let job = build_job(&server, &dir, Some("${BOT_TOKEN}"), &[111, 222], Box::new(NoopGreeter));
    let err = job.run_once(RunSource::Manual).await.unwrap_err();

    assert!(matches!(err, NotifierError::ConfigError { .. }));
    assert_eq!(any_send.hits_async().await, 0);
}

#[tokio::test]
async fn test_empty_recipient_list_aborts_before_any_send() {
    let dir = TempDir::new().unwrap();
    write_roster(&dir, json!([{"name": "Anna", "birthday": "05.07"}]));

    let server = MockServer::start_async().await;
    let any_send = server
        .mock_async(|when, then| {
            when.method(POST).path(send_path());
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    let job = build_job(&server, &dir, Some(TOKEN), &[], Box::new(NoopGreeter));
    let err = job.run_once(RunSource::Manual).await.unwrap_err();

    assert!(matches!(err, NotifierError::ConfigError { .. }));
    assert_eq!(any_send.hits_async().await, 0);
}

#[tokio::test]
async fn test_names_are_html_escaped_and_greeting_attached() {
    let dir = TempDir::new().unwrap();
    write_roster(&dir, json!([{"name": "Tom <Cat> & Co", "birthday": "05.07"}]));

    let server = MockServer::start_async().await;
    let escaped = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(send_path())
                .body_contains("Today is Tom &lt;Cat&gt; &amp; Co's birthday!")
                .body_contains("Hi &lt;Cat&gt;!");
            then.status(200).json_body(json!({"ok": true, "result": {"message_id": 9}}));
        })
        .await;

    let greetings = GreetingsConfig {
        enabled: true,
        personal: Some(vec!["Hi {name}!".to_string()]),
        collective: None,
        closing: Some(vec![]),
    };
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 7, 5, 6, 0, 0).unwrap()));
    let job = build_job(&server, &dir, Some(TOKEN), &[111], build_greeter(&greetings, clock, TextFormat::Html));

    let report = job.run_once(RunSource::Manual).await.unwrap();

    escaped.assert_async().await;
    let RunReport::Dispatched { message, .. } = report else {
        panic!("expected a dispatched run");
    };
    // Empty closing bank falls back to the fixed phrase.
    assert!(message.ends_with("🎉 Happy birthday to everyone celebrating!"));
}

#[tokio::test]
async fn test_plain_text_mode_sends_names_verbatim() {
    let dir = TempDir::new().unwrap();
    write_roster(&dir, json!([{"name": "Ivanov R&D", "birthday": "05.07"}]));

    let server = MockServer::start_async().await;
    let plain = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(send_path())
                .body_contains("Today is Ivanov R&D's birthday!")
                .body_contains("Hi R&D!");
            then.status(200).json_body(json!({"ok": true, "result": {"message_id": 4}}));
        })
        .await;

    let greetings = GreetingsConfig {
        enabled: true,
        personal: Some(vec!["Hi {name}!".to_string()]),
        collective: None,
        closing: None,
    };
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 7, 5, 6, 0, 0).unwrap()));
    let job = build_job_in_format(
        &server,
        &dir,
        Some(TOKEN),
        &[111],
        build_greeter(&greetings, clock, TextFormat::Plain),
        TextFormat::Plain,
    );

    let report = job.run_once(RunSource::Manual).await.unwrap();

    plain.assert_async().await;
    let RunReport::Dispatched { message, summary, .. } = report else {
        panic!("expected a dispatched run");
    };
    assert!(!message.contains("&amp;"));
    assert_eq!(summary, RunSummary { sent: 1, failed: 0 });
}

#[tokio::test]
async fn test_success_status_with_unreadable_body_counts_as_sent() {
    let dir = TempDir::new().unwrap();
    write_roster(&dir, json!([{"name": "Anna", "birthday": "05.07"}]));

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(send_path()).json_body_partial(r#"{"chat_id": 111}"#);
            then.status(200).header("content-type", "text/plain").body("OK");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(send_path()).json_body_partial(r#"{"chat_id": 222}"#);
            then.status(502).body("<html>Bad Gateway</html>");
        })
        .await;

    let job = build_job(&server, &dir, Some(TOKEN), &[111, 222], Box::new(NoopGreeter));
    let report = job.run_once(RunSource::Manual).await.unwrap();

    let RunReport::Dispatched { outcomes, summary, .. } = report else {
        panic!("expected a dispatched run");
    };
    assert_eq!(outcomes[0].status, DeliveryStatus::Sent);
    assert!(matches!(
        outcomes[1].status,
        DeliveryStatus::Failed(DeliveryFailure::Api { status: 502, .. })
    ));
    assert_eq!(summary, RunSummary { sent: 1, failed: 1 });
}

#[tokio::test]
async fn test_rate_limit_is_classified_with_retry_after() {
    let dir = TempDir::new().unwrap();
    write_roster(&dir, json!([{"name": "Anna", "birthday": "06.07"}]));

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(send_path());
            then.status(429).json_body(json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 12",
                "parameters": {"retry_after": 12}
            }));
        })
        .await;

    let job = build_job(&server, &dir, Some(TOKEN), &[111], Box::new(NoopGreeter));
    let report = job.run_once(RunSource::Manual).await.unwrap();

    let RunReport::Dispatched { outcomes, .. } = report else {
        panic!("expected a dispatched run");
    };
    assert_eq!(
        outcomes[0].status,
        DeliveryStatus::Failed(DeliveryFailure::RateLimited { retry_after: Some(12) })
    );
}

#[tokio::test]
async fn test_get_me_reports_bot_identity() {
    let server = MockServer::start_async().await;
    let get_me = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/bot{}/getMe", TOKEN));
            then.status(200).json_body(json!({
                "ok": true,
                "result": {"id": 42, "is_bot": true, "first_name": "Birthdays", "username": "birthday_bot"}
            }));
        })
        .await;

    let notifier = TelegramNotifier::new(&server.base_url(), Some(TOKEN.to_string()), None, Duration::from_secs(5)).unwrap();
    let bot = notifier.get_me().await.unwrap();

    get_me.assert_async().await;
    assert_eq!(bot.id, 42);
    assert_eq!(bot.username.as_deref(), Some("birthday_bot"));
}

#[tokio::test]
async fn test_get_me_rejected_token() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/bot{}/getMe", TOKEN));
            then.status(401).json_body(json!({"ok": false, "error_code": 401, "description": "Unauthorized"}));
        })
        .await;

    let notifier = TelegramNotifier::new(&server.base_url(), Some(TOKEN.to_string()), None, Duration::from_secs(5)).unwrap();
    let err = notifier.get_me().await.unwrap_err();

    assert!(err.to_string().contains("Unauthorized"));
}

#[tokio::test]
async fn test_invalid_schedule_disables_trigger() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let job = Arc::new(build_job(&server, &dir, Some(TOKEN), &[111], Box::new(NoopGreeter)));

    let err = schedule::register(job.clone(), "quarter past nine").unwrap_err();

    assert!(matches!(err, NotifierError::SchedulerError { .. }));
    assert_eq!(job.state(), TriggerState::Disabled);
}

#[tokio::test]
async fn test_valid_schedule_registers_background_timer() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let job = Arc::new(build_job(&server, &dir, Some(TOKEN), &[111], Box::new(NoopGreeter)));

    let (schedule, handle) = schedule::register(job.clone(), "09:00").unwrap();

    // The fixed clock sits exactly on today's firing, so the next one is tomorrow.
    assert_eq!(
        schedule.next_after(job.now()),
        Utc.with_ymd_and_hms(2025, 7, 6, 6, 0, 0).unwrap()
    );
    assert_eq!(job.state(), TriggerState::Idle);
    handle.abort();
}
