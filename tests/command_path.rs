//! Command path integration tests
//!
//! Gemini and Patreon are both served by mock servers.

use serde_json::json;
use unlockr::catalog::EpisodeCatalog;
use unlockr::config::{Config, GeminiConfig, PatreonConfig};
use unlockr::domain::AccessTier;
use unlockr::error::Result;
use unlockr::interpret::{CommandExecutor, CommandStatus, GeminiInterpreter};
use unlockr::access::{AccessApplier, AccessStep, StepStatus};
use unlockr::platform::PatreonClient;
use unlockr::storage::{ContentStore, SqliteStore};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gemini_replying(text: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v1beta/models/.+:generateContent$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [ { "content": { "parts": [ { "text": text } ] } } ]
        })))
        .mount(&server)
        .await;
    server
}

fn gemini(server: &MockServer) -> GeminiInterpreter {
    let config = GeminiConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        ..Default::default()
    };
    GeminiInterpreter::new(&config, Some("key".to_string())).unwrap()
}

fn patreon(server: &MockServer) -> PatreonClient {
    PatreonClient::new(
        &PatreonConfig {
            base_url: server.uri(),
            timeout_secs: 5,
        },
        Some("token".to_string()),
    )
    .unwrap()
}

fn seed(store: &SqliteStore, config: &Config, title: &str, number: Option<i64>, post: Option<&str>) -> i64 {
    let id = store.insert_episode(title, "").unwrap();
    if let Some(number) = number {
        store
            .set_meta(id, &config.fields.episode_number, &number.to_string())
            .unwrap();
    }
    if let Some(post) = post {
        store.set_meta(id, &config.fields.external_post_id, post).unwrap();
    }
    EpisodeCatalog::new(store, &config.fields)
        .classify(id, AccessTier::Advance)
        .unwrap();
    id
}

#[tokio::test]
async fn test_command_makes_episode_free_everywhere() -> Result<()> {
    let gemini_server = gemini_replying("{\"episode_number\": 5, \"access_type\": \"free\", \"confidence\": \"high\"}").await;
    let patreon_server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&patreon_server)
        .await;

    let config = Config::default();
    let store = SqliteStore::open_in_memory()?;
    let id = seed(&store, &config, "Tower Episode 5", Some(5), Some("55"));

    let interpreter = gemini(&gemini_server);
    let platform = patreon(&patreon_server);
    let executor = CommandExecutor::new(
        &interpreter,
        EpisodeCatalog::new(&store, &config.fields),
        AccessApplier::new(&store, &platform, &config.fields, None),
    );

    let outcome = executor.execute("Make episode 5 free for everyone").await?;
    assert_eq!(outcome.status, CommandStatus::Updated);
    assert_eq!(outcome.message, "Episode 5 successfully updated to 'free' access!");

    let access = outcome.access.as_ref().unwrap();
    assert!(access.steps.iter().all(|s| s.status.is_applied()));
    assert_eq!(store.get_meta(id, &config.fields.tier_level_key)?, Some("0".to_string()));
    assert_eq!(
        store.get_custom_field(id, &config.fields.access_custom_field)?,
        Some("free".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_patreon_failure_is_reported_but_cms_updated() -> Result<()> {
    let gemini_server = gemini_replying("{\"episode_number\": 2, \"access_type\": \"free\"}").await;
    let patreon_server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&patreon_server)
        .await;

    let config = Config::default();
    let store = SqliteStore::open_in_memory()?;
    let id = seed(&store, &config, "Tower Episode 2", Some(2), Some("22"));

    let interpreter = gemini(&gemini_server);
    let platform = patreon(&patreon_server);
    let executor = CommandExecutor::new(
        &interpreter,
        EpisodeCatalog::new(&store, &config.fields),
        AccessApplier::new(&store, &platform, &config.fields, None),
    );

    let outcome = executor.execute("unlock episode 2").await?;
    assert!(outcome.success());
    match outcome.access.as_ref().and_then(|a| a.step(AccessStep::RemoteMirror)) {
        Some(StepStatus::Failed(detail)) => assert!(detail.contains("401")),
        other => panic!("unexpected mirror status: {:?}", other),
    }
    let episode = EpisodeCatalog::new(&store, &config.fields).load(id)?.unwrap();
    assert_eq!(episode.access, AccessTier::Free);
    Ok(())
}

#[tokio::test]
async fn test_unknown_episode_number_is_not_found() -> Result<()> {
    let gemini_server = gemini_replying("Here: {\"episode_number\": 40, \"access_type\": \"advance\"}").await;
    let patreon_server = MockServer::start().await;

    let config = Config::default();
    let store = SqliteStore::open_in_memory()?;
    let unnumbered = seed(&store, &config, "Tower Episode 40", None, None);

    let interpreter = gemini(&gemini_server);
    let platform = patreon(&patreon_server);
    let executor = CommandExecutor::new(
        &interpreter,
        EpisodeCatalog::new(&store, &config.fields),
        AccessApplier::new(&store, &platform, &config.fields, None),
    );

    let outcome = executor.execute("lock episode 40").await?;
    assert_eq!(outcome.status, CommandStatus::NotFound);
    assert_eq!(outcome.near_matches.iter().map(|m| m.id).collect::<Vec<_>>(), vec![unnumbered]);
    assert!(outcome.access.is_none());
    Ok(())
}
