//! Schedule runner integration tests
//!
//! Drives the runner end to end over a file-backed store and a mock
//! Patreon API.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde_json::json;
use tempfile::TempDir;
use unlockr::catalog::EpisodeCatalog;
use unlockr::config::{Config, PatreonConfig};
use unlockr::domain::{AccessTier, UnlockSchedule};
use unlockr::error::Result;
use unlockr::platform::PatreonClient;
use unlockr::schedule::{RowStatus, RunOptions, ScheduleRunner};
use unlockr::storage::{ContentStore, ScheduleStore, SqliteStore};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
}

fn add_episode(store: &SqliteStore, config: &Config, title: &str, number: i64, tier: AccessTier, post: Option<&str>) -> i64 {
    let id = store.insert_episode(title, "").unwrap();
    store
        .set_meta(id, &config.fields.episode_number, &number.to_string())
        .unwrap();
    if let Some(post) = post {
        store.set_meta(id, &config.fields.external_post_id, post).unwrap();
    }
    EpisodeCatalog::new(store, &config.fields).classify(id, tier).unwrap();
    id
}

/// Everything a run may touch, for before/after comparison
fn snapshot(store: &SqliteStore, config: &Config, ids: &[i64]) -> String {
    let mut out = serde_json::to_string(&store.load_schedules().unwrap()).unwrap();
    for id in ids {
        let terms: Vec<String> = store
            .episode_terms(*id, &config.fields.taxonomy)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        out.push_str(&format!(
            "|{}:{:?}:{:?}:{:?}:{:?}",
            id,
            terms,
            store.get_meta(*id, &config.fields.tier_level_key).unwrap(),
            store.get_meta(*id, "_ppwp_patreon_level").unwrap(),
            store.get_custom_field(*id, &config.fields.access_custom_field).unwrap(),
        ));
    }
    out
}

#[tokio::test]
async fn test_forced_run_unlocks_episode_and_advances_one_day() -> Result<()> {
    let temp = TempDir::new()?;
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/posts/303"))
        .and(body_partial_json(json!({"data": {"attributes": {"is_public": true}}})))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.settings.paid_tier_id = Some("777".to_string());
    let store = SqliteStore::open(temp.path().join("unlockr.db"))?;
    let platform = PatreonClient::new(
        &PatreonConfig {
            base_url: server.uri(),
            timeout_secs: 5,
        },
        Some("token".to_string()),
    )?;

    let series = store.insert_series("Tower")?;
    let prior = at(2025, 3, 20, 2, 0);
    let mut schedule = UnlockSchedule::new(series, "Tower").with_skip_weekends(false);
    schedule.next_due_at = Some(prior);
    store.save_schedules(&[schedule])?;
    let episode = add_episode(&store, &config, "Tower Episode 3", 3, AccessTier::Advance, Some("303"));
    store.set_meta(episode, &config.fields.tier_level_key, "777")?;

    // Well before the due time: only force makes it due.
    let runner = ScheduleRunner::new(&store, &store, &platform, &config);
    let report = runner.run(at(2025, 3, 18, 12, 0), RunOptions::forced()).await?;

    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].status, RowStatus::Unlocked);
    assert_eq!(report.rows[0].episode.as_ref().map(|e| e.id), Some(episode));
    assert_eq!(report.unlock_count(), 1);

    drop(runner);
    drop(store);

    // Reopen from disk.
    let store = SqliteStore::open(temp.path().join("unlockr.db"))?;
    let catalog = EpisodeCatalog::new(&store, &config.fields);
    assert_eq!(catalog.load(episode)?.map(|e| e.access), Some(AccessTier::Free));
    assert_eq!(store.get_meta(episode, &config.fields.tier_level_key)?, Some("0".to_string()));
    assert_eq!(store.load_schedules()?[0].next_due_at, Some(prior + TimeDelta::days(1)));
    Ok(())
}

#[tokio::test]
async fn test_due_run_without_matching_episode_keeps_due_date() -> Result<()> {
    let config = Config::default();
    let store = SqliteStore::open_in_memory()?;
    let platform = PatreonClient::new(&config.patreon, None)?;

    let series = store.insert_series("Tower")?;
    let due = at(2025, 3, 20, 2, 0);
    let mut schedule = UnlockSchedule::new(series, "Tower");
    schedule.next_due_at = Some(due);
    store.save_schedules(&[schedule])?;
    add_episode(&store, &config, "Tower Episode 1", 1, AccessTier::Free, None);
    add_episode(&store, &config, "Castle Episode 2", 2, AccessTier::Advance, None);

    let runner = ScheduleRunner::new(&store, &store, &platform, &config);
    for day in 20..23 {
        let report = runner.run(at(2025, 3, day, 9, 0), RunOptions::default()).await?;
        assert_eq!(report.rows[0].status, RowStatus::NoEpisodeFound);
        assert_eq!(report.rows[0].status.tag(), "no-episode-found");
        assert_eq!(store.load_schedules()?[0].next_due_at, Some(due));
    }
    Ok(())
}

#[tokio::test]
async fn test_preview_matches_real_run_and_changes_nothing() -> Result<()> {
    let config = Config::default();
    let store = SqliteStore::open_in_memory()?;
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;
    let platform = PatreonClient::new(
        &PatreonConfig {
            base_url: server.uri(),
            timeout_secs: 5,
        },
        Some("token".to_string()),
    )?;

    let tower = store.insert_series("Tower")?;
    let castle = store.insert_series("Castle")?;
    let mut due_tower = UnlockSchedule::new(tower, "Tower").with_interval(2);
    due_tower.next_due_at = Some(at(2025, 3, 20, 2, 0));
    let fresh_castle = UnlockSchedule::new(castle, "Castle");
    store.save_schedules(&[due_tower, fresh_castle])?;

    let ids = vec![
        add_episode(&store, &config, "Tower Episode 12", 12, AccessTier::Advance, Some("12")),
        add_episode(&store, &config, "Tower Episode 5", 5, AccessTier::Advance, Some("5")),
        add_episode(&store, &config, "Tower Episode 8", 8, AccessTier::Advance, None),
        add_episode(&store, &config, "Castle Episode 1", 1, AccessTier::Advance, None),
    ];

    let now = at(2025, 3, 20, 9, 0);
    let before = snapshot(&store, &config, &ids);

    let runner = ScheduleRunner::new(&store, &store, &platform, &config);
    let preview = runner.run(now, RunOptions::preview()).await?;
    assert_eq!(snapshot(&store, &config, &ids), before);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());

    let real = runner.run(now, RunOptions::default()).await?;
    assert_ne!(snapshot(&store, &config, &ids), before);

    assert_eq!(preview.rows.len(), real.rows.len());
    for (p, r) in preview.rows.iter().zip(&real.rows) {
        assert!(p.same_decision(r), "preview {:?} vs run {:?}", p, r);
    }
    assert_eq!(preview.rows[0].status, RowStatus::WillUnlock);
    assert_eq!(real.rows[0].status, RowStatus::Unlocked);
    assert_eq!(real.rows[0].episode.as_ref().map(|e| e.id), Some(ids[1]));
    // Thursday + 2 weekdays = Monday
    assert_eq!(real.rows[0].next_due_at, Some(at(2025, 3, 24, 2, 0)));
    assert_eq!(real.rows[1].status, RowStatus::NotDue);
    Ok(())
}
