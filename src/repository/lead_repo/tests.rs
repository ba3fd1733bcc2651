use super::LeadRepository;
use crate::domain::lead::{Interaction, Lead, LeadFilter, LeadPatch};
use crate::domain::types::{InteractionKind, LeadStatus};
use crate::engine::repositories::LeadStore;
use crate::repository::error::RepositoryError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::ensure_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

fn make_test_lead(lead_id: &str, agent: Option<&str>) -> Lead {
    let mut custom_fields = BTreeMap::new();
    custom_fields.insert("specialty".to_string(), "yoga".to_string());
    Lead {
        lead_id: lead_id.to_string(),
        name: format!("Lead {}", lead_id),
        source: "instagram".to_string(),
        score: 80,
        stage: "interes".to_string(),
        status: LeadStatus::Contacted,
        assigned_agent_id: agent.map(str::to_string),
        assigned_at: agent.map(|_| base_time()),
        last_contact_at: None,
        converted_at: None,
        created_at: base_time(),
        updated_at: base_time(),
        interactions: vec![Interaction {
            interaction_id: format!("{}-i1", lead_id),
            kind: InteractionKind::WhatsappSent,
            occurred_at: base_time() + Duration::hours(1),
            agent_id: agent.map(str::to_string),
            description: None,
        }],
        tags: vec!["vip".to_string()],
        custom_fields,
    }
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = LeadRepository::new(setup_test_db());
    let lead = make_test_lead("L1", Some("A"));
    repo.insert(&lead).unwrap();

    let loaded = repo.find_by_id("L1").unwrap().unwrap();
    assert_eq!(loaded, lead);
    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_find_with_filters() {
    let repo = LeadRepository::new(setup_test_db());
    repo.insert(&make_test_lead("L1", Some("A"))).unwrap();
    repo.insert(&make_test_lead("L2", None)).unwrap();
    let mut lost = make_test_lead("L3", Some("B"));
    lost.status = LeadStatus::Lost;
    repo.insert(&lost).unwrap();

    assert_eq!(repo.fetch_leads(&LeadFilter::all()).unwrap().len(), 3);

    let active: Vec<String> = repo
        .fetch_leads(&LeadFilter::assigned_active())
        .unwrap()
        .into_iter()
        .map(|l| l.lead_id)
        .collect();
    assert_eq!(active, vec!["L1".to_string()]);

    let by_agent = LeadFilter {
        assigned_to: vec!["B".to_string()],
        ..Default::default()
    };
    assert_eq!(repo.fetch_leads(&by_agent).unwrap()[0].lead_id, "L3");
}

#[test]
fn test_update_with_matching_expectation() {
    let repo = LeadRepository::new(setup_test_db());
    repo.insert(&make_test_lead("L1", Some("A"))).unwrap();

    let at = base_time() + Duration::hours(30);
    let patch = LeadPatch::reassign(Some("A".to_string()), "B".to_string(), at);
    let updated = repo.update_lead("L1", &patch).unwrap();
    assert_eq!(updated.assigned_agent_id.as_deref(), Some("B"));
    assert_eq!(updated.assigned_at, Some(at));

    let stored = repo.find_by_id("L1").unwrap().unwrap();
    assert_eq!(stored.assigned_agent_id.as_deref(), Some("B"));
}

#[test]
fn test_update_conflict_leaves_row_untouched() {
    let repo = LeadRepository::new(setup_test_db());
    repo.insert(&make_test_lead("L1", Some("A"))).unwrap();

    let patch = LeadPatch::reassign(Some("Z".to_string()), "B".to_string(), Utc::now());
    match repo.update_lead("L1", &patch) {
        Err(RepositoryError::AssignmentConflict { expected, actual, .. }) => {
            assert_eq!(expected.as_deref(), Some("Z"));
            assert_eq!(actual.as_deref(), Some("A"));
        }
        other => panic!("expected conflict, got {:?}", other),
    }
    let stored = repo.find_by_id("L1").unwrap().unwrap();
    assert_eq!(stored.assigned_agent_id.as_deref(), Some("A"));
}

#[test]
fn test_update_missing_lead_is_not_found() {
    let repo = LeadRepository::new(setup_test_db());
    let patch = LeadPatch::reassign(None, "B".to_string(), Utc::now());
    assert!(matches!(
        repo.update_lead("nope", &patch),
        Err(RepositoryError::NotFound { .. })
    ));
}

#[test]
fn test_add_interaction_advances_last_contact() {
    let repo = LeadRepository::new(setup_test_db());
    repo.insert(&make_test_lead("L1", Some("A"))).unwrap();

    let at = base_time() + Duration::hours(5);
    repo.add_interaction(
        "L1",
        &Interaction {
            interaction_id: "L1-i2".to_string(),
            kind: InteractionKind::WhatsappReplied,
            occurred_at: at,
            agent_id: None,
            description: Some("ok".to_string()),
        },
    )
    .unwrap();

    let stored = repo.find_by_id("L1").unwrap().unwrap();
    assert_eq!(stored.last_contact_at, Some(at));
    assert_eq!(stored.interactions.len(), 2);
    assert_eq!(stored.interactions[1].kind, InteractionKind::WhatsappReplied);
}

#[test]
fn test_unparsable_timestamp_maps_to_earliest() {
    let conn = setup_test_db();
    let repo = LeadRepository::new(conn.clone());
    repo.insert(&make_test_lead("L1", Some("A"))).unwrap();
    conn.lock()
        .unwrap()
        .execute(
            "UPDATE lead SET last_contact_at = 'yesterday' WHERE lead_id = 'L1'",
            [],
        )
        .unwrap();

    let stored = repo.find_by_id("L1").unwrap().unwrap();
    assert_eq!(stored.last_contact_at, Some(DateTime::<Utc>::MIN_UTC));
}
