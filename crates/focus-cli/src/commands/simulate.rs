use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use focus_application::{EntryOutcome, SessionUseCase};
use focus_core::clock::{Clock, ManualClock};
use focus_core::config::FocusConfig;
use focus_core::presence::AppState;
use focus_infrastructure::MemoryDocumentStore;
use serde_json::{Map, Value, json};
use std::sync::Arc;

const HOST_ID: &str = "host";

/// Scripted session driven by a manual clock.
pub struct Script {
    pub duration_minutes: u32,
    pub is_marathon: bool,
    pub participants: Vec<String>,
    /// Host absences in seconds
    pub absences: Vec<u64>,
    /// Manual end, seconds after start
    pub end_after: Option<u64>,
}

pub async fn run(config: FocusConfig, script: Script) -> Result<()> {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryDocumentStore::with_clock(clock.clone()));
    let usecase = SessionUseCase::new(store, clock.clone(), config);
    let lifecycle = usecase.lifecycle().clone();

    let mut users = vec![HOST_ID.to_string()];
    users.extend(
        script
            .participants
            .iter()
            .filter(|id| id.as_str() != HOST_ID)
            .cloned(),
    );
    for user in &users {
        usecase
            .profiles()
            .create_profile(user, user, &format!("{}@example.com", user))
            .await?;
    }

    let session_id = match usecase
        .create_session(HOST_ID, &[], script.duration_minutes, script.is_marathon)
        .await?
    {
        EntryOutcome::Entered(id) => id,
        EntryOutcome::Blocked(existing) => bail!("host already in session {}", existing.id),
    };
    let room_code = lifecycle
        .get_session(&session_id)
        .await?
        .context("session vanished after create")?
        .room_code;
    tracing::info!("[Simulate] Session {} open with room code {}", session_id, room_code);

    for user in users.iter().skip(1) {
        usecase.join_session(&room_code, user).await?;
    }
    lifecycle.start(&session_id).await?;
    let started_at = clock.now();

    let runner = usecase.attach_runner(&session_id, HOST_ID).await?;
    for secs in &script.absences {
        clock.advance(Duration::seconds(1));
        runner
            .handle_app_state_change(AppState::Active, AppState::Background, clock.now())
            .await?;
        clock.set(offset(clock.now(), *secs)?);
        let handled = runner
            .handle_app_state_change(AppState::Background, AppState::Active, clock.now())
            .await?;
        if let Some(handled) = handled {
            tracing::info!(
                "[Simulate] Absence of {}s recorded as {}",
                handled.absence.duration_seconds,
                handled.report.category
            );
            if handled.terminated {
                tracing::info!("[Simulate] Session {} terminated", session_id);
                break;
            }
        }
    }

    if !runner.is_completing() {
        match (script.end_after, script.is_marathon) {
            (Some(secs), _) => {
                clock.set(offset(started_at, secs)?);
                runner.end_manually().await?;
            }
            (None, true) => {
                runner.end_manually().await?;
            }
            (None, false) => {
                clock.set(started_at + Duration::minutes(i64::from(script.duration_minutes)));
                runner.check_auto_complete().await?;
            }
        }
    }

    let session = lifecycle
        .get_session(&session_id)
        .await?
        .context("session vanished before reconciliation")?;
    let results = usecase.reconciler().reconcile_all(&session).await?;
    tracing::debug!("[Simulate] Reconciled {:?}", results);

    let session = lifecycle
        .get_session(&session_id)
        .await?
        .context("session vanished after reconciliation")?;
    let mut profiles = Map::new();
    for user in &users {
        let profile = usecase.profiles().get_profile(user).await?;
        profiles.insert(user.clone(), serde_json::to_value(profile)?);
    }

    let output = json!({
        "sessionId": session_id,
        "session": session,
        "profiles": Value::Object(profiles),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// `from + secs`, rejecting offsets chrono cannot represent.
fn offset(from: DateTime<Utc>, secs: u64) -> Result<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|by| from.checked_add_signed(by))
        .with_context(|| format!("{}s is out of range", secs))
}
