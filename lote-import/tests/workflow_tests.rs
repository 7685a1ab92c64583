//! Import workflow integration tests
//!
//! Drive `ImportWorkflow` end to end over in-memory stores and a scripted
//! tracker: file checks, parse and validation failures, the batch with its
//! per-record failures, login retries, cancellation and history recording.

mod helpers;

use std::time::Duration;

use helpers::{credentials, drain, tarefa_rows, test_config, Harness, ScriptedTracker};
use lote_common::events::ImportEvent;
use lote_import::models::{HistoryStatus, ImportMode, ImportState};
use lote_import::remote::RemoteError;
use lote_import::{Credentials, ImportError};

fn remote_failure(message: &str) -> RemoteError {
    RemoteError::Remote {
        status: 500,
        message: message.to_string(),
    }
}

// ============================================================================
// Batch execution
// ============================================================================

#[tokio::test]
async fn test_batch_continues_past_a_failed_record() {
    let mut h = Harness::new(ScriptedTracker::new().fail_title("C", remote_failure("duplicado"))).await;
    let path = h.input("lote.csv", &tarefa_rows(5));

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    let session = h.workflow.process_file().await.unwrap();
    assert_eq!(session.pending_records().len(), 5);
    assert_eq!(h.workflow.state(), ImportState::Preview);

    let results = h.workflow.execute_import(&credentials()).await.unwrap().clone();
    assert_eq!(results.success_count(), 4);
    assert_eq!(results.error_count(), 1);
    assert_eq!(results.total, 5);
    assert_eq!(results.errors[0].line, 4);
    assert_eq!(results.errors[0].title, "C");
    assert_eq!(results.errors[0].message, "Erro remoto 500: duplicado");

    let lines: Vec<usize> = results.success.iter().map(|s| s.line).collect();
    assert_eq!(lines, vec![2, 3, 5, 6]);

    assert_eq!(h.tracker.titles(), vec!["A", "B", "C", "D", "E"]);
    assert_eq!(h.tracker.logins(), 1);
    assert_eq!(h.workflow.state(), ImportState::Completed);

    let history = h.workflow.history();
    assert_eq!(history.len(), 1);
    let entry = &history.entries()[0];
    assert_eq!(entry.status, HistoryStatus::Completed);
    assert_eq!(entry.success_count, 4);
    assert_eq!(entry.error_count, 1);
    assert_eq!(entry.total_activities, 5);

    assert!(!h.store.has_session().await, "terminal outcome clears the session slot");
    assert!(h.store.has_history().await);
}

#[tokio::test]
async fn test_progress_events_cover_every_record() {
    let mut h = Harness::new(ScriptedTracker::new().fail_title("B", remote_failure("recusado"))).await;
    let path = h.input("lote.csv", &tarefa_rows(3));
    let mut rx = h.events.subscribe();

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    h.workflow.process_file().await.unwrap();
    h.workflow.execute_import(&credentials()).await.unwrap();

    let events = drain(&mut rx);
    let progress: Vec<(usize, usize, f64)> = events
        .iter()
        .filter_map(|e| match e {
            ImportEvent::Progress {
                completed,
                total,
                fraction,
                ..
            } => Some((*completed, *total, *fraction)),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 3);
    assert_eq!(progress.last().unwrap(), &(3, 3, 1.0));

    let created = events.iter().filter(|e| e.event_type() == "RecordCreated").count();
    let failed: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ImportEvent::RecordFailed { line, .. } => Some(*line),
            _ => None,
        })
        .collect();
    assert_eq!(created, 2);
    assert_eq!(failed, vec![3]);

    let states: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            ImportEvent::StateChanged { new_state, .. } => Some(new_state.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec!["FILE_SELECTED", "PARSING", "VALIDATING", "PREVIEW", "PROCESSING", "COMPLETED"]
    );
}

#[tokio::test]
async fn test_partially_valid_file_reports_validation_rejections() {
    let mut h = Harness::new(ScriptedTracker::new()).await;
    let path = h.input("lote.csv", "tipo,titulo\nTarefa,A\nTarefa,\nTarefa,C\n");

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    let session = h.workflow.process_file().await.unwrap();
    assert_eq!(session.pending_records().len(), 2);
    assert_eq!(session.results.error_count(), 1);
    assert_eq!(session.results.errors[0].line, 3);

    let results = h.workflow.execute_import(&credentials()).await.unwrap().clone();
    assert_eq!(h.tracker.titles(), vec!["A", "C"]);
    assert_eq!(results.success_count(), 2);
    assert_eq!(results.error_count(), 1);
    assert_eq!(results.total, 3);
    assert!(results.errors[0].message.contains("Título obrigatório"));

    let report = h.workflow.report().unwrap();
    assert_eq!(report.lines().count(), 4);
    assert!(report.lines().nth(2).unwrap().contains("erro"));
}

#[tokio::test]
async fn test_update_mode_sends_updates() {
    let mut h = Harness::new(ScriptedTracker::new()).await;
    let path = h.input(
        "alteracoes.csv",
        "id_atividade,tipo,titulo,id_conta\nA-1,,Novo titulo,77\nA-2,Tarefa,Outro,77\n",
    );

    h.workflow.select_file(&path, ImportMode::Update).await.unwrap();
    h.workflow.process_file().await.unwrap();
    let results = h.workflow.execute_import(&credentials()).await.unwrap();
    assert_eq!(results.success_count(), 2);

    let updated: Vec<Option<String>> = h.tracker.calls().into_iter().map(|c| c.updated_id).collect();
    assert_eq!(updated, vec![Some("A-1".to_string()), Some("A-2".to_string())]);
}

// ============================================================================
// Login handling
// ============================================================================

#[tokio::test]
async fn test_rejected_login_sends_nothing() {
    let mut h = Harness::new(
        ScriptedTracker::new().fail_login(RemoteError::AuthRejected("senha inválida".to_string())),
    )
    .await;
    let path = h.input("lote.csv", &tarefa_rows(2));

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    h.workflow.process_file().await.unwrap();
    let err = h.workflow.execute_import(&credentials()).await.unwrap_err();

    assert!(matches!(err, ImportError::Authentication(RemoteError::AuthRejected(_))));
    assert_eq!(h.workflow.state(), ImportState::Error);
    assert!(h.tracker.calls().is_empty());
    assert_eq!(h.tracker.logins(), 1);
    assert!(h.workflow.last_error().unwrap().contains("senha inválida"));

    let entry = &h.workflow.history().entries()[0];
    assert_eq!(entry.status, HistoryStatus::Error);
    assert_eq!(entry.success_count, 0);
    assert!(!h.store.has_session().await);
}

#[tokio::test]
async fn test_expired_login_is_retried_once() {
    let mut h = Harness::new(ScriptedTracker::new().fail_login(RemoteError::AuthExpired)).await;
    let path = h.input("lote.csv", &tarefa_rows(2));

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    h.workflow.process_file().await.unwrap();
    let results = h.workflow.execute_import(&credentials()).await.unwrap();

    assert_eq!(results.success_count(), 2);
    assert_eq!(h.tracker.logins(), 2);
}

#[tokio::test]
async fn test_twice_expired_login_fails() {
    let mut h = Harness::new(
        ScriptedTracker::new()
            .fail_login(RemoteError::AuthExpired)
            .fail_login(RemoteError::AuthExpired),
    )
    .await;
    let path = h.input("lote.csv", &tarefa_rows(1));

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    h.workflow.process_file().await.unwrap();
    let err = h.workflow.execute_import(&credentials()).await.unwrap_err();

    assert!(matches!(err, ImportError::Authentication(RemoteError::AuthExpired)));
    assert_eq!(h.tracker.logins(), 2);
    assert_eq!(h.workflow.state(), ImportState::Error);
}

#[tokio::test]
async fn test_login_expiring_mid_batch_reauthenticates_and_retries() {
    let mut h = Harness::new(ScriptedTracker::new().fail_title("B", RemoteError::AuthExpired)).await;
    let path = h.input("lote.csv", &tarefa_rows(3));

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    h.workflow.process_file().await.unwrap();
    let results = h.workflow.execute_import(&credentials()).await.unwrap();

    assert_eq!(results.success_count(), 3);
    assert_eq!(results.error_count(), 0);
    assert_eq!(h.tracker.logins(), 2);

    let calls = h.tracker.calls();
    let tokens: Vec<(&str, &str)> = calls
        .iter()
        .map(|c| (c.title.as_str(), c.token.as_str()))
        .collect();
    assert_eq!(
        tokens,
        vec![
            ("A", "ana-token-1"),
            ("B", "ana-token-1"),
            ("B", "ana-token-2"),
            ("C", "ana-token-2"),
        ]
    );
}

#[tokio::test]
async fn test_record_expiring_twice_is_a_record_failure() {
    let mut h = Harness::new(
        ScriptedTracker::new()
            .fail_title("A", RemoteError::AuthExpired)
            .fail_title("A", RemoteError::AuthExpired),
    )
    .await;
    let path = h.input("lote.csv", &tarefa_rows(2));

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    h.workflow.process_file().await.unwrap();
    let results = h.workflow.execute_import(&credentials()).await.unwrap();

    assert_eq!(results.success_count(), 1);
    assert_eq!(results.error_count(), 1);
    assert_eq!(results.errors[0].line, 2);
    assert_eq!(h.workflow.state(), ImportState::Completed);
}

#[tokio::test]
async fn test_missing_credentials_keep_preview() {
    let mut h = Harness::new(ScriptedTracker::new()).await;
    let path = h.input("lote.csv", &tarefa_rows(1));

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    h.workflow.process_file().await.unwrap();
    let err = h
        .workflow
        .execute_import(&Credentials::new("", "segredo"))
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::MissingCredentials));
    assert_eq!(h.workflow.state(), ImportState::Preview);
    assert_eq!(h.tracker.logins(), 0);
    assert!(h.store.has_session().await);
}

// ============================================================================
// Parse and validation failures
// ============================================================================

#[tokio::test]
async fn test_missing_header_is_a_parse_error() {
    let mut h = Harness::new(ScriptedTracker::new()).await;
    let path = h.input("lote.csv", "tipo,descricao\nTarefa,algo\n");

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    let err = h.workflow.process_file().await.unwrap_err();

    match err {
        ImportError::Parse(errors) => {
            assert_eq!(errors, vec!["Headers obrigatórios ausentes: titulo".to_string()])
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(h.workflow.state(), ImportState::Error);

    let entry = &h.workflow.history().entries()[0];
    assert_eq!(entry.status, HistoryStatus::ParseError);
    assert_eq!(entry.success_count, 0);
    assert!(!h.store.has_session().await);
}

#[tokio::test]
async fn test_all_invalid_rows_end_in_validation_error() {
    let mut h = Harness::new(ScriptedTracker::new()).await;
    let path = h.input("lote.csv", "tipo,titulo\nEpic,A\nTarefa,\n");

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    let err = h.workflow.process_file().await.unwrap_err();

    assert!(matches!(err, ImportError::NoValidRecords { errors: 2 }));
    assert_eq!(h.workflow.state(), ImportState::Error);

    let entry = &h.workflow.history().entries()[0];
    assert_eq!(entry.status, HistoryStatus::ValidationError);
    assert_eq!(entry.error_count, 2);
    assert!(h.tracker.calls().is_empty());
}

#[tokio::test]
async fn test_disallowed_extension_is_rejected() {
    let mut h = Harness::new(ScriptedTracker::new()).await;
    let path = h.input("planilha.xlsx", &tarefa_rows(1));

    let err = h.workflow.select_file(&path, ImportMode::Create).await.unwrap_err();
    assert!(matches!(err, ImportError::FileSelection(ref m) if m.contains("xlsx")));
    assert_eq!(h.workflow.state(), ImportState::Error);
    assert!(h.workflow.session().is_none());
    assert!(h.workflow.history().is_empty());

    // A new file may be picked from Error
    let path = h.input("lote.CSV", &tarefa_rows(1));
    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    assert_eq!(h.workflow.state(), ImportState::FileSelected);
}

#[tokio::test]
async fn test_oversized_file_is_rejected() {
    let mut config = test_config();
    config.max_file_bytes = 16;
    let mut h = Harness::with_config(config, ScriptedTracker::new()).await;
    let path = h.input("lote.csv", &tarefa_rows(4));

    let err = h.workflow.select_file(&path, ImportMode::Create).await.unwrap_err();
    assert!(matches!(err, ImportError::FileSelection(ref m) if m.contains("excede")));
    assert_eq!(h.workflow.state(), ImportState::Error);
}

#[tokio::test]
async fn test_missing_file_is_rejected() {
    let mut h = Harness::new(ScriptedTracker::new()).await;
    let path = h.dir.path().join("sumiu.csv");

    let err = h.workflow.select_file(&path, ImportMode::Create).await.unwrap_err();
    assert!(matches!(err, ImportError::FileSelection(_)));
    assert!(h.workflow.last_error().is_some());
}

// ============================================================================
// Transitions, reset, cancellation
// ============================================================================

#[tokio::test]
async fn test_operations_out_of_order_are_refused() {
    let mut h = Harness::new(ScriptedTracker::new()).await;

    let err = h.workflow.execute_import(&credentials()).await.unwrap_err();
    assert!(matches!(
        err,
        ImportError::InvalidTransition {
            from: ImportState::Idle,
            operation: "execute_import"
        }
    ));
    assert!(matches!(
        h.workflow.process_file().await.unwrap_err(),
        ImportError::InvalidTransition { .. }
    ));
    assert_eq!(h.workflow.state(), ImportState::Idle);
}

#[tokio::test]
async fn test_reset_from_preview_clears_everything() {
    let mut h = Harness::new(ScriptedTracker::new()).await;
    let path = h.input("lote.csv", &tarefa_rows(2));

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    h.workflow.process_file().await.unwrap();
    assert!(h.store.has_session().await);

    h.workflow.reset_import().await.unwrap();
    assert_eq!(h.workflow.state(), ImportState::Idle);
    assert!(h.workflow.session().is_none());
    assert!(!h.store.has_session().await);
    assert!(h.workflow.history().is_empty());
}

#[tokio::test]
async fn test_cancellation_discards_the_run() {
    let tracker = ScriptedTracker::new().with_call_delay(Duration::from_millis(200));
    let mut h = Harness::new(tracker).await;
    let path = h.input("lote.csv", &tarefa_rows(5));

    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    h.workflow.process_file().await.unwrap();

    let cancel = h.workflow.cancel_handle();
    let mut rx = h.events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if event.event_type() == "RecordCreated" {
                cancel.cancel();
                break;
            }
        }
    });

    let err = h.workflow.execute_import(&credentials()).await.unwrap_err();
    assert!(matches!(err, ImportError::Cancelled));
    assert_eq!(h.workflow.state(), ImportState::Idle);
    assert!(h.workflow.session().is_none());
    assert!(!h.store.has_session().await);
    assert!(h.workflow.history().is_empty());
    assert!(h.tracker.calls().len() < 5);

    // The workflow is usable again with a fresh token
    let path = h.input("outro.csv", &tarefa_rows(1));
    h.workflow.select_file(&path, ImportMode::Create).await.unwrap();
    assert!(!h.workflow.cancel_handle().is_cancelled());
}
