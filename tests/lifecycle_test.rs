use async_trait::async_trait;
use bigdecimal::BigDecimal;
use payops_core::adapters::InMemoryStore;
use payops_core::domain::audit::{AuditAction, AuditDraft};
use payops_core::domain::catalog::{NewBettingSite, NewDepositBank, NewWithdrawalBank};
use payops_core::domain::events::{Audience, EventKind, NotificationEvent};
use payops_core::domain::player::{NewPlayer, PlayerIdentity, PlayerProfile};
use payops_core::domain::transaction::{Routing, SiteContext, TransactionRecord, TransactionType};
use payops_core::domain::user::NewUser;
use payops_core::domain::{PageRequest, RequestContext, Role, TransactionFilter, TxStatus};
use payops_core::error::AppError;
use payops_core::ports::{
    CatalogStore, MessageDetails, MessagePhase, Messenger, Notifier, NotifyError, PlayerStore,
    RepositoryError, Stores, TransactionStore, UploadFile, UserStore,
};
use payops_core::services::{Fanout, LocalUploader, TransactionLifecycle};
use payops_core::validation::transaction::{
    AddComment, CreateTransaction, OverrideStatus, PlayerRef, ProcessTransaction,
};
use chrono::{Duration, Utc};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Default)]
struct RecordingMessenger {
    fail: bool,
    calls: Mutex<Vec<(String, MessagePhase)>>,
}

#[async_trait]
impl Messenger for RecordingMessenger {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send_transaction_notification(
        &self,
        recipient_channel_id: &str,
        _transaction_uuid: Uuid,
        phase: MessagePhase,
        _details: &MessageDetails,
    ) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push((recipient_channel_id.to_string(), phase));
        !self.fail
    }
}

#[derive(Default)]
struct RecordingNotifier {
    fail: bool,
    events: Mutex<Vec<(Audience, EventKind)>>,
}

impl Notifier for RecordingNotifier {
    fn publish(&self, audience: Audience, event: NotificationEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push((audience, event.kind));
        if self.fail {
            Err(NotifyError::Unavailable("hub is down".into()))
        } else {
            Ok(())
        }
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    lifecycle: TransactionLifecycle,
    messenger: Arc<RecordingMessenger>,
    notifier: Arc<RecordingNotifier>,
    admin: RequestContext,
    agent_a: RequestContext,
    agent_b: RequestContext,
    player_user: RequestContext,
    player: PlayerProfile,
    deposit_bank_id: i64,
    withdrawal_bank_id: i64,
    uploads: TempDir,
}

fn seed_audit() -> AuditDraft {
    AuditDraft::new(AuditAction::Created, None, None)
}

async fn user(store: &InMemoryStore, username: &str, role: Role) -> RequestContext {
    let user = store
        .insert_user(NewUser {
            username: username.into(),
            email: None,
            password_hash: "unused".into(),
            role,
            display_name: Some(username.to_uppercase()),
            phone: None,
        })
        .await
        .unwrap();
    RequestContext::for_actor(user.actor(), Some("10.0.0.1".into()))
}

async fn harness_with(messenger: RecordingMessenger, notifier: RecordingNotifier) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let uploads = tempfile::tempdir().unwrap();
    let messenger = Arc::new(messenger);
    let notifier = Arc::new(notifier);

    let fanout = Fanout::new(notifier.clone(), messenger.clone());
    let uploader = Arc::new(LocalUploader::new(uploads.path(), "http://files.test", 1024));
    let lifecycle =
        TransactionLifecycle::new(&Stores::from_backend(store.clone()), uploader, fanout);

    let admin = user(&store, "admin", Role::Admin).await;
    let agent_a = user(&store, "agent_a", Role::Agent).await;
    let agent_b = user(&store, "agent_b", Role::Agent).await;
    let player_user = user(&store, "player", Role::Player).await;

    let player = store
        .insert_player(NewPlayer {
            player_uuid: Uuid::new_v4(),
            user_id: player_user.user_id(),
            identity: PlayerIdentity::Known("5550001".into()),
            telegram_username: Some("bettor".into()),
            language_code: "en".into(),
        })
        .await
        .unwrap();

    let deposit_bank_id = store
        .save_deposit_bank(
            None,
            NewDepositBank {
                bank_name: "CBE".into(),
                account_number: "1000123456789".into(),
                account_name: "PayOps Ltd".into(),
                notes: None,
                is_active: true,
            },
            seed_audit(),
        )
        .await
        .unwrap()
        .id;
    let withdrawal_bank_id = store
        .save_withdrawal_bank(
            None,
            NewWithdrawalBank {
                bank_name: "Awash".into(),
                required_fields: serde_json::json!(["accountNumber"]),
                notes: None,
                is_active: true,
            },
            seed_audit(),
        )
        .await
        .unwrap()
        .id;

    Harness {
        store,
        lifecycle,
        messenger,
        notifier,
        admin,
        agent_a,
        agent_b,
        player_user,
        player,
        deposit_bank_id,
        withdrawal_bank_id,
        uploads,
    }
}

async fn harness() -> Harness {
    harness_with(RecordingMessenger::default(), RecordingNotifier::default()).await
}

impl Harness {
    fn deposit(&self, amount: &str) -> CreateTransaction {
        CreateTransaction {
            player: PlayerRef::Uuid(self.player.player_uuid),
            routing: Routing::Deposit {
                deposit_bank_id: self.deposit_bank_id,
            },
            amount: BigDecimal::from_str(amount).unwrap(),
            currency: "USD".into(),
            site: None,
        }
    }

    async fn create(&self) -> TransactionRecord {
        self.lifecycle
            .create(self.deposit("100.00"), None, &self.player_user)
            .await
            .unwrap()
    }

    async fn assigned_to_a(&self) -> TransactionRecord {
        let record = self.create().await;
        let agent_id = self.agent_a.user_id().unwrap();
        self.lifecycle
            .assign(record.transaction.id, agent_id, &self.admin)
            .await
            .unwrap()
    }

    async fn audit_count(&self) -> usize {
        self.store.audit_entries().await.len()
    }

    fn phases(&self) -> Vec<MessagePhase> {
        self.messenger
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, phase)| *phase)
            .collect()
    }
}

fn process(status: TxStatus) -> ProcessTransaction {
    ProcessTransaction {
        status,
        agent_notes: Some("paid out".into()),
        evidence_url: Some("http://files.test/uploads/slip.png".into()),
    }
}

fn override_to(status: TxStatus) -> OverrideStatus {
    OverrideStatus {
        status,
        admin_notes: Some("checked with bank".into()),
    }
}

#[tokio::test]
async fn deposit_starts_pending_and_messages_player() {
    let h = harness().await;
    let record = h.create().await;

    assert_eq!(record.transaction.status, TxStatus::Pending);
    assert_eq!(record.player.player_uuid, h.player.player_uuid);
    assert_eq!(h.phases(), vec![MessagePhase::Created]);

    let events = h.notifier.events.lock().unwrap().clone();
    assert_eq!(events, vec![(Audience::Admins, EventKind::TransactionCreated)]);

    let audit = h.store.audit_entries().await;
    let last = audit.last().unwrap();
    assert_eq!(last.action, "CREATED");
    assert_eq!(last.entity_id, record.transaction.id);
}

#[tokio::test]
async fn creation_rejects_unknown_or_inactive_banks() {
    let h = harness().await;
    let mut input = h.deposit("10");
    input.routing = Routing::Deposit { deposit_bank_id: 999 };
    let err = h
        .lifecycle
        .create(input, None, &RequestContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref what) if what == "Deposit bank"));

    let inactive = h
        .store
        .save_withdrawal_bank(
            None,
            NewWithdrawalBank {
                bank_name: "Closed".into(),
                required_fields: serde_json::json!([]),
                notes: None,
                is_active: false,
            },
            seed_audit(),
        )
        .await
        .unwrap();
    let mut input = h.deposit("10");
    input.routing = Routing::Withdraw {
        withdrawal_bank_id: inactive.id,
        withdrawal_address: "acct-1".into(),
    };
    let err = h
        .lifecycle
        .create(input, None, &RequestContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn unknown_player_uuid_is_not_found() {
    let h = harness().await;
    let mut input = h.deposit("10");
    input.player = PlayerRef::Uuid(Uuid::new_v4());
    let err = h
        .lifecycle
        .create(input, None, &RequestContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn anonymous_request_gets_placeholder_and_no_message() {
    let h = harness().await;
    let mut input = h.deposit("25.50");
    input.player = PlayerRef::Unidentified;
    input.routing = Routing::Withdraw {
        withdrawal_bank_id: h.withdrawal_bank_id,
        withdrawal_address: "0912345678".into(),
    };

    let record = h
        .lifecycle
        .create(input, None, &RequestContext::default())
        .await
        .unwrap();
    assert!(record.player.identity.is_placeholder());
    assert!(h.phases().is_empty());
}

#[tokio::test]
async fn screenshot_is_stored_with_the_request() {
    let h = harness().await;
    let screenshot = UploadFile {
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
        mime_type: "image/png".into(),
        original_name: "slip.png".into(),
    };
    let record = h
        .lifecycle
        .create(h.deposit("10"), Some(screenshot), &h.player_user)
        .await
        .unwrap();

    let url = record.transaction.screenshot_url.unwrap();
    assert!(url.starts_with("http://files.test/uploads/"));
    assert_eq!(std::fs::read_dir(h.uploads.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn rejected_screenshot_creates_nothing() {
    let h = harness().await;
    let screenshot = UploadFile {
        bytes: b"%PDF-1.4".to_vec(),
        mime_type: "application/pdf".into(),
        original_name: "slip.pdf".into(),
    };
    let err = h
        .lifecycle
        .create(h.deposit("10"), Some(screenshot), &h.player_user)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let all = h
        .lifecycle
        .list(TransactionFilter::default(), PageRequest::default(), &h.admin)
        .await
        .unwrap();
    assert_eq!(all.pagination.total, 0);
}

#[tokio::test]
async fn missing_status_vocabulary_is_an_internal_error() {
    let h = harness().await;
    h.store.remove_status(TxStatus::Pending).await;
    let err = h
        .lifecycle
        .create(h.deposit("10"), None, &h.player_user)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
}

#[tokio::test]
async fn assigning_a_non_agent_is_rejected_without_change() {
    let h = harness().await;
    let record = h.create().await;
    let before = h.audit_count().await;

    let err = h
        .lifecycle
        .assign(
            record.transaction.id,
            h.player_user.user_id().unwrap(),
            &h.admin,
        )
        .await
        .unwrap_err();
    match err {
        AppError::Validation(fields) => {
            assert_eq!(fields[0].field, "agentId");
            assert_eq!(fields[0].message, "Invalid agent");
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let after = h.lifecycle.details(record.transaction.id, &h.admin).await.unwrap();
    assert_eq!(after.record.transaction.assigned_agent_id, None);
    assert_eq!(h.audit_count().await, before);

    let err = h
        .lifecycle
        .assign(record.transaction.id, 9999, &h.admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref what) if what == "Agent"));
}

#[tokio::test]
async fn only_admins_assign() {
    let h = harness().await;
    let record = h.create().await;
    let err = h
        .lifecycle
        .assign(record.transaction.id, h.agent_a.user_id().unwrap(), &h.agent_a)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn other_agent_cannot_process() {
    let h = harness().await;
    let record = h.assigned_to_a().await;
    let id = record.transaction.id;
    let before = h.audit_count().await;

    let err = h
        .lifecycle
        .process(id, process(TxStatus::Success), &h.agent_b)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let details = h.lifecycle.details(id, &h.admin).await.unwrap();
    assert_eq!(details.record.transaction.status, TxStatus::Pending);
    assert_eq!(details.record.transaction.agent_notes, None);
    assert!(details.evidence.is_empty());
    assert_eq!(h.audit_count().await, before);
}

#[tokio::test]
async fn assigned_agent_processes_with_evidence() {
    let h = harness().await;
    let record = h.assigned_to_a().await;
    let id = record.transaction.id;

    let processed = h
        .lifecycle
        .process(id, process(TxStatus::Success), &h.agent_a)
        .await
        .unwrap();
    assert_eq!(processed.transaction.status, TxStatus::Success);
    assert_eq!(processed.transaction.agent_notes.as_deref(), Some("paid out"));

    let details = h.lifecycle.details(id, &h.agent_a).await.unwrap();
    assert_eq!(details.evidence.len(), 1);
    assert_eq!(details.evidence[0].file_type, "image");
    assert_eq!(h.phases(), vec![MessagePhase::Created, MessagePhase::Processed]);

    // Terminal now: neither lane may move it.
    let err = h
        .lifecycle
        .process(id, process(TxStatus::Failed), &h.agent_a)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    let err = h
        .lifecycle
        .override_status(id, override_to(TxStatus::Pending), &h.admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
}

#[tokio::test]
async fn agent_lane_only_closes_transactions() {
    let h = harness().await;
    let record = h.assigned_to_a().await;
    for status in [TxStatus::Pending, TxStatus::InProgress] {
        let err = h
            .lifecycle
            .process(record.transaction.id, process(status), &h.agent_a)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)), "{status}");
    }
    let stored = h.lifecycle.details(record.transaction.id, &h.admin).await.unwrap();
    assert_eq!(stored.record.transaction.status, TxStatus::Pending);
}

#[tokio::test]
async fn reassigning_the_same_agent_is_audited_once() {
    let h = harness().await;
    let record = h.assigned_to_a().await;
    let id = record.transaction.id;
    let agent_id = h.agent_a.user_id().unwrap();
    let before = h.audit_count().await;

    let reassigned = h.lifecycle.assign(id, agent_id, &h.admin).await.unwrap();
    assert_eq!(reassigned.transaction.assigned_agent_id, Some(agent_id));
    assert_eq!(h.audit_count().await, before + 1);

    let trail = h.lifecycle.audit_trail(id, &h.admin).await.unwrap();
    let last = trail.last().unwrap();
    assert_eq!(last.action, "ASSIGNED");
    assert_eq!(
        last.old_value.as_ref().unwrap()["assignedAgentId"],
        last.new_value.as_ref().unwrap()["assignedAgentId"]
    );
    assert_eq!(last.new_value.as_ref().unwrap()["assignedAgentId"], agent_id);
}

#[tokio::test]
async fn assignment_is_refused_once_status_has_moved() {
    let h = harness().await;
    let record = h.assigned_to_a().await;
    let id = record.transaction.id;
    h.lifecycle
        .process(id, process(TxStatus::Success), &h.agent_a)
        .await
        .unwrap();
    let before = h.audit_count().await;

    // A write that read the transaction while it was still pending.
    let err = h
        .store
        .assign(id, h.agent_b.user_id().unwrap(), TxStatus::Pending, seed_audit())
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Stale(_)));
    assert_eq!(h.audit_count().await, before);

    let stored = h.lifecycle.details(id, &h.admin).await.unwrap();
    assert_eq!(stored.record.transaction.assigned_agent_id, h.agent_a.user_id());
}

#[tokio::test]
async fn omitted_agent_notes_are_audited_as_kept() {
    let h = harness().await;
    let record = h.assigned_to_a().await;
    let id = record.transaction.id;

    h.lifecycle
        .process(id, process(TxStatus::Failed), &h.agent_a)
        .await
        .unwrap();
    h.lifecycle
        .reopen(id, override_to(TxStatus::InProgress), &h.admin)
        .await
        .unwrap();
    let processed = h
        .lifecycle
        .process(
            id,
            ProcessTransaction {
                status: TxStatus::Success,
                agent_notes: None,
                evidence_url: None,
            },
            &h.agent_a,
        )
        .await
        .unwrap();
    assert_eq!(processed.transaction.agent_notes.as_deref(), Some("paid out"));

    let trail = h.lifecycle.audit_trail(id, &h.admin).await.unwrap();
    let last = trail.last().unwrap();
    assert_eq!(last.action, "PROCESSED");
    assert_eq!(last.old_value.as_ref().unwrap()["agentNotes"], "paid out");
    assert_eq!(last.new_value.as_ref().unwrap()["agentNotes"], "paid out");

    let reopen = trail.iter().find(|e| e.action == "REOPENED").unwrap();
    assert_eq!(reopen.new_value.as_ref().unwrap()["adminNotes"], "checked with bank");
}

#[tokio::test]
async fn mutations_write_exactly_one_audit_row_each() {
    let h = harness().await;
    let record = h.create().await;
    let id = record.transaction.id;

    let before = h.audit_count().await;
    h.lifecycle
        .assign(id, h.agent_a.user_id().unwrap(), &h.admin)
        .await
        .unwrap();
    assert_eq!(h.audit_count().await, before + 1);

    h.lifecycle
        .override_status(id, override_to(TxStatus::InProgress), &h.admin)
        .await
        .unwrap();
    assert_eq!(h.audit_count().await, before + 2);

    h.lifecycle
        .process(id, process(TxStatus::Failed), &h.agent_a)
        .await
        .unwrap();
    assert_eq!(h.audit_count().await, before + 3);

    let trail = h.lifecycle.audit_trail(id, &h.admin).await.unwrap();
    let actions: Vec<&str> = trail.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["CREATED", "ASSIGNED", "STATUS_UPDATED", "PROCESSED"]);

    let overridden = &trail[2];
    assert_eq!(overridden.old_value.as_ref().unwrap()["status"], "PENDING");
    assert_eq!(overridden.new_value.as_ref().unwrap()["status"], "IN_PROGRESS");
    assert_eq!(overridden.actor_user_id, h.admin.user_id());

    let processed = &trail[3];
    assert_eq!(processed.old_value.as_ref().unwrap()["status"], "IN_PROGRESS");
    assert_eq!(processed.new_value.as_ref().unwrap()["status"], "FAILED");
    assert_eq!(processed.actor_user_id, h.agent_a.user_id());
    assert_eq!(processed.ip_address.as_deref(), Some("10.0.0.1"));

    h.lifecycle.delete(id, &h.admin).await.unwrap();
    assert_eq!(h.audit_count().await, before + 4);
}

#[tokio::test]
async fn side_effect_failures_do_not_undo_processing() {
    let h = harness_with(
        RecordingMessenger {
            fail: true,
            ..RecordingMessenger::default()
        },
        RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        },
    )
    .await;
    let record = h.assigned_to_a().await;
    let id = record.transaction.id;
    let before = h.audit_count().await;

    let processed = h
        .lifecycle
        .process(id, process(TxStatus::Success), &h.agent_a)
        .await
        .unwrap();
    assert_eq!(processed.transaction.status, TxStatus::Success);

    let details = h.lifecycle.details(id, &h.admin).await.unwrap();
    assert_eq!(details.record.transaction.status, TxStatus::Success);
    assert_eq!(details.record.transaction.agent_notes.as_deref(), Some("paid out"));
    assert_eq!(h.audit_count().await, before + 1);
    assert!(h.phases().contains(&MessagePhase::Processed));
}

#[tokio::test]
async fn admin_override_to_success_messages_once_as_processed() {
    let h = harness_with(
        RecordingMessenger {
            fail: true,
            ..RecordingMessenger::default()
        },
        RecordingNotifier::default(),
    )
    .await;
    let record = h.assigned_to_a().await;
    h.messenger.calls.lock().unwrap().clear();

    let updated = h
        .lifecycle
        .override_status(record.transaction.id, override_to(TxStatus::Success), &h.admin)
        .await
        .unwrap();
    assert_eq!(updated.transaction.status, TxStatus::Success);
    assert_eq!(updated.transaction.status.label(), "Success");

    let calls = h.messenger.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![("5550001".to_string(), MessagePhase::Processed)]);

    let events = h.notifier.events.lock().unwrap().clone();
    let agent_id = h.agent_a.user_id().unwrap();
    assert!(events.contains(&(Audience::Agent(agent_id), EventKind::TransactionUpdated)));
    assert!(events.contains(&(Audience::Admins, EventKind::TransactionUpdated)));
}

#[tokio::test]
async fn override_to_in_progress_does_not_message() {
    let h = harness().await;
    let record = h.create().await;
    h.messenger.calls.lock().unwrap().clear();

    h.lifecycle
        .override_status(record.transaction.id, override_to(TxStatus::InProgress), &h.admin)
        .await
        .unwrap();
    assert!(h.phases().is_empty());
}

#[tokio::test]
async fn reopen_is_the_only_way_out_of_terminal() {
    let h = harness().await;
    let record = h.assigned_to_a().await;
    let id = record.transaction.id;
    h.lifecycle
        .override_status(id, override_to(TxStatus::Failed), &h.admin)
        .await
        .unwrap();

    let err = h
        .lifecycle
        .reopen(id, override_to(TxStatus::Success), &h.admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    let reopened = h
        .lifecycle
        .reopen(id, override_to(TxStatus::InProgress), &h.admin)
        .await
        .unwrap();
    assert_eq!(reopened.transaction.status, TxStatus::InProgress);
    assert_eq!(h.phases().last(), Some(&MessagePhase::Updated));

    let trail = h.lifecycle.audit_trail(id, &h.admin).await.unwrap();
    assert_eq!(trail.last().unwrap().action, "REOPENED");

    // The agent can finish it again.
    h.lifecycle
        .process(id, process(TxStatus::Success), &h.agent_a)
        .await
        .unwrap();
}

#[tokio::test]
async fn reopen_requires_terminal_source_and_admin() {
    let h = harness().await;
    let record = h.create().await;
    let err = h
        .lifecycle
        .reopen(record.transaction.id, override_to(TxStatus::InProgress), &h.admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    let err = h
        .lifecycle
        .reopen(record.transaction.id, override_to(TxStatus::InProgress), &h.agent_a)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn concurrent_status_writes_never_both_succeed() {
    let h = harness().await;
    let record = h.create().await;
    let id = record.transaction.id;

    let (first, second) = tokio::join!(
        h.lifecycle.override_status(id, override_to(TxStatus::Success), &h.admin),
        h.lifecycle.override_status(id, override_to(TxStatus::Failed), &h.admin),
    );

    let results = [first, second];
    let winners: Vec<&TransactionRecord> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for loser in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(
            loser,
            AppError::Conflict(_) | AppError::InvalidTransition(_)
        ));
    }

    let stored = h.lifecycle.details(id, &h.admin).await.unwrap();
    assert_eq!(stored.record.transaction.status, winners[0].transaction.status);
}

#[tokio::test]
async fn delete_purges_children_and_snapshots_everything() {
    let h = harness().await;
    let record = h.assigned_to_a().await;
    let id = record.transaction.id;

    h.lifecycle
        .process(id, process(TxStatus::Failed), &h.agent_a)
        .await
        .unwrap();
    h.lifecycle
        .reopen(id, override_to(TxStatus::InProgress), &h.admin)
        .await
        .unwrap();
    h.lifecycle
        .process(id, process(TxStatus::Success), &h.agent_a)
        .await
        .unwrap();
    h.lifecycle
        .add_comment(
            record.transaction.transaction_uuid,
            AddComment {
                comment: "Received, thanks".into(),
                rating: Some(5),
            },
            &h.player_user,
        )
        .await
        .unwrap();

    let details = h.lifecycle.details(id, &h.admin).await.unwrap();
    assert_eq!(details.evidence.len(), 2);
    assert_eq!(details.comments.len(), 1);

    h.lifecycle.delete(id, &h.admin).await.unwrap();

    let err = h.lifecycle.details(id, &h.admin).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let trail = h.lifecycle.audit_trail(id, &h.admin).await.unwrap();
    let deleted = trail.last().unwrap();
    assert_eq!(deleted.action, "DELETED");
    let snapshot = deleted.old_value.as_ref().unwrap();
    assert_eq!(snapshot["evidence"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot["comments"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["transaction"]["id"], id);

    let events = h.notifier.events.lock().unwrap().clone();
    assert_eq!(
        events.last(),
        Some(&(Audience::Everyone, EventKind::TransactionDeleted))
    );
}

#[tokio::test]
async fn rating_needs_finished_transaction_and_is_set_once() {
    let h = harness().await;
    let record = h.assigned_to_a().await;
    let uuid = record.transaction.transaction_uuid;
    let rated = |rating| AddComment {
        comment: "ok".into(),
        rating,
    };

    let err = h
        .lifecycle
        .add_comment(uuid, rated(Some(4)), &h.player_user)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Plain comments are allowed while open.
    h.lifecycle
        .add_comment(uuid, rated(None), &h.agent_a)
        .await
        .unwrap();

    h.lifecycle
        .process(record.transaction.id, process(TxStatus::Success), &h.agent_a)
        .await
        .unwrap();
    h.lifecycle
        .add_comment(uuid, rated(Some(4)), &h.player_user)
        .await
        .unwrap();
    let err = h
        .lifecycle
        .add_comment(uuid, rated(Some(2)), &h.player_user)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Agent B is neither owner nor assignee.
    let err = h
        .lifecycle
        .add_comment(uuid, rated(None), &h.agent_b)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn public_lookup_needs_matching_player_uuid() {
    let h = harness().await;
    let record = h.create().await;
    let uuid = record.transaction.transaction_uuid;
    let anonymous = RequestContext::default();

    let found = h
        .lifecycle
        .get_by_uuid(uuid, Some(h.player.player_uuid), &anonymous)
        .await
        .unwrap();
    assert_eq!(found.transaction.id, record.transaction.id);

    let err = h
        .lifecycle
        .get_by_uuid(uuid, Some(Uuid::new_v4()), &anonymous)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = h
        .lifecycle
        .get_by_uuid(uuid, None, &anonymous)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = h
        .lifecycle
        .get_by_uuid(Uuid::new_v4(), Some(h.player.player_uuid), &anonymous)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn pages_past_the_end_are_empty() {
    let h = harness().await;
    for _ in 0..5 {
        h.create().await;
    }

    let page = h
        .lifecycle
        .list(
            TransactionFilter::default(),
            PageRequest::new(1, 2).unwrap(),
            &h.admin,
        )
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.pagination.total, 5);
    assert_eq!(page.pagination.pages, 3);

    let beyond = h
        .lifecycle
        .list(
            TransactionFilter::default(),
            PageRequest::new(4, 2).unwrap(),
            &h.admin,
        )
        .await
        .unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.pagination.total, 5);
}

#[tokio::test]
async fn agent_tasks_only_show_own_queue() {
    let h = harness().await;
    h.assigned_to_a().await;
    h.create().await;

    let filter = TransactionFilter {
        assigned_agent_id: h.agent_b.user_id(),
        ..TransactionFilter::default()
    };
    let tasks = h
        .lifecycle
        .agent_tasks(filter, PageRequest::default(), &h.agent_a)
        .await
        .unwrap();
    assert_eq!(tasks.items.len(), 1);
    assert_eq!(tasks.items[0].transaction.assigned_agent_id, h.agent_a.user_id());

    let err = h
        .lifecycle
        .agent_tasks(TransactionFilter::default(), PageRequest::default(), &h.admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn list_filters_combine_with_and() {
    let h = harness().await;
    let started = Utc::now() - Duration::minutes(1);
    let site_id = h
        .store
        .save_betting_site(
            None,
            NewBettingSite {
                name: "Kickoff".into(),
                description: None,
                website: None,
                is_active: true,
            },
            seed_audit(),
        )
        .await
        .unwrap()
        .id;
    let site = || {
        Some(SiteContext {
            betting_site_id: site_id,
            player_site_id: "kick-77".into(),
        })
    };
    let withdrawal = |amount: &str| {
        let mut input = h.deposit(amount);
        input.routing = Routing::Withdraw {
            withdrawal_bank_id: h.withdrawal_bank_id,
            withdrawal_address: "0912345678".into(),
        };
        input
    };

    let mut seeded = vec![h.deposit("50.00"), h.deposit("150.00"), withdrawal("300.00"), withdrawal("75.00")];
    seeded[1].site = site();
    seeded[2].site = site();
    for input in seeded {
        h.lifecycle.create(input, None, &h.player_user).await.unwrap();
    }

    let amount = |raw: &str| Some(BigDecimal::from_str(raw).unwrap());
    let cases = [
        ("everything", TransactionFilter::default(), 4),
        (
            "deposits",
            TransactionFilter {
                tx_type: Some(TransactionType::Deposit),
                ..TransactionFilter::default()
            },
            2,
        ),
        (
            "at least 100",
            TransactionFilter {
                min_amount: amount("100"),
                ..TransactionFilter::default()
            },
            2,
        ),
        (
            "at most 75",
            TransactionFilter {
                max_amount: amount("75.00"),
                ..TransactionFilter::default()
            },
            2,
        ),
        (
            "between 60 and 200",
            TransactionFilter {
                min_amount: amount("60"),
                max_amount: amount("200"),
                ..TransactionFilter::default()
            },
            2,
        ),
        (
            "site",
            TransactionFilter {
                betting_site_id: Some(site_id),
                ..TransactionFilter::default()
            },
            2,
        ),
        (
            "created since start",
            TransactionFilter {
                created_from: Some(started),
                created_to: Some(Utc::now() + Duration::minutes(1)),
                ..TransactionFilter::default()
            },
            4,
        ),
        (
            "created before start",
            TransactionFilter {
                created_to: Some(started),
                ..TransactionFilter::default()
            },
            0,
        ),
        (
            "withdrawals on the site over 100",
            TransactionFilter {
                tx_type: Some(TransactionType::Withdraw),
                betting_site_id: Some(site_id),
                min_amount: amount("100"),
                ..TransactionFilter::default()
            },
            1,
        ),
        (
            "withdrawals under 100 on the site",
            TransactionFilter {
                tx_type: Some(TransactionType::Withdraw),
                betting_site_id: Some(site_id),
                max_amount: amount("100"),
                ..TransactionFilter::default()
            },
            0,
        ),
    ];

    for (name, filter, expected) in cases {
        let page = h
            .lifecycle
            .list(filter.clone(), PageRequest::default(), &h.admin)
            .await
            .unwrap();
        assert_eq!(page.pagination.total, expected, "{name}");
        assert_eq!(page.items.len() as i64, expected, "{name}");
        assert!(page.items.iter().all(|r| filter.matches(r)), "{name}");
    }

    let deposits = TransactionFilter {
        tx_type: Some(TransactionType::Deposit),
        ..TransactionFilter::default()
    };
    let first = h
        .lifecycle
        .list(deposits, PageRequest::new(1, 1).unwrap(), &h.admin)
        .await
        .unwrap();
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.pagination.total, 2);
    assert_eq!(first.pagination.pages, 2);
}
