//! End-to-end transfer flows: draft and deployed projects, status
//! derivation up to the invite, and the one-row-per-status invariant.

mod common;

use common::{Harness, ALICE, BOB};
use ownership_core::domain::{InviteStatus, StatusType, TransferState};
use ownership_core::error::AppError;
use ownership_core::port::TransferRepository;
use ownership_infra_sqlite::userform_id;

#[tokio::test]
async fn test_draft_transfer_completes_synchronously() {
    let h = Harness::new().await;
    h.seed_asset("draft1", ALICE, false).await;

    let details = h.create_and_accept(&["draft1"]).await;
    let transfer = &details.transfers[0];

    for status_type in StatusType::ALL {
        assert_eq!(
            h.state(transfer.id, status_type).await,
            TransferState::Success,
            "{status_type} should be settled"
        );
    }
    assert_eq!(h.asset_owner("draft1").await, BOB);
    assert_eq!(details.invite.status, InviteStatus::Complete);

    // Nothing was handed to the worker
    assert_eq!(h.pending_tasks().await, 0);
    assert_eq!(h.drain().await, 0);
}

#[tokio::test]
async fn test_deployed_transfer_end_to_end() {
    let h = Harness::new().await;
    h.seed_asset("svy1", ALICE, true).await;
    let submissions = h.seed_submissions("svy1", ALICE, 3).await;
    let photo = h
        .seed_attachment("svy1", submissions[0], "alice/attachments/svy1/1/photo.jpg", "jpeg")
        .await;
    let audio = h
        .seed_attachment("svy1", submissions[2], "alice/attachments/svy1/3/audio.m4a", "m4a")
        .await;
    let logo = h.seed_media("svy1", "alice/form-media/svy1/logo.png", "png").await;

    let details = h.create_and_accept(&["svy1"]).await;
    let transfer_id = details.transfers[0].id;

    // Ownership moved synchronously, data follows asynchronously
    assert_eq!(h.asset_owner("svy1").await, BOB);
    assert_eq!(details.invite.status, InviteStatus::InProgress);
    assert_eq!(h.state(transfer_id, StatusType::Global).await, TransferState::InProgress);
    assert_eq!(h.state(transfer_id, StatusType::Submissions).await, TransferState::InProgress);
    assert_eq!(h.state(transfer_id, StatusType::MediaFiles).await, TransferState::InProgress);
    assert_eq!(h.state(transfer_id, StatusType::Attachments).await, TransferState::Pending);
    assert_eq!(h.pending_tasks().await, 2);

    let suspended: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM submission_suspensions WHERE asset_uid = 'svy1'")
            .fetch_one(&h.pool)
            .await
            .unwrap();
    assert_eq!(suspended, 0, "submissions must be resumed after the reassignment");

    // submissions + media_files, then the chained attachments task
    assert_eq!(h.drain().await, 3);

    for status_type in StatusType::ALL {
        assert_eq!(h.state(transfer_id, status_type).await, TransferState::Success);
    }
    assert_eq!(
        h.invite(&details.invite.uid).await.status,
        InviteStatus::Complete
    );

    let tag = userform_id(BOB, "svy1");
    assert!(h.userform_ids("svy1").await.iter().all(|t| *t == tag));

    assert_eq!(h.file_path(photo).await, "bob/attachments/svy1/1/photo.jpg");
    assert_eq!(h.file_path(audio).await, "bob/attachments/svy1/3/audio.m4a");
    assert_eq!(h.file_path(logo).await, "bob/form-media/svy1/logo.png");
    assert_eq!(h.read_file("bob/attachments/svy1/1/photo.jpg").await.as_deref(), Some("jpeg"));
    assert_eq!(h.read_file("bob/form-media/svy1/logo.png").await.as_deref(), Some("png"));
    assert!(h.read_file("alice/attachments/svy1/1/photo.jpg").await.is_none());

    let counters: Vec<(String, i64)> = sqlx::query_as(
        "SELECT username, counter FROM submission_counters WHERE asset_uid = 'svy1'",
    )
    .fetch_all(&h.pool)
    .await
    .unwrap();
    assert_eq!(counters, vec![(BOB.to_string(), 3)]);
}

#[tokio::test]
async fn test_each_transfer_keeps_one_row_per_status_type() {
    let h = Harness::new().await;
    h.seed_asset("svy1", ALICE, true).await;
    h.seed_asset("draft1", ALICE, false).await;
    h.seed_submissions("svy1", ALICE, 1).await;

    let details = h.create_invite(&["svy1", "draft1"]).await;
    for transfer in &details.transfers {
        assert_eq!(h.status_row_count(transfer.id).await, 4);
    }

    h.invites.accept(&details.invite.uid, BOB).await.unwrap();
    h.drain().await;
    // Resume sweeps rewrite rows, they never add any
    h.watchdog.run_once().await;

    for transfer in &details.transfers {
        assert_eq!(h.status_row_count(transfer.id).await, 4);
        let statuses = h.repo.list_statuses(transfer.id).await.unwrap();
        for status_type in StatusType::ALL {
            assert_eq!(
                statuses.iter().filter(|s| s.status_type == status_type).count(),
                1,
                "exactly one {status_type} row"
            );
        }
    }
}

#[tokio::test]
async fn test_process_twice_is_already_processed() {
    let h = Harness::new().await;
    h.seed_asset("svy1", ALICE, true).await;
    h.seed_submissions("svy1", ALICE, 2).await;

    let details = h.create_and_accept(&["svy1"]).await;
    let transfer_id = details.transfers[0].id;
    let before = h.repo.list_statuses(transfer_id).await.unwrap();
    let queued_before = h.pending_tasks().await;

    h.clock.advance_minutes(1);
    let second = h.transfers.process(transfer_id).await;

    assert!(matches!(second, Err(AppError::AlreadyProcessed(_))));
    assert_eq!(h.repo.list_statuses(transfer_id).await.unwrap(), before);
    assert_eq!(h.pending_tasks().await, queued_before);
}

#[tokio::test]
async fn test_invite_status_follows_its_transfers() {
    let h = Harness::new().await;
    h.seed_asset("draft1", ALICE, false).await;
    h.seed_asset("svy1", ALICE, true).await;
    h.seed_submissions("svy1", ALICE, 1).await;

    let details = h.create_invite(&["draft1", "svy1"]).await;
    assert_eq!(details.invite.status, InviteStatus::Pending);

    let accepted = h.invites.accept(&details.invite.uid, BOB).await.unwrap();
    // Draft settled, deployed still running
    assert_eq!(accepted.invite.status, InviteStatus::InProgress);

    h.drain().await;
    assert_eq!(
        h.invite(&details.invite.uid).await.status,
        InviteStatus::Complete
    );
}

#[tokio::test]
async fn test_transfer_fails_when_sender_lost_ownership() {
    let h = Harness::new().await;
    h.seed_asset("draft1", ALICE, false).await;
    let details = h.create_invite(&["draft1"]).await;

    // Ownership changed elsewhere between invite and acceptance
    sqlx::query("UPDATE assets SET owner = 'carol' WHERE uid = 'draft1'")
        .execute(&h.pool)
        .await
        .unwrap();

    let accepted = h.invites.accept(&details.invite.uid, BOB).await.unwrap();
    let transfer_id = accepted.transfers[0].id;

    let global = h.status(transfer_id, StatusType::Global).await;
    assert_eq!(global.status, TransferState::Failed);
    assert!(global.error.unwrap().contains("carol"));
    assert_eq!(accepted.invite.status, InviteStatus::Failed);
    assert_eq!(h.asset_owner("draft1").await, "carol");
}

#[tokio::test]
async fn test_set_status_fails_transfer_and_invite_together() {
    let h = Harness::new().await;
    h.seed_asset("svy1", ALICE, true).await;
    h.seed_submissions("svy1", ALICE, 1).await;
    let details = h.create_and_accept(&["svy1"]).await;
    let transfer_id = details.transfers[0].id;
    assert_eq!(details.invite.status, InviteStatus::InProgress);

    h.clock.advance_minutes(1);
    let global = h
        .transfers
        .set_status(
            transfer_id,
            TransferState::Failed,
            Some("stopped by an administrator".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(global.status, TransferState::Failed);
    assert_eq!(h.transfers.status(transfer_id).await.unwrap(), TransferState::Failed);
    assert_eq!(
        h.status(transfer_id, StatusType::Global).await.error.as_deref(),
        Some("stopped by an administrator")
    );
    assert_eq!(
        h.invite(&details.invite.uid).await.status,
        InviteStatus::Failed
    );
}

#[tokio::test]
async fn test_set_status_rejects_leaving_a_settled_state() {
    let h = Harness::new().await;
    h.seed_asset("draft1", ALICE, false).await;
    let details = h.create_and_accept(&["draft1"]).await;
    let transfer_id = details.transfers[0].id;
    let before = h.status(transfer_id, StatusType::Global).await;
    assert_eq!(before.status, TransferState::Success);

    h.clock.advance_minutes(1);
    let result = h
        .transfers
        .set_status(transfer_id, TransferState::InProgress, None)
        .await;

    assert!(matches!(result, Err(AppError::Domain(_))));
    assert_eq!(h.status(transfer_id, StatusType::Global).await, before);
    assert_eq!(
        h.invite(&details.invite.uid).await.status,
        InviteStatus::Complete
    );
}
