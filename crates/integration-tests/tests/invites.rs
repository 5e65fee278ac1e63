//! Invite lifecycle: creation checks, who may answer, auto-accept.

mod common;

use std::sync::Arc;

use common::{Harness, ALICE, BOB};
use ownership_core::application::{CreateInviteRequest, InviteService};
use ownership_core::domain::{InviteStatus, StatusType, TransferState};
use ownership_core::error::AppError;
use ownership_core::port::id_provider::SequentialIdProvider;

fn request(sender: &str, recipient: &str, assets: &[&str]) -> CreateInviteRequest {
    CreateInviteRequest {
        sender: sender.to_string(),
        recipient: recipient.to_string(),
        asset_uids: assets.iter().map(|a| a.to_string()).collect(),
    }
}

async fn invite_count(h: &Harness) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM invites")
        .fetch_one(&h.pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_invite_validations() {
    let h = Harness::new().await;
    h.seed_asset("draft1", ALICE, false).await;
    h.seed_asset("carols", "carol", false).await;

    let to_self = h.invites.create_invite(request(ALICE, ALICE, &["draft1"])).await;
    assert!(matches!(to_self, Err(AppError::Validation(_))));

    let empty = h.invites.create_invite(request(ALICE, BOB, &[])).await;
    assert!(matches!(empty, Err(AppError::Validation(_))));

    let missing = h
        .invites
        .create_invite(request(ALICE, BOB, &["draft1", "nope"]))
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let not_owner = h
        .invites
        .create_invite(request(ALICE, BOB, &["draft1", "carols"]))
        .await;
    assert!(matches!(not_owner, Err(AppError::Forbidden(_))));

    // A rejected request leaves nothing behind
    assert_eq!(invite_count(&h).await, 0);
}

#[tokio::test]
async fn test_asset_cannot_join_two_active_transfers() {
    let h = Harness::new().await;
    h.seed_asset("draft1", ALICE, false).await;

    let first = h.create_invite(&["draft1"]).await;
    let second = h
        .invites
        .create_invite(request(ALICE, "carol", &["draft1"]))
        .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    // Declining releases the asset
    h.invites.decline(&first.invite.uid, BOB).await.unwrap();
    let retry = h
        .invites
        .create_invite(request(ALICE, "carol", &["draft1"]))
        .await
        .unwrap();
    assert_eq!(retry.transfers.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invites_cannot_share_an_asset() {
    let h = Harness::new().await;

    for round in 0..20 {
        let asset = format!("draft{}", round);
        h.seed_asset(&asset, ALICE, false).await;

        let (to_bob, to_carol) = tokio::join!(
            h.invites.create_invite(request(ALICE, BOB, &[&asset])),
            h.invites.create_invite(request(ALICE, "carol", &[&asset])),
        );

        let created = [&to_bob, &to_carol]
            .iter()
            .filter(|result| result.is_ok())
            .count();
        assert_eq!(created, 1, "round {round}: exactly one invite wins the asset");
        let loser = if to_bob.is_ok() { to_carol } else { to_bob };
        assert!(
            matches!(loser, Err(AppError::Conflict(_))),
            "round {round}: {loser:?}"
        );

        let transfers: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transfers WHERE asset_uid = ?")
                .bind(&asset)
                .fetch_one(&h.pool)
                .await
                .unwrap();
        assert_eq!(transfers, 1, "round {round}");
    }

    // Rejected invites roll back with their transfers
    assert_eq!(invite_count(&h).await, 20);
}

#[tokio::test]
async fn test_duplicate_assets_make_one_transfer() {
    let h = Harness::new().await;
    h.seed_asset("draft1", ALICE, false).await;

    let details = h.create_invite(&["draft1", "draft1"]).await;

    assert_eq!(details.transfers.len(), 1);
    assert_eq!(details.invite.status, InviteStatus::Pending);
    for status_type in StatusType::ALL {
        assert_eq!(
            h.state(details.transfers[0].id, status_type).await,
            TransferState::Pending
        );
    }
}

#[tokio::test]
async fn test_only_the_right_party_answers() {
    let h = Harness::new().await;
    h.seed_asset("draft1", ALICE, false).await;
    let details = h.create_invite(&["draft1"]).await;
    let uid = details.invite.uid.clone();

    assert!(matches!(
        h.invites.accept(&uid, ALICE).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        h.invites.decline(&uid, ALICE).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        h.invites.cancel(&uid, BOB).await,
        Err(AppError::Forbidden(_))
    ));
    assert_eq!(h.invite(&uid).await.status, InviteStatus::Pending);

    let cancelled = h.invites.cancel(&uid, ALICE).await.unwrap();
    assert_eq!(cancelled.status, InviteStatus::Cancelled);

    // Answered invites stay answered
    assert!(matches!(
        h.invites.accept(&uid, BOB).await,
        Err(AppError::Domain(_))
    ));
    assert_eq!(h.asset_owner("draft1").await, ALICE);
    assert_eq!(
        h.state(details.transfers[0].id, StatusType::Global).await,
        TransferState::Pending
    );
}

#[tokio::test]
async fn test_accept_processes_every_transfer_despite_a_failure() {
    let h = Harness::new().await;
    h.seed_asset("draft1", ALICE, false).await;
    h.seed_asset("draft2", ALICE, false).await;
    let details = h.create_invite(&["draft1", "draft2"]).await;

    sqlx::query("UPDATE assets SET owner = 'carol' WHERE uid = 'draft1'")
        .execute(&h.pool)
        .await
        .unwrap();

    let accepted = h.invites.accept(&details.invite.uid, BOB).await.unwrap();

    assert_eq!(accepted.invite.status, InviteStatus::Failed);
    assert_eq!(h.asset_owner("draft2").await, BOB);
    let states: Vec<TransferState> = {
        let mut states = Vec::new();
        for transfer in &accepted.transfers {
            states.push(h.state(transfer.id, StatusType::Global).await);
        }
        states
    };
    assert!(states.contains(&TransferState::Failed));
    assert!(states.contains(&TransferState::Success));
}

#[tokio::test]
async fn test_auto_accept_processes_on_creation() {
    let h = Harness::new().await;
    h.seed_asset("draft1", ALICE, false).await;

    let auto = InviteService::new(
        h.repo.clone(),
        h.repo.clone(),
        h.transfers.clone(),
        Arc::new(SequentialIdProvider::default()),
        h.clock.clone(),
    )
    .with_auto_accept(true);

    let details = auto
        .create_invite(request(ALICE, BOB, &["draft1"]))
        .await
        .unwrap();

    assert_eq!(details.invite.status, InviteStatus::Complete);
    assert_eq!(h.asset_owner("draft1").await, BOB);
}
