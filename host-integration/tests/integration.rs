use crate::utils::create_node;
use admission_processor::{DynamicFeeMatch, ErrorKind, TxId};
use host_integration::app::make_tx;
use std::time::Duration;

pub mod utils;

fn ids(list: &[&str]) -> Vec<TxId> {
    list.iter().map(|id| TxId::from(*id)).collect()
}

#[tokio::test]
async fn clean_transaction_is_accepted_and_broadcast() {
    let node = create_node().await;

    let ticket = node.handle.create_job(vec![make_tx("a1", "alice")]).await.unwrap();
    let result = node.wait_processed(ticket).await;

    assert_eq!(result.accept, ids(&["a1"]));
    assert_eq!(result.broadcast, ids(&["a1"]));
    assert!(result.invalid.is_empty());
    assert!(result.excess.is_empty());
    assert!(result.errors.is_none());

    assert!(node.mempool.contains("a1"));
    assert_eq!(node.peers.broadcasts(), vec![ids(&["a1"])]);
    assert!(!node.handle.has_pending(ticket).await.unwrap());
}

#[tokio::test]
async fn repeated_id_within_a_batch_is_processed_once() {
    let node = create_node().await;

    let ticket = node
        .handle
        .create_job(vec![make_tx("a1", "alice"), make_tx("a1", "alice")])
        .await
        .unwrap();
    let result = node.wait_processed(ticket).await;

    assert_eq!(result.accept, ids(&["a1"]));
    assert_eq!(result.broadcast, ids(&["a1"]));
    assert!(result.errors.is_none());
    assert_eq!(node.peers.broadcasts(), vec![ids(&["a1"])]);

    // The in-flight entry was released at finalisation: a resubmission gets
    // all the way to the pool duplicate check instead of being skipped.
    let ticket = node.handle.create_job(vec![make_tx("a1", "alice")]).await.unwrap();
    let result = node.wait_processed(ticket).await;
    let errors = result.errors.unwrap();
    assert_eq!(errors[&TxId::from("a1")].kind, ErrorKind::Duplicate);
}

#[tokio::test]
async fn pool_duplicate_is_reported_synchronously() {
    let node = create_node().await;
    node.mempool.seed("b1");

    let ticket = node.handle.create_job(vec![make_tx("b1", "bob")]).await.unwrap();

    // Nothing was eligible, so the ticket is processed before submit returns.
    let result = node.handle.processed_ticket(ticket).await.unwrap().unwrap();
    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    assert!(result.invalid.is_empty());
    assert!(result.excess.is_empty());

    let errors = result.errors.unwrap();
    let record = &errors[&TxId::from("b1")];
    assert_eq!(record.kind, ErrorKind::Duplicate);
    assert_eq!(record.message, "Duplicate transaction b1");
}

#[tokio::test]
async fn empty_submission_yields_an_empty_processed_ticket() {
    let node = create_node().await;

    let ticket = node.handle.create_job(vec![]).await.unwrap();
    let result = node.handle.processed_ticket(ticket).await.unwrap().unwrap();

    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    assert!(result.invalid.is_empty());
    assert!(result.excess.is_empty());
    assert!(result.errors.is_none());
}

#[tokio::test]
async fn low_fee_transaction_is_rejected() {
    let node = create_node().await;
    node.fees.override_for(
        "c1",
        DynamicFeeMatch {
            enter_pool: false,
            broadcast: false,
        },
    );

    let ticket = node.handle.create_job(vec![make_tx("c1", "carol")]).await.unwrap();
    let result = node.wait_processed(ticket).await;

    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    let errors = result.errors.unwrap();
    let record = &errors[&TxId::from("c1")];
    assert_eq!(record.kind, ErrorKind::LowFee);
    assert_eq!(
        record.message,
        "The fee is too low to broadcast and accept the transaction"
    );
    assert!(node.peers.broadcasts().is_empty());
}

#[tokio::test]
async fn broadcast_only_fee_match_skips_the_pool() {
    let node = create_node().await;
    node.fees.override_for(
        "c2",
        DynamicFeeMatch {
            enter_pool: false,
            broadcast: true,
        },
    );

    let ticket = node.handle.create_job(vec![make_tx("c2", "carol")]).await.unwrap();
    let result = node.wait_processed(ticket).await;

    assert!(result.accept.is_empty());
    assert_eq!(result.broadcast, ids(&["c2"]));
    assert!(result.errors.is_none());
    assert!(!node.mempool.contains("c2"));
    assert_eq!(node.peers.broadcasts(), vec![ids(&["c2"])]);
}

#[tokio::test]
async fn pool_only_fee_match_skips_broadcast() {
    let node = create_node().await;
    node.fees.override_for(
        "c3",
        DynamicFeeMatch {
            enter_pool: true,
            broadcast: false,
        },
    );

    let ticket = node.handle.create_job(vec![make_tx("c3", "carol")]).await.unwrap();
    let result = node.wait_processed(ticket).await;

    assert_eq!(result.accept, ids(&["c3"]));
    assert!(result.broadcast.is_empty());
    assert!(node.mempool.contains("c3"));
    assert!(node.peers.broadcasts().is_empty());
}

#[tokio::test]
async fn forged_transaction_is_removed_after_acceptance() {
    let node = create_node().await;
    node.database.mark_forged("d1");

    let ticket = node.handle.create_job(vec![make_tx("d1", "dave")]).await.unwrap();
    let result = node.wait_processed(ticket).await;

    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    let errors = result.errors.unwrap();
    let record = &errors[&TxId::from("d1")];
    assert_eq!(record.kind, ErrorKind::Forged);
    assert_eq!(record.message, "Already forged.");
    assert!(!node.mempool.contains("d1"));
    assert!(node.peers.broadcasts().is_empty());
}

#[tokio::test]
async fn full_pool_rejection_still_broadcasts() {
    let node = create_node().await;
    node.mempool
        .reject_with("e1", ErrorKind::PoolFull, "Pool is full");

    let ticket = node.handle.create_job(vec![make_tx("e1", "erin")]).await.unwrap();
    let result = node.wait_processed(ticket).await;

    assert!(result.accept.is_empty());
    assert_eq!(result.broadcast, ids(&["e1"]));
    let errors = result.errors.unwrap();
    assert_eq!(errors[&TxId::from("e1")].kind, ErrorKind::PoolFull);
    assert_eq!(node.peers.broadcasts(), vec![ids(&["e1"])]);
}

#[tokio::test]
async fn other_pool_rejection_removes_broadcast_too() {
    let node = create_node().await;
    node.mempool.reject_with(
        "f1",
        ErrorKind::Pool("ERR_POOL_SENDER_EXCEEDED".to_string()),
        "Sender has too many transactions in the pool",
    );

    let ticket = node.handle.create_job(vec![make_tx("f1", "frank")]).await.unwrap();
    let result = node.wait_processed(ticket).await;

    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    let errors = result.errors.unwrap();
    assert_eq!(
        errors[&TxId::from("f1")].kind.code(),
        "ERR_POOL_SENDER_EXCEEDED"
    );
    assert!(node.peers.broadcasts().is_empty());
}

#[tokio::test]
async fn handler_decline_is_silent() {
    let node = create_node().await;
    node.handlers.deny("g1");

    let ticket = node
        .handle
        .create_job(vec![make_tx("g1", "grace"), make_tx("g2", "grace")])
        .await
        .unwrap();
    let result = node.wait_processed(ticket).await;

    // The declined transaction appears in no bucket at all.
    assert_eq!(result.accept, ids(&["g2"]));
    assert_eq!(result.broadcast, ids(&["g2"]));
    assert!(result.invalid.is_empty());
    assert!(result.errors.is_none());
}

#[tokio::test]
async fn verifier_rejections_land_in_invalid_and_excess() {
    let node = create_node().await;
    node.verifier.reject("h1", "bad signature");
    node.verifier.mark_excess("i1");

    let ticket = node
        .handle
        .create_job(vec![
            make_tx("h1", "heidi"),
            make_tx("i1", "ivan"),
            make_tx("j1", "judy"),
        ])
        .await
        .unwrap();
    let result = node.wait_processed(ticket).await;

    assert_eq!(result.accept, ids(&["j1"]));
    assert_eq!(result.broadcast, ids(&["j1"]));
    assert_eq!(result.invalid, ids(&["h1"]));
    assert_eq!(result.excess, ids(&["i1"]));
    assert!(result.errors.is_none());
}

#[tokio::test]
async fn wallet_apply_failure_is_recorded() {
    let node = create_node().await;
    node.wallets.fail_apply("k1", "Insufficient balance");

    let ticket = node.handle.create_job(vec![make_tx("k1", "kate")]).await.unwrap();
    let result = node.wait_processed(ticket).await;

    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    let errors = result.errors.unwrap();
    let record = &errors[&TxId::from("k1")];
    assert_eq!(record.kind, ErrorKind::Apply);
    assert!(record.message.contains("Insufficient balance"));
}

#[tokio::test]
async fn error_only_ids_stay_in_flight() {
    let node = create_node().await;
    node.wallets.fail_apply("k1", "Insufficient balance");

    let ticket = node.handle.create_job(vec![make_tx("k1", "kate")]).await.unwrap();
    node.wait_processed(ticket).await;

    // The id never reached a terminal id-list bucket, so its in-flight entry
    // is still held: a resubmission is skipped without leaving any trace.
    let ticket = node.handle.create_job(vec![make_tx("k1", "kate")]).await.unwrap();
    let result = node.wait_processed(ticket).await;
    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    assert!(result.invalid.is_empty());
    assert!(result.excess.is_empty());
    assert!(result.errors.is_none());
}

#[tokio::test]
async fn decode_failure_is_classified_unknown() {
    let node = create_node().await;
    node.codec.fail_decode("l1");

    let ticket = node.handle.create_job(vec![make_tx("l1", "liam")]).await.unwrap();
    let result = node.wait_processed(ticket).await;

    assert!(result.accept.is_empty());
    let errors = result.errors.unwrap();
    assert_eq!(errors[&TxId::from("l1")].kind, ErrorKind::Unknown);
}

#[tokio::test]
async fn overlapping_submission_of_same_id_is_skipped() {
    let node = create_node().await;
    node.verifier.delay_for(Duration::from_millis(300));

    let first = node.handle.create_job(vec![make_tx("a1", "alice")]).await.unwrap();
    let second = node.handle.create_job(vec![make_tx("a1", "alice")]).await.unwrap();

    // The second ticket had nothing eligible and resolved synchronously,
    // with the shared id in no bucket.
    let result = node.handle.processed_ticket(second).await.unwrap().unwrap();
    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    assert!(result.invalid.is_empty());
    assert!(result.excess.is_empty());
    assert!(result.errors.is_none());

    assert!(node.handle.has_pending(first).await.unwrap());
    let result = node.wait_processed(first).await;
    assert_eq!(result.accept, ids(&["a1"]));
}

#[tokio::test]
async fn ticket_is_visible_while_pending() {
    let node = create_node().await;
    node.verifier.delay_for(Duration::from_millis(300));

    let ticket = node.handle.create_job(vec![make_tx("p1", "peggy")]).await.unwrap();

    assert!(node.handle.has_pending(ticket).await.unwrap());
    assert!(node
        .handle
        .pending_tickets()
        .await
        .unwrap()
        .contains(&ticket));

    node.wait_processed(ticket).await;
    assert!(!node.handle.has_pending(ticket).await.unwrap());
    assert!(node.handle.pending_tickets().await.unwrap().is_empty());
}

#[tokio::test]
async fn pipeline_fault_abandons_the_ticket_and_releases_ids() {
    let node = create_node().await;
    node.database.set_unavailable(true);

    let ticket = node.handle.create_job(vec![make_tx("m1", "mallory")]).await.unwrap();
    node.wait_not_pending(ticket).await;
    assert!(node.handle.processed_ticket(ticket).await.unwrap().is_none());

    // The abandoned ids are free to come back once the database recovers.
    node.database.set_unavailable(false);
    let ticket = node.handle.create_job(vec![make_tx("m1", "mallory")]).await.unwrap();
    let result = node.wait_processed(ticket).await;
    assert_eq!(result.accept, ids(&["m1"]));
}

#[tokio::test]
async fn wholesale_verifier_failure_rejects_the_batch() {
    let node = create_node().await;
    node.verifier.fail_batches(true);

    let ticket = node.handle.create_job(vec![make_tx("n1", "nick")]).await.unwrap();
    let result = node.wait_processed(ticket).await;

    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    let errors = result.errors.unwrap();
    let record = &errors[&TxId::from("n1")];
    assert_eq!(record.kind, ErrorKind::Unknown);
    assert!(record.message.contains("verifier crashed"));
}

#[tokio::test]
async fn processed_tickets_returns_every_terminal_result() {
    let node = create_node().await;

    let first = node.handle.create_job(vec![make_tx("q1", "quinn")]).await.unwrap();
    let second = node.handle.create_job(vec![make_tx("q2", "quinn")]).await.unwrap();
    node.wait_processed(first).await;
    node.wait_processed(second).await;

    let results = node.handle.processed_tickets().await.unwrap();
    let tickets: Vec<_> = results.iter().map(|r| r.ticket_id).collect();
    assert!(tickets.contains(&first));
    assert!(tickets.contains(&second));
}
