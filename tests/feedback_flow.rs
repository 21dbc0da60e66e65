//! Rating and feedback scenarios.

mod common;

use common::{Harness, harness};
use veilbot::handlers::user::{self, FeedbackVote};
use veilbot::texts;

async fn paired_then_stopped(harness: &Harness) {
    user::chat(&harness.relay, 1).await.unwrap();
    user::chat(&harness.relay, 2).await.unwrap();
    user::stop(&harness.relay, 1).await.unwrap();
    harness.transport.clear();
}

#[tokio::test]
async fn test_both_sides_get_a_rating_prompt() {
    let harness = harness();
    user::chat(&harness.relay, 1).await.unwrap();
    user::chat(&harness.relay, 2).await.unwrap();
    harness.transport.clear();
    user::stop(&harness.relay, 1).await.unwrap();

    for uid in [1, 2] {
        assert!(
            harness
                .transport
                .texts_for(uid)
                .iter()
                .any(|t| t.contains(texts::RATE_PROMPT)),
            "no rating prompt for {uid}"
        );
    }
}

#[tokio::test]
async fn test_vote_applies_once() {
    let harness = harness();
    paired_then_stopped(&harness).await;

    user::feedback(&harness.relay, 2, FeedbackVote::Up)
        .await
        .unwrap();
    let record = harness.relay.ratings.record(1).await.unwrap();
    assert_eq!(record.positive, 1);
    assert_eq!(record.negative, 0);
    assert!(
        harness
            .transport
            .texts_for(2)
            .iter()
            .any(|t| t == texts::RATE_THANKS)
    );

    // The pointer is consumed; a second click has nothing to rate.
    harness.transport.clear();
    user::feedback(&harness.relay, 2, FeedbackVote::Up)
        .await
        .unwrap();
    assert!(
        harness
            .transport
            .texts_for(2)
            .iter()
            .any(|t| t == texts::RATE_NOTHING)
    );
    assert_eq!(harness.relay.ratings.record(1).await.unwrap().positive, 1);
}

#[tokio::test]
async fn test_negative_vote_counts() {
    let harness = harness();
    paired_then_stopped(&harness).await;

    user::feedback(&harness.relay, 1, FeedbackVote::Down)
        .await
        .unwrap();
    let record = harness.relay.ratings.record(2).await.unwrap();
    assert_eq!(record.negative, 1);
}

#[tokio::test]
async fn test_skip_records_nothing() {
    let harness = harness();
    paired_then_stopped(&harness).await;

    user::feedback(&harness.relay, 2, FeedbackVote::Skip)
        .await
        .unwrap();
    let record = harness.relay.ratings.record(1).await.unwrap();
    assert_eq!((record.positive, record.negative), (0, 0));
    assert!(
        harness
            .transport
            .texts_for(2)
            .iter()
            .any(|t| t == texts::RATE_SKIPPED)
    );
}

#[tokio::test]
async fn test_lock_prevents_rerating_same_partner_within_window() {
    let harness = harness();
    paired_then_stopped(&harness).await;
    user::feedback(&harness.relay, 2, FeedbackVote::Up)
        .await
        .unwrap();

    // They chat again and break again inside the 24 h lock window.
    user::chat(&harness.relay, 1).await.unwrap();
    user::chat(&harness.relay, 2).await.unwrap();
    user::stop(&harness.relay, 1).await.unwrap();
    harness.transport.clear();

    user::feedback(&harness.relay, 2, FeedbackVote::Up)
        .await
        .unwrap();
    assert!(
        harness
            .transport
            .texts_for(2)
            .iter()
            .any(|t| t == texts::RATE_ALREADY)
    );
    assert_eq!(harness.relay.ratings.record(1).await.unwrap().positive, 1);
}

#[tokio::test]
async fn test_feedback_without_pending_pointer() {
    let harness = harness();
    user::feedback(&harness.relay, 5, FeedbackVote::Up)
        .await
        .unwrap();
    assert!(
        harness
            .transport
            .texts_for(5)
            .iter()
            .any(|t| t == texts::RATE_NOTHING)
    );
}

#[tokio::test]
async fn test_total_chats_counts_both_sides() {
    let harness = harness();
    user::chat(&harness.relay, 1).await.unwrap();
    user::chat(&harness.relay, 2).await.unwrap();

    assert_eq!(harness.relay.ratings.record(1).await.unwrap().total_chats, 1);
    assert_eq!(harness.relay.ratings.record(2).await.unwrap().total_chats, 1);
}

#[tokio::test]
async fn test_no_notification_to_rated_party() {
    let harness = harness();
    paired_then_stopped(&harness).await;

    user::feedback(&harness.relay, 2, FeedbackVote::Down)
        .await
        .unwrap();
    // The rated side hears nothing.
    assert!(harness.transport.texts_for(1).is_empty());
}
