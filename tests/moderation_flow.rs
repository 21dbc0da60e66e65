//! Moderation scenarios: toxicity gating, reports and auto-ban, admin
//! commands, global toggles, media and content filters.

mod common;

use common::{ADMIN, Harness, harness, harness_with, seed_preferences, seed_profile, seed_rating};
use veilbot::error::RelayError;
use veilbot::handlers::{admin, flow, user};
use veilbot::state::SessionState;
use veilbot::store::keys;
use veilbot::texts;
use veilbot::transport::Envelope;

fn text(body: &str) -> Envelope {
    Envelope::Text {
        text: body.to_string(),
    }
}

#[tokio::test]
async fn test_toxic_user_cannot_start_chats() {
    let Harness {
        relay,
        store,
        transport,
    } = harness();
    // 20% score over 10 ratings: toxic.
    seed_rating(&store, 9, 2, 8).await;

    user::chat(&relay, 9).await.unwrap();
    assert_eq!(relay.state.session(9).await.unwrap(), SessionState::Idle);
    assert!(
        transport
            .texts_for(9)
            .iter()
            .any(|t| t == texts::TOXIC_BLOCKED)
    );
}

#[tokio::test]
async fn test_toxic_waiter_is_excluded_from_snapshots() {
    let Harness { relay, store, .. } = harness();
    // A toxic user somehow sits in the queue (e.g. rated down while waiting).
    seed_rating(&store, 9, 1, 9).await;
    store.lpush(keys::QUEUE, "9").await.unwrap();
    store
        .set(&keys::state(9), "IN_QUEUE", None)
        .await
        .unwrap();

    user::chat(&relay, 1).await.unwrap();
    // 1 queued behind them instead of matching.
    assert_eq!(relay.state.session(1).await.unwrap(), SessionState::InQueue);
    assert_eq!(relay.state.partner(1).await.unwrap(), None);
}

#[tokio::test]
async fn test_reports_auto_ban_and_break_chat() {
    let Harness {
        relay,
        store,
        transport,
    } = harness();

    // X chats with P; four other users have already reported X.
    user::chat(&relay, 50).await.unwrap();
    user::chat(&relay, 60).await.unwrap();
    for reporter in 1..=4 {
        relay.moderation.record_report(50, reporter).await.unwrap();
    }
    transport.clear();

    // The 5th distinct report comes from the current partner.
    user::report(&relay, 60, "").await.unwrap();

    let record = relay.moderation.check_ban(50).await.unwrap().unwrap();
    assert!(record.is_auto_ban);
    assert_eq!(record.reason.label(), "abuse");
    assert!(!record.is_permanent);
    let expires = record.expires_at.unwrap();
    let expected = chrono::Utc::now().timestamp() + 7 * 86_400;
    assert!((expires - expected).abs() < 60, "expiry ≈ now + 7d");

    // The chat was broken and the partner notified.
    assert_eq!(relay.state.session(50).await.unwrap(), SessionState::Idle);
    assert_eq!(relay.state.session(60).await.unwrap(), SessionState::Idle);
    assert!(
        transport
            .texts_for(60)
            .iter()
            .any(|t| t.contains(texts::PARTNER_LEFT))
    );
    assert!(
        transport
            .texts_for(50)
            .iter()
            .any(|t| t.contains("banned"))
    );
    let raw_count = store.get(&keys::report_count(50)).await.unwrap();
    assert_eq!(raw_count.as_deref(), Some("5"));
}

#[tokio::test]
async fn test_banned_user_is_gated_everywhere() {
    let Harness {
        relay,
        transport,
        ..
    } = harness();
    admin::ban(&relay, ADMIN, "7 7d spam").await.unwrap();
    transport.clear();

    user::chat(&relay, 7).await.unwrap();
    assert_eq!(relay.state.session(7).await.unwrap(), SessionState::Idle);
    assert!(transport.texts_for(7)[0].contains("banned"));

    transport.clear();
    relay.router.relay(7, &text("hello")).await.unwrap();
    assert!(transport.texts_for(7)[0].contains("banned"));
}

#[tokio::test]
async fn test_ban_kicks_target_out_of_live_chat() {
    let Harness {
        relay,
        transport,
        ..
    } = harness();
    user::chat(&relay, 1).await.unwrap();
    user::chat(&relay, 2).await.unwrap();
    transport.clear();

    admin::ban(&relay, ADMIN, "1 1h abuse").await.unwrap();

    assert_eq!(relay.state.session(1).await.unwrap(), SessionState::Idle);
    assert_eq!(relay.state.session(2).await.unwrap(), SessionState::Idle);
    assert!(
        transport
            .texts_for(2)
            .iter()
            .any(|t| t.contains(texts::PARTNER_LEFT))
    );
    assert!(transport.texts_for(1).iter().any(|t| t.contains("banned")));
    assert!(
        transport
            .texts_for(ADMIN)
            .iter()
            .any(|t| t.contains("banned"))
    );
}

#[tokio::test]
async fn test_ban_removes_target_from_queue() {
    let Harness { relay, .. } = harness();
    user::chat(&relay, 1).await.unwrap();
    admin::ban(&relay, ADMIN, "1 perm harassment").await.unwrap();
    assert!(relay.queue.is_empty().await.unwrap());
    assert_eq!(relay.state.session(1).await.unwrap(), SessionState::Idle);
}

#[tokio::test]
async fn test_unban_is_idempotent() {
    let Harness {
        relay,
        transport,
        ..
    } = harness();
    admin::ban(&relay, ADMIN, "7 perm spam").await.unwrap();
    admin::unban(&relay, ADMIN, "7").await.unwrap();
    assert!(relay.moderation.check_ban(7).await.unwrap().is_none());

    transport.clear();
    admin::unban(&relay, ADMIN, "7").await.unwrap();
    assert!(
        transport
            .texts_for(ADMIN)
            .iter()
            .any(|t| t == texts::NOT_BANNED)
    );
}

#[tokio::test]
async fn test_forcematch_pairs_idle_users() {
    let Harness {
        relay,
        transport,
        ..
    } = harness();
    admin::force_match(&relay, ADMIN, "1 2").await.unwrap();

    assert_eq!(relay.state.partner(1).await.unwrap(), Some(2));
    assert_eq!(relay.state.partner(2).await.unwrap(), Some(1));
    assert!(
        transport
            .texts_for(1)
            .iter()
            .any(|t| t.contains(texts::SPECIAL_MATCH))
    );
}

#[tokio::test]
async fn test_forcematch_rejects_user_in_chat() {
    let Harness { relay, .. } = harness();
    user::chat(&relay, 5).await.unwrap();
    user::chat(&relay, 6).await.unwrap();

    let err = admin::force_match(&relay, ADMIN, "4 6").await.unwrap_err();
    assert_eq!(err.error_code(), "conflict_state");
    // No mutation: the original pair survives, 4 stays idle.
    assert_eq!(relay.state.partner(6).await.unwrap(), Some(5));
    assert_eq!(relay.state.session(4).await.unwrap(), SessionState::Idle);
}

#[tokio::test]
async fn test_forcematch_respects_bans() {
    let Harness { relay, .. } = harness();
    admin::ban(&relay, ADMIN, "4 perm spam").await.unwrap();
    let err = admin::force_match(&relay, ADMIN, "4 6").await.unwrap_err();
    assert_eq!(err.error_code(), "conflict_state");
    assert_eq!(relay.state.session(6).await.unwrap(), SessionState::Idle);
}

#[tokio::test]
async fn test_forcematch_pulls_waiters_out_of_queue() {
    let Harness { relay, .. } = harness();
    user::chat(&relay, 1).await.unwrap();
    admin::force_match(&relay, ADMIN, "1 2").await.unwrap();
    assert!(relay.queue.is_empty().await.unwrap());
    assert_eq!(relay.state.partner(1).await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_warn_notifies_and_lists() {
    let Harness {
        relay,
        transport,
        ..
    } = harness();
    admin::warn(&relay, ADMIN, "3 being rude").await.unwrap();
    assert!(
        transport
            .texts_for(3)
            .iter()
            .any(|t| t.contains("warning") && t.contains("being rude"))
    );
    assert_eq!(relay.moderation.warning_count(3).await.unwrap(), 1);
    assert_eq!(relay.moderation.list_warned().await.unwrap(), vec![(3, 1)]);
}

#[tokio::test]
async fn test_admin_commands_forbidden_for_users() {
    let Harness { relay, .. } = harness();
    let err = admin::ban(&relay, 5, "1 7d spam").await.unwrap_err();
    assert!(matches!(err, RelayError::Forbidden));
    let err = admin::match_status(&relay, 5).await.unwrap_err();
    assert!(matches!(err, RelayError::Forbidden));
    assert!(relay.moderation.check_ban(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_disabling_gender_filter_bypasses_preferences() {
    let Harness { relay, store, .. } = harness();
    seed_profile(&store, 1, "a", Some("male"), None).await;
    seed_preferences(&store, 1, "female", "any").await;
    seed_profile(&store, 2, "b", Some("male"), None).await;

    user::chat(&relay, 1).await.unwrap();
    user::chat(&relay, 2).await.unwrap();
    assert_eq!(relay.state.partner(2).await.unwrap(), None);

    admin::set_gender_filter(&relay, ADMIN, false).await.unwrap();
    user::stop(&relay, 2).await.unwrap();
    user::chat(&relay, 2).await.unwrap();
    assert_eq!(relay.state.partner(2).await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_blocked_media_is_dropped_with_notice() {
    let Harness {
        relay,
        transport,
        ..
    } = harness();
    user::chat(&relay, 1).await.unwrap();
    user::chat(&relay, 2).await.unwrap();
    admin::set_media_block(&relay, ADMIN, "sticker", true)
        .await
        .unwrap();
    transport.clear();

    relay
        .router
        .relay(1, &Envelope::Sticker { file_id: "s1".into() })
        .await
        .unwrap();
    assert!(transport.envelopes_for(2).is_empty());
    assert!(
        transport
            .texts_for(1)
            .iter()
            .any(|t| t == texts::MEDIA_BLOCKED)
    );

    // Unblock and it flows again.
    admin::set_media_block(&relay, ADMIN, "sticker", false)
        .await
        .unwrap();
    relay
        .router
        .relay(1, &Envelope::Sticker { file_id: "s1".into() })
        .await
        .unwrap();
    assert_eq!(transport.envelopes_for(2).len(), 1);
}

#[tokio::test]
async fn test_blocked_term_filters_text_and_captions() {
    let Harness {
        relay,
        transport,
        ..
    } = harness_with(|config| {
        config.moderation.blocked_terms = vec!["Badword".into()];
    });
    user::chat(&relay, 1).await.unwrap();
    user::chat(&relay, 2).await.unwrap();
    transport.clear();

    relay
        .router
        .relay(1, &text("this contains bAdWoRd inside"))
        .await
        .unwrap();
    relay
        .router
        .relay(
            1,
            &Envelope::Photo {
                file_id: "p".into(),
                caption: Some("BADWORD caption".into()),
            },
        )
        .await
        .unwrap();
    assert!(transport.envelopes_for(2).is_empty());
    assert_eq!(
        transport
            .texts_for(1)
            .iter()
            .filter(|t| *t == texts::TERM_BLOCKED)
            .count(),
        2
    );

    // Clean messages still flow.
    relay.router.relay(1, &text("all good")).await.unwrap();
    assert_eq!(transport.envelopes_for(2).len(), 1);
}

#[tokio::test]
async fn test_ban_conversation_flow() {
    let Harness {
        relay,
        transport,
        ..
    } = harness();

    admin::ban(&relay, ADMIN, "").await.unwrap();
    assert!(flow::is_active(&relay, ADMIN).await.unwrap());

    flow::on_text(&relay, ADMIN, "123").await.unwrap();
    flow::on_text(&relay, ADMIN, "spam").await.unwrap();
    flow::on_text(&relay, ADMIN, "7d").await.unwrap();

    assert!(!flow::is_active(&relay, ADMIN).await.unwrap());
    let record = relay.moderation.check_ban(123).await.unwrap().unwrap();
    assert_eq!(record.reason.label(), "spam");
    assert!(!record.is_auto_ban);
    assert!(
        transport
            .texts_for(123)
            .iter()
            .any(|t| t.contains("banned"))
    );
}

#[tokio::test]
async fn test_ban_flow_keeps_step_on_bad_input_and_cancels() {
    let Harness { relay, .. } = harness();
    admin::ban(&relay, ADMIN, "").await.unwrap();

    let err = flow::on_text(&relay, ADMIN, "not-a-number").await.unwrap_err();
    assert_eq!(err.error_code(), "bad_input");
    assert!(flow::is_active(&relay, ADMIN).await.unwrap());

    flow::on_text(&relay, ADMIN, "cancel").await.unwrap();
    assert!(!flow::is_active(&relay, ADMIN).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_report_notice() {
    let Harness {
        relay,
        transport,
        ..
    } = harness();
    user::chat(&relay, 1).await.unwrap();
    user::chat(&relay, 2).await.unwrap();

    user::report(&relay, 2, "").await.unwrap();
    transport.clear();
    user::report(&relay, 2, "").await.unwrap();
    assert!(
        transport
            .texts_for(2)
            .iter()
            .any(|t| t == texts::REPORT_DUPLICATE)
    );
}

#[tokio::test]
async fn test_report_by_id_is_admin_only() {
    let Harness { relay, .. } = harness();
    let err = user::report(&relay, 5, "123").await.unwrap_err();
    assert!(matches!(err, RelayError::Forbidden));

    // Admins may name a target.
    user::report(&relay, ADMIN, "123").await.unwrap();
    let raw = relay.store.get(&keys::report_count(123)).await.unwrap();
    assert_eq!(raw.as_deref(), Some("1"));
}
