//! Crash handling: state wipe, command refusals, message masking, and the
//! recovery timer.

use super::*;
use crate::protocol::UserCommand;
use std::time::Duration;
use tokio::sync::oneshot;

/// Node 1 on the line 0-1-2, initialized with its holder edge toward 0.
async fn crashed_middle_node() -> (Node, Mailbox, TestPeer, TestPeer) {
    let (mut node, mailbox) = make_node(1);
    let mut a = make_peer(0);
    let mut c = make_peer(2);
    bootstrap(&mut node, &[&a, &c], false).await;
    initialize_from(&mut node, &a).await;
    drain(&mut c);

    deliver_self(&mut node, Message::Command(UserCommand::Request)).await;
    drain(&mut a);

    deliver_self(&mut node, Message::Command(UserCommand::Crash)).await;
    (node, mailbox, a, c)
}

#[tokio::test]
async fn test_crash_wipes_state() {
    let (node, _mailbox, _a, _c) = crashed_middle_node().await;

    assert!(node.phase.is_crashed());
    assert_eq!(holder_id(&node), None);
    assert!(queue_ids(&node).is_empty());
    assert!(!node.using);
    assert!(!node.asked);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_timer_fires_restart_flood() {
    let (mut node, mut mailbox, mut a, mut c) = crashed_middle_node().await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    let envelope = mailbox.try_recv().expect("scheduled Recovery");
    assert!(matches!(envelope.message, Message::Recovery));
    node.handle(envelope).await;

    assert!(node.phase.is_recovering());
    assert!(matches!(expect_message(&mut a), Message::Restart));
    assert!(matches!(expect_message(&mut c), Message::Restart));
}

#[tokio::test(start_paused = true)]
async fn test_crash_refused_while_in_critical_section() {
    let (mut node, mut mailbox) = make_node(0);
    let _b = make_peer(1);
    bootstrap(&mut node, &[&_b], true).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let envelope = mailbox.recv().await.unwrap();
    node.handle(envelope).await;
    deliver_self(&mut node, Message::Command(UserCommand::Request)).await;
    assert!(node.using);

    deliver_self(&mut node, Message::Command(UserCommand::Crash)).await;

    assert!(node.phase.is_normal());
    assert!(node.using);
}

#[tokio::test]
async fn test_crash_refused_before_initialization() {
    let (mut node, _mailbox) = make_node(1);
    let a = make_peer(0);
    bootstrap(&mut node, &[&a], false).await;

    deliver_self(&mut node, Message::Command(UserCommand::Crash)).await;

    assert!(matches!(node.phase, Phase::Uninitialized));
}

#[tokio::test(start_paused = true)]
async fn test_crash_refused_while_recovering() {
    let (mut node, mut mailbox, _a, _c) = crashed_middle_node().await;
    tokio::time::sleep(Duration::from_millis(250)).await;
    let envelope = mailbox.try_recv().unwrap();
    node.handle(envelope).await;
    assert!(node.phase.is_recovering());

    deliver_self(&mut node, Message::Command(UserCommand::Crash)).await;

    assert!(node.phase.is_recovering());
}

#[tokio::test]
async fn test_protocol_messages_dropped_while_crashed() {
    let (mut node, _mailbox, mut a, mut c) = crashed_middle_node().await;

    deliver(&mut node, &a, Message::Privilege).await;
    deliver(&mut node, &c, Message::Request).await;
    deliver(&mut node, &a, Message::Initialize).await;
    deliver(&mut node, &c, Message::Restart).await;

    assert_eq!(holder_id(&node), None);
    assert!(queue_ids(&node).is_empty());
    assert_no_message(&mut a);
    assert_no_message(&mut c);
}

#[tokio::test]
async fn test_user_request_refused_while_crashed() {
    let (mut node, _mailbox, _a, _c) = crashed_middle_node().await;

    deliver_self(&mut node, Message::Command(UserCommand::Request)).await;

    assert!(queue_ids(&node).is_empty());
    assert!(node.phase.is_crashed());
}

#[tokio::test]
async fn test_inspect_answers_while_crashed() {
    let (mut node, _mailbox, _a, _c) = crashed_middle_node().await;

    let (reply_tx, reply_rx) = oneshot::channel();
    deliver_self(&mut node, Message::Command(UserCommand::Inspect(reply_tx))).await;

    let snapshot = reply_rx.await.unwrap();
    assert!(snapshot.phase.is_crashed());
    assert_eq!(snapshot.holder, None);
    assert!(snapshot.request_queue.is_empty());
}

#[tokio::test]
async fn test_restart_is_answered_with_edge_view() {
    let (mut node, _mailbox) = make_node(1);
    let mut a = make_peer(0);
    let mut c = make_peer(2);
    bootstrap(&mut node, &[&a, &c], false).await;
    initialize_from(&mut node, &a).await;
    drain(&mut c);

    // C's request is pending and the upward ask to A is outstanding
    deliver(&mut node, &c, Message::Request).await;
    drain(&mut a);

    deliver(&mut node, &c, Message::Restart).await;
    match expect_message(&mut c) {
        Message::Advise(advisory) => {
            assert!(!advisory.peer_is_holder);
            assert!(advisory.peer_in_request_queue);
            assert!(advisory.asked);
        }
        other => panic!("expected Advise, got {}", other.kind()),
    }

    deliver(&mut node, &a, Message::Restart).await;
    match expect_message(&mut a) {
        Message::Advise(advisory) => {
            // The holder edge points at A
            assert!(advisory.peer_is_holder);
            assert!(!advisory.peer_in_request_queue);
            assert!(advisory.asked);
        }
        other => panic!("expected Advise, got {}", other.kind()),
    }
}
