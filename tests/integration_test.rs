use codebattles::gateway::RecordingGateway;
use codebattles::protocol::{ClientMessage, ServerMessage};
use codebattles::state::AppState;
use codebattles::types::{GamePhase, PlayerId, Reward, RewardKind, RoomCode};
use codebattles::ws::handlers::{handle_disconnect, handle_message};
use std::sync::Arc;

async fn join(
    state: &AppState,
    gateway: &RecordingGateway,
    conn_id: &str,
    username: &str,
    room_code: Option<&str>,
) -> (PlayerId, RoomCode) {
    handle_message(
        state,
        gateway,
        &conn_id.to_string(),
        ClientMessage::JoinRoom {
            username: username.to_string(),
            room_code: room_code.map(|c| c.to_string()),
        },
    )
    .await;
    state
        .resolve_connection(&conn_id.to_string())
        .await
        .expect("join should register the connection")
}

/// End-to-end flow: join, start, solve, eliminate, crown a winner
#[tokio::test]
async fn test_full_game_flow() {
    let state = AppState::new();
    let gateway = RecordingGateway::new();

    // 1. Alice creates a room; Bob and Carol join by code
    let (alice, code) = join(&state, &gateway, "conn-alice", "Alice", None).await;
    let (bob, bob_code) = join(&state, &gateway, "conn-bob", "Bob", Some(&code)).await;
    let (carol, _) = join(&state, &gateway, "conn-carol", "Carol", Some(&code)).await;
    assert_eq!(bob_code, code);

    // join announces to the room and snapshots to the joiner
    let joins: Vec<_> = gateway
        .broadcasts_to(&code)
        .into_iter()
        .filter(|m| matches!(m, ServerMessage::PlayerJoined { .. }))
        .collect();
    assert_eq!(joins.len(), 3);
    match &gateway.sent_to("conn-carol")[..] {
        [ServerMessage::GameState {
            players,
            game_status,
            ..
        }] => {
            assert_eq!(players.len(), 3);
            assert_eq!(*game_status, GamePhase::Lobby);
        }
        other => panic!("unexpected sends to carol: {:?}", other),
    }
    gateway.take();

    // 2. Only the host can start
    handle_message(
        &state,
        &gateway,
        &"conn-bob".to_string(),
        ClientMessage::StartGame,
    )
    .await;
    match &gateway.sent_to("conn-bob")[..] {
        [ServerMessage::Error { message }] => assert_eq!(message, "Only host can start game"),
        other => panic!("unexpected sends to bob: {:?}", other),
    }
    gateway.take();

    handle_message(
        &state,
        &gateway,
        &"conn-alice".to_string(),
        ClientMessage::StartGame,
    )
    .await;
    let card_id = match &gateway.broadcasts_to(&code)[..] {
        [ServerMessage::GameStarted { players }] => {
            assert_eq!(players.len(), 3);
            for player in players {
                assert_eq!(player.cards.len(), 5);
                assert!(player.timer_end_time.is_some());
                assert!(!player.is_eliminated);
            }
            players[0].cards[0].id.clone()
        }
        other => panic!("unexpected broadcasts: {:?}", other),
    };
    gateway.take();

    // 3. Alice selects a card and solves it via the debug marker
    handle_message(
        &state,
        &gateway,
        &"conn-alice".to_string(),
        ClientMessage::SelectCard {
            card_id: card_id.clone(),
        },
    )
    .await;
    assert!(matches!(
        &gateway.broadcasts_to(&code)[..],
        [ServerMessage::CardSelected { .. }]
    ));
    gateway.take();

    handle_message(
        &state,
        &gateway,
        &"conn-alice".to_string(),
        ClientMessage::SubmitSolution {
            card_id: card_id.clone(),
            code: "# DEBUG: Auto-complete".to_string(),
        },
    )
    .await;
    let passed: Vec<_> = gateway
        .broadcasts_to(&code)
        .into_iter()
        .filter(|m| matches!(m, ServerMessage::SolutionPassed { .. }))
        .collect();
    match &passed[..] {
        [ServerMessage::SolutionPassed {
            player_id,
            test_results,
            new_card,
            ..
        }] => {
            assert_eq!(player_id, &alice);
            assert_eq!(test_results.len(), 1);
            assert_ne!(new_card.id, card_id);
        }
        other => panic!("unexpected broadcasts: {:?}", other),
    }
    {
        // solved card left the hand, replacement arrived, selection cleared
        let rooms = state.rooms.read().await;
        let player = &rooms[&code].players[&alice];
        assert_eq!(player.cards.len(), 5);
        assert!(player.cards.iter().all(|c| c.id != card_id));
        assert!(player.selected_card.is_none());
    }
    gateway.take();

    // 4. Bob and Carol run out of time; Alice wins exactly once
    handle_message(
        &state,
        &gateway,
        &"conn-bob".to_string(),
        ClientMessage::PlayerEliminated,
    )
    .await;
    assert!(!gateway
        .broadcasts_to(&code)
        .iter()
        .any(|m| matches!(m, ServerMessage::GameEnded { .. })));

    handle_message(
        &state,
        &gateway,
        &"conn-carol".to_string(),
        ClientMessage::PlayerEliminated,
    )
    .await;
    // repeat self-report must not re-announce anything
    handle_message(
        &state,
        &gateway,
        &"conn-carol".to_string(),
        ClientMessage::PlayerEliminated,
    )
    .await;

    let ended: Vec<_> = gateway
        .broadcasts_to(&code)
        .into_iter()
        .filter(|m| matches!(m, ServerMessage::GameEnded { .. }))
        .collect();
    match &ended[..] {
        [ServerMessage::GameEnded {
            winner,
            winner_name,
        }] => {
            assert_eq!(winner.as_ref(), Some(&alice));
            assert_eq!(winner_name.as_deref(), Some("Alice"));
        }
        other => panic!("expected exactly one game_ended, got {:?}", other),
    }
    let _ = (bob, carol);

    // 5. The ended room persists for late state queries until everyone leaves
    handle_disconnect(&state, &gateway, &"conn-bob".to_string()).await;
    handle_disconnect(&state, &gateway, &"conn-carol".to_string()).await;
    assert!(state.rooms.read().await.contains_key(&code));
    handle_disconnect(&state, &gateway, &"conn-alice".to_string()).await;
    assert!(!state.rooms.read().await.contains_key(&code));
}

#[tokio::test]
async fn test_joining_unknown_room_fails_without_side_effects() {
    let state = AppState::new();
    let gateway = RecordingGateway::new();

    handle_message(
        &state,
        &gateway,
        &"conn-1".to_string(),
        ClientMessage::JoinRoom {
            username: "Alice".to_string(),
            room_code: Some("ZZZZ99".to_string()),
        },
    )
    .await;

    match &gateway.sent_to("conn-1")[..] {
        [ServerMessage::JoinError { message }] => {
            assert_eq!(message, "Room ZZZZ99 not found");
        }
        other => panic!("unexpected sends: {:?}", other),
    }
    assert!(state.rooms.read().await.is_empty());
    assert!(state.resolve_connection(&"conn-1".to_string()).await.is_none());
}

#[tokio::test]
async fn test_room_codes_are_case_insensitive_on_join() {
    let state = AppState::new();
    let gateway = RecordingGateway::new();

    let (_, code) = join(&state, &gateway, "conn-1", "Alice", None).await;
    let lowered = code.to_lowercase();
    let (_, joined) = join(&state, &gateway, "conn-2", "Bob", Some(&lowered)).await;
    assert_eq!(joined, code);
}

#[tokio::test]
async fn test_disconnect_during_play_crowns_the_survivor() {
    let state = AppState::new();
    let gateway = RecordingGateway::new();

    let (_, code) = join(&state, &gateway, "conn-alice", "Alice", None).await;
    let (bob, _) = join(&state, &gateway, "conn-bob", "Bob", Some(&code)).await;
    handle_message(
        &state,
        &gateway,
        &"conn-alice".to_string(),
        ClientMessage::StartGame,
    )
    .await;
    gateway.take();

    handle_disconnect(&state, &gateway, &"conn-alice".to_string()).await;

    let events = gateway.broadcasts_to(&code);
    assert!(events
        .iter()
        .any(|m| matches!(m, ServerMessage::PlayerLeft { .. })));
    match events
        .iter()
        .find(|m| matches!(m, ServerMessage::GameEnded { .. }))
    {
        Some(ServerMessage::GameEnded { winner, .. }) => {
            assert_eq!(winner.as_ref(), Some(&bob));
        }
        other => panic!("expected game_ended, got {:?}", other),
    }

    // Bob is still connected, so the room survives
    assert!(state.rooms.read().await.contains_key(&code));
    handle_disconnect(&state, &gateway, &"conn-bob".to_string()).await;
    assert!(!state.rooms.read().await.contains_key(&code));
}

#[tokio::test]
async fn test_targeted_debuff_roundtrip() {
    let state = AppState::new();
    let gateway = RecordingGateway::new();

    let (alice, code) = join(&state, &gateway, "conn-alice", "Alice", None).await;
    let (bob, _) = join(&state, &gateway, "conn-bob", "Bob", Some(&code)).await;
    handle_message(
        &state,
        &gateway,
        &"conn-alice".to_string(),
        ClientMessage::StartGame,
    )
    .await;
    gateway.take();

    // resolving with nothing pending is an error
    handle_message(
        &state,
        &gateway,
        &"conn-alice".to_string(),
        ClientMessage::ApplyTargetedDebuff {
            target_player_id: bob.clone(),
        },
    )
    .await;
    match &gateway.sent_to("conn-alice")[..] {
        [ServerMessage::Error { message }] => assert_eq!(message, "No pending reward"),
        other => panic!("unexpected sends: {:?}", other),
    }
    gateway.take();

    // phase 1: the actor is asked to pick a target
    handle_message(
        &state,
        &gateway,
        &"conn-alice".to_string(),
        ClientMessage::DebugTriggerReward {
            reward: Reward::RemoveTimeTargeted { amount: 40 },
        },
    )
    .await;
    match &gateway.sent_to("conn-alice")[..] {
        [ServerMessage::TargetSelectionRequired {
            effect: RewardKind::RemoveTimeTargeted,
            value: 40,
            available_targets,
        }] => {
            assert_eq!(available_targets.len(), 1);
            assert_eq!(available_targets[0].player_id, bob);
        }
        other => panic!("unexpected sends: {:?}", other),
    }
    assert!(gateway.broadcasts_to(&code).is_empty());
    let bob_before = state.rooms.read().await[&code].players[&bob]
        .timer_end_time
        .unwrap();
    gateway.take();

    // phase 2: the hit lands, clamped, and the room hears about it
    handle_message(
        &state,
        &gateway,
        &"conn-alice".to_string(),
        ClientMessage::ApplyTargetedDebuff {
            target_player_id: bob.clone(),
        },
    )
    .await;
    match &gateway.broadcasts_to(&code)[..] {
        [ServerMessage::RewardApplied {
            effect: RewardKind::RemoveTimeTargeted,
            value: 40,
            player_id,
            from_player,
            target_name,
            ..
        }] => {
            assert_eq!(player_id.as_ref(), Some(&bob));
            assert_eq!(from_player.as_ref(), Some(&alice));
            assert_eq!(target_name.as_deref(), Some("Bob"));
        }
        other => panic!("unexpected broadcasts: {:?}", other),
    }
    let bob_after = state.rooms.read().await[&code].players[&bob]
        .timer_end_time
        .unwrap();
    assert_eq!(bob_after, bob_before - 40_000);
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let state = AppState::new();
    let gateway = RecordingGateway::new();

    let (_, code_a) = join(&state, &gateway, "conn-1", "Alice", None).await;
    let (_, code_b) = join(&state, &gateway, "conn-2", "Bob", None).await;
    assert_ne!(code_a, code_b);
    gateway.take();

    // Bob is host of his own room; starting it leaves room A untouched
    handle_message(
        &state,
        &gateway,
        &"conn-2".to_string(),
        ClientMessage::StartGame,
    )
    .await;

    assert!(gateway.broadcasts_to(&code_a).is_empty());
    let rooms = state.rooms.read().await;
    assert_eq!(rooms[&code_a].phase, GamePhase::Lobby);
    assert_eq!(rooms[&code_b].phase, GamePhase::Playing);
}

/// The submitter disconnects while grading is suspended: the result is
/// dropped on resume and the room is only reaped once grading finishes.
#[tokio::test]
async fn test_submission_survives_disconnect_race() {
    if std::process::Command::new("python3")
        .arg("--version")
        .output()
        .is_err()
    {
        eprintln!("skipping: python3 not available");
        return;
    }

    let state = AppState::new();
    let gateway = Arc::new(RecordingGateway::new());

    let (_, code) = join(&state, &gateway, "conn-alice", "Alice", None).await;
    handle_message(
        &state,
        gateway.as_ref(),
        &"conn-alice".to_string(),
        ClientMessage::StartGame,
    )
    .await;
    let card_id = state.rooms.read().await[&code]
        .players
        .values()
        .next()
        .unwrap()
        .cards[0]
        .id
        .clone();
    handle_message(
        &state,
        gateway.as_ref(),
        &"conn-alice".to_string(),
        ClientMessage::SelectCard {
            card_id: card_id.clone(),
        },
    )
    .await;
    gateway.take();

    // slow but correct submission: grading suspends for ~1s
    let slow_code = "import time\ntime.sleep(1)\n\ndef twoSum(nums, target):\n    return [0, 1]";
    let submit = {
        let state = state.clone();
        let gateway = gateway.clone();
        let card_id = card_id.clone();
        tokio::spawn(async move {
            handle_message(
                &state,
                gateway.as_ref(),
                &"conn-alice".to_string(),
                ClientMessage::SubmitSolution {
                    card_id,
                    code: slow_code.to_string(),
                },
            )
            .await;
        })
    };

    // let the submission pass validation and enter the sandbox
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    handle_disconnect(&state, gateway.as_ref(), &"conn-alice".to_string()).await;

    // the room is empty but must survive while grading is in flight
    assert!(state.rooms.read().await.contains_key(&code));

    submit.await.unwrap();

    // stale result dropped, room reaped after resumption
    assert!(!gateway
        .broadcasts_to(&code)
        .iter()
        .any(|m| matches!(m, ServerMessage::SolutionPassed { .. })));
    assert!(!state.rooms.read().await.contains_key(&code));
}

#[tokio::test]
async fn test_get_game_state_reflects_current_room() {
    let state = AppState::new();
    let gateway = RecordingGateway::new();

    let (alice, code) = join(&state, &gateway, "conn-alice", "Alice", None).await;
    join(&state, &gateway, "conn-bob", "Bob", Some(&code)).await;
    handle_message(
        &state,
        &gateway,
        &"conn-alice".to_string(),
        ClientMessage::StartGame,
    )
    .await;
    gateway.take();

    handle_message(
        &state,
        &gateway,
        &"conn-alice".to_string(),
        ClientMessage::GetGameState,
    )
    .await;
    match &gateway.sent_to("conn-alice")[..] {
        [ServerMessage::GameState {
            players,
            game_status,
            room_code,
            winner,
        }] => {
            assert_eq!(players.len(), 2);
            assert_eq!(players[0].id, alice, "host listed first");
            assert_eq!(*game_status, GamePhase::Playing);
            assert_eq!(room_code, &code);
            assert!(winner.is_none());
        }
        other => panic!("unexpected sends: {:?}", other),
    }
}
