mod common;

use common::router_pair;
use synframe::{Config, GameEvent, PlayerType, SessionBuilder, SessionEvent, SessionKind};

/// Fulfills a batch of `GameEvent`s the way a deterministic embedder would:
/// a state's checksum is a pure function of its frame, so replaying the
/// same frame from a Load always reproduces the same checksum regardless
/// of how many times it gets resimulated.
fn fulfill(events: Vec<GameEvent>) -> Vec<i32> {
    let mut confirmed = Vec::new();
    for event in events {
        match event {
            GameEvent::Save { frame, cell } => cell.save(frame, vec![frame as u8], frame as u32),
            GameEvent::Load { cell, .. } => {
                let _ = cell.load();
            }
            GameEvent::Advance { frame, rolling_back, .. } => {
                if !rolling_back {
                    confirmed.push(frame);
                }
            }
        }
    }
    confirmed
}

fn two_player_config() -> Config {
    Config {
        num_players: 2,
        input_size: 1,
        input_prediction_window: 6,
        ..Config::default()
    }
    .validate()
    .unwrap()
}

#[test]
fn two_remote_peers_sync_and_advance() {
    let (_router, mut sock_a, mut sock_b) = router_pair();

    let mut builder_a = SessionBuilder::<usize>::new(SessionKind::Game)
        .with_config(two_player_config())
        .unwrap();
    let a_local = builder_a.add_actor(PlayerType::Local, None).unwrap();
    let a_remote = builder_a.add_actor(PlayerType::Remote, Some(1)).unwrap();
    let mut a = builder_a.start_game().unwrap();

    let mut builder_b = SessionBuilder::<usize>::new(SessionKind::Game)
        .with_config(two_player_config())
        .unwrap();
    let b_remote = builder_b.add_actor(PlayerType::Remote, Some(0)).unwrap();
    let b_local = builder_b.add_actor(PlayerType::Local, None).unwrap();
    let mut b = builder_b.start_game().unwrap();
    assert_eq!(a_local, b_remote);
    assert_eq!(a_remote, b_local);

    let mut a_started = false;
    let mut b_started = false;
    let mut a_confirmed = Vec::new();
    let mut b_confirmed = Vec::new();

    for tick in 0..400u64 {
        let now_ms = tick * 16;
        a.add_local_input(a_local, &[(tick % 251) as u8]).unwrap();
        b.add_local_input(b_local, &[((tick * 7) % 251) as u8]).unwrap();

        let events_a = a.update_session(&mut sock_a, now_ms);
        a_confirmed.extend(fulfill(events_a));
        for event in a.session_events() {
            if let SessionEvent::SessionStarted = event {
                a_started = true;
            }
        }

        let events_b = b.update_session(&mut sock_b, now_ms);
        b_confirmed.extend(fulfill(events_b));
        for event in b.session_events() {
            if let SessionEvent::SessionStarted = event {
                b_started = true;
            }
        }

        if a_started && b_started && a_confirmed.len() > 50 && b_confirmed.len() > 50 {
            break;
        }
    }

    assert!(a_started, "session A never completed its handshake");
    assert!(b_started, "session B never completed its handshake");
    assert!(a_confirmed.windows(2).all(|w| w[1] >= w[0]));
    assert!(b_confirmed.windows(2).all(|w| w[1] >= w[0]));
    assert!(a_confirmed.len() > 50);
    assert!(b_confirmed.len() > 50);
}

#[test]
fn local_only_session_never_blocks_on_a_peer() {
    let config = Config {
        num_players: 1,
        input_size: 1,
        ..Config::default()
    }
    .validate()
    .unwrap();
    let mut builder = SessionBuilder::<usize>::new(SessionKind::Game)
        .with_config(config)
        .unwrap();
    let local = builder.add_actor(PlayerType::Local, None).unwrap();
    let mut session = builder.start_game().unwrap();
    let (_router, mut sock, _unused) = router_pair();

    let mut confirmed = Vec::new();
    for tick in 0..20u64 {
        session.add_local_input(local, &[tick as u8]).unwrap();
        let events = session.update_session(&mut sock, tick * 16);
        confirmed.extend(fulfill(events));
    }
    assert_eq!(confirmed, (0..20).collect::<Vec<_>>());
}

#[test]
fn local_only_limited_saving_session_saves_on_the_prediction_window() {
    let config = Config {
        num_players: 1,
        input_size: 1,
        input_prediction_window: 4,
        limited_saving: true,
        ..Config::default()
    }
    .validate()
    .unwrap();
    let mut builder = SessionBuilder::<usize>::new(SessionKind::Game)
        .with_config(config)
        .unwrap();
    let local = builder.add_actor(PlayerType::Local, None).unwrap();
    let mut session = builder.start_game().unwrap();
    let (_router, mut sock, _unused) = router_pair();

    let mut saved_frames = Vec::new();
    let mut confirmed = Vec::new();
    for tick in 0..16u64 {
        session.add_local_input(local, &[tick as u8]).unwrap();
        for event in session.update_session(&mut sock, tick * 16) {
            match event {
                GameEvent::Save { frame, cell } => {
                    saved_frames.push(frame);
                    cell.save(frame, vec![frame as u8], frame as u32);
                }
                GameEvent::Load { .. } => panic!("a local-only session never rolls back"),
                GameEvent::Advance { frame, rolling_back, .. } => {
                    assert!(!rolling_back);
                    confirmed.push(frame);
                }
            }
        }
    }
    assert_eq!(confirmed, (0..16).collect::<Vec<_>>());
    assert_eq!(saved_frames, vec![0, 4, 8, 12]);
}
