mod common;

use common::router_pair;
use synframe::{Config, GameEvent, PlayerType, SessionBuilder, SessionEvent, SessionKind};

#[test]
fn spectator_plays_back_hosts_confirmed_input_behind_a_delay() {
    let (_router, mut sock_host, mut sock_spectator) = router_pair();

    let host_config = Config {
        num_players: 1,
        max_spectators: 1,
        input_size: 1,
        ..Config::default()
    }
    .validate()
    .unwrap();
    let mut host_builder = SessionBuilder::<usize>::new(SessionKind::Game)
        .with_config(host_config)
        .unwrap();
    let host_local = host_builder.add_actor(PlayerType::Local, None).unwrap();
    host_builder.add_actor(PlayerType::Spectator, Some(1)).unwrap();
    let mut host = host_builder.start_game().unwrap();

    let spectator_config = Config {
        num_players: 1,
        input_size: 1,
        spectator_delay: 3,
        ..Config::default()
    }
    .validate()
    .unwrap();
    let mut spectator_builder = SessionBuilder::<usize>::new(SessionKind::Spectator)
        .with_config(spectator_config)
        .unwrap();
    spectator_builder.add_actor(PlayerType::Remote, Some(0)).unwrap();
    let mut spectator = spectator_builder.start_spectator().unwrap();

    let mut played_frames = Vec::new();
    let mut saw_started = false;
    let mut saw_unpaused = false;

    for tick in 0..300u64 {
        let now_ms = tick * 16;
        host.add_local_input(host_local, &[(tick % 251) as u8]).unwrap();
        for event in host.update_session(&mut sock_host, now_ms) {
            if let GameEvent::Save { frame, cell } = event {
                cell.save(frame, vec![frame as u8], frame as u32);
            }
        }

        for event in spectator.update_session(&mut sock_spectator, now_ms) {
            if let GameEvent::Advance { frame, .. } = event {
                played_frames.push(frame);
            }
        }
        for event in spectator.session_events() {
            match event {
                SessionEvent::SessionStarted => saw_started = true,
                SessionEvent::SpectatorUnpaused => saw_unpaused = true,
                _ => {}
            }
        }

        if played_frames.len() > 40 {
            break;
        }
    }

    assert!(saw_started, "spectator never finished its handshake with the host");
    assert!(saw_unpaused, "spectator never left its initial paused state");
    assert!(played_frames.windows(2).all(|w| w[1] == w[0] + 1));
    assert!(played_frames.len() > 40);
}
