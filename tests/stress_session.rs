use synframe::{Config, GameEvent, PlayerType, SessionBuilder, SessionEvent, SessionKind};

fn deterministic_checksum(frame: i32) -> u32 {
    frame as u32
}

#[test]
fn deterministic_simulation_passes_every_check() {
    let config = Config {
        num_players: 2,
        input_size: 1,
        check_distance: 5,
        ..Config::default()
    }
    .validate()
    .unwrap();
    let mut builder = SessionBuilder::<usize>::new(SessionKind::Stress)
        .with_config(config)
        .unwrap();
    builder.add_actor(PlayerType::Local, None).unwrap();
    builder.add_actor(PlayerType::Local, None).unwrap();
    let mut session = builder.start_stress().unwrap();

    for tick in 0..30u8 {
        session.add_local_input(0, &[tick]).unwrap();
        session.add_local_input(1, &[tick.wrapping_mul(3)]).unwrap();
        let events = session.update_session().expect("deterministic sim must never desync");
        for event in events {
            if let GameEvent::Save { frame, cell } = event {
                cell.save(frame, vec![frame as u8], deterministic_checksum(frame));
            }
        }
        assert!(session.session_events().is_empty());
    }
}

#[test]
fn a_nondeterministic_save_is_caught_as_a_mismatch() {
    let config = Config {
        num_players: 1,
        input_size: 1,
        check_distance: 3,
        ..Config::default()
    }
    .validate()
    .unwrap();
    let mut builder = SessionBuilder::<usize>::new(SessionKind::Stress)
        .with_config(config)
        .unwrap();
    builder.add_actor(PlayerType::Local, None).unwrap();
    let mut session = builder.start_stress().unwrap();

    let mut saw_mismatch = false;
    for tick in 0..20u8 {
        session.add_local_input(0, &[tick]).unwrap();
        let events = session.update_session().expect("a desync is advisory, never a hard error");
        for event in events {
            if let GameEvent::Save { frame, cell } = event {
                // A simulation with a hidden source of nondeterminism (a
                // stray random seed, uninitialized memory) would save a
                // different checksum each time the same frame is visited.
                // Pretend frame 2 in particular is such a frame.
                let checksum = if frame == 2 { tick as u32 } else { deterministic_checksum(frame) };
                cell.save(frame, vec![frame as u8], checksum);
            }
        }
        for event in session.session_events() {
            if let SessionEvent::DesyncDetected { frame, remote_handle, .. } = event {
                assert_eq!(frame, 2);
                assert_eq!(remote_handle, 0);
                saw_mismatch = true;
            }
        }
    }

    assert!(saw_mismatch, "resimulating a nondeterministic frame must surface as a DesyncDetected event");
    // the session kept running after the desync instead of halting.
    assert!(session.update_session().is_ok());
}
