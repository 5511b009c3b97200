use binderjet_core::jetdrive::{
    checksum, BuildError, Command, ControllerKind, DeviceProfile, FrameBuilder, InitState,
    JetDrive, LegacyJetDrive, Settings, Timing, Waveform, FREQBASE,
};
use binderjet_core::protocol::{DeviceEvent, SerialDevice};
use binderjet_core::sim::{SimChannel, SimJetDrive};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

fn standard(firmware_version: u8) -> FrameBuilder {
    FrameBuilder::new(DeviceProfile {
        kind: ControllerKind::Standard,
        firmware_version,
        ..DeviceProfile::default()
    })
}

fn dream(firmware_version: u8) -> FrameBuilder {
    FrameBuilder::new(DeviceProfile {
        firmware_version,
        ..DeviceProfile::default()
    })
}

fn bring_up_sequence() -> Vec<Command> {
    vec![
        Command::Reset,
        Command::GetVersion,
        Command::Pulse,
        Command::ContMode,
        Command::Drops,
        Command::FullFreq,
        Command::StrobeDiv,
        Command::StrobeEnable,
        Command::StrobeDelay,
        Command::Source,
    ]
}

#[test]
fn test_every_frame_is_checksummed() {
    let settings = Settings {
        frequency_hz: 100,
        ..Settings::default()
    };
    for builder in [standard(40), dream(40), standard(0)] {
        for command in Command::ALL {
            let Ok(frame) = builder.build(command, &settings) else {
                continue;
            };
            if frame.is_empty() {
                continue;
            }
            let bytes = frame.bytes();
            let (body, last) = bytes.split_at(bytes.len() - 1);
            assert_eq!(bytes[0], b'S', "{command}");
            assert_eq!(last[0], checksum(body), "{command}");
            assert_eq!(frame.length_byte(), Some((bytes.len() - 2) as u8), "{command}");
        }
    }
}

#[test]
fn test_frequency_divider_decodes_to_request() {
    for frequency_hz in [1000u32, 20000] {
        let settings = Settings {
            frequency_hz,
            ..Settings::default()
        };
        let frame = standard(0).build(Command::Frequency, &settings).unwrap();
        assert_eq!(frame.command(), Some(Command::Frequency));
        let payload = frame.payload();
        let divider = u16::from_be_bytes([payload[0], payload[1]]) as f64;
        let exact = FREQBASE / frequency_hz as f64;
        assert!(
            divider + 0.5 <= exact && exact < divider + 1.5,
            "{frequency_hz} Hz encoded as divider {divider}"
        );
    }
}

#[test]
fn test_low_frequency_depends_on_firmware() {
    let settings = Settings {
        frequency_hz: 100,
        ..Settings::default()
    };

    // Old firmware clamps the divider
    let frame = standard(0).build(Command::Frequency, &settings).unwrap();
    assert_eq!(frame.payload(), &4095u16.to_be_bytes());

    // Newer firmware switches to LOWFREQ
    let frame = standard(40).build(Command::Frequency, &settings).unwrap();
    assert_eq!(frame.command(), Some(Command::LowFreq));
    assert_eq!(frame.payload(), &[100u8]);

    assert_eq!(
        standard(39).build(Command::LowFreq, &settings),
        Err(BuildError::LowFrequencyOutOfRange {
            frequency_hz: 100,
            firmware: 39
        })
    );
}

#[test]
fn test_pulse_layouts() {
    let compact = Waveform {
        rise_us: 0.1,
        fall_us: 0.1,
        final_us: 0.1,
        idle_v: 0,
        dwell_v: 20,
        echo_v: 5,
        ..Waveform::default()
    };
    let crossing = Waveform {
        echo_v: -20,
        ..compact
    };
    let frame_len = |builder: &FrameBuilder, waveform: Waveform| {
        let settings = Settings {
            waveform,
            ..Settings::default()
        };
        builder.build(Command::Pulse, &settings).unwrap().len()
    };

    assert_eq!(frame_len(&standard(0), compact), 8);
    assert_eq!(frame_len(&standard(0), crossing), 11);
    assert_eq!(frame_len(&standard(0), Waveform::default()), 23);
    assert_eq!(frame_len(&dream(0), compact), 23);
}

#[test]
fn test_drops_width() {
    let frame_len = |builder: &FrameBuilder, drops: u16| {
        let settings = Settings {
            drops,
            ..Settings::default()
        };
        builder.build(Command::Drops, &settings).unwrap().len()
    };
    assert_eq!(frame_len(&standard(0), 200), 5);
    assert_eq!(frame_len(&standard(0), 300), 6);
    assert_eq!(frame_len(&dream(0), 200), 6);
}

#[test]
fn test_unanswered_frame_times_out_and_closes() {
    let now = Instant::now();
    let mut jet = JetDrive::default();
    jet.connect("/dev/ttyTEST", now);

    let start = now + jet.timing().connect_delay;
    jet.handle_tick(start);
    assert_eq!(jet.take_outbound().as_deref(), Some(&b"Q"[..]));

    jet.handle_tick(start + Duration::from_millis(2999));
    assert!(jet.is_connected());

    jet.handle_tick(start + Duration::from_millis(3000));
    assert!(!jet.is_connected());
    assert_eq!(jet.init_state(), InitState::NotInitialized);
    assert_eq!(jet.link().queued(), 0);

    let events = jet.drain_events();
    assert!(events.contains(&DeviceEvent::Timeout(
        "Serial IO Timeout: No response from JetDrive (received: [])".into()
    )));

    jet.poll_status(start + Duration::from_secs(4)).unwrap();
    assert_eq!(jet.take_outbound(), None);
    assert_eq!(
        jet.drain_events(),
        vec![DeviceEvent::Error(
            "Can't send command. JetDrive is not connected".into()
        )]
    );
}

fn legacy(sim: SimJetDrive, seed: Option<u64>) -> LegacyJetDrive<SimChannel<SimJetDrive>> {
    let mut channel = SimChannel::new(sim);
    if let Some(seed) = seed {
        channel = channel.with_random_chunks(seed, 3);
    }
    let jet = JetDrive::with_timing(
        DeviceProfile::default(),
        Settings::default(),
        Timing::without_waits(),
    );
    LegacyJetDrive::new(channel, "SIM", jet)
}

#[test]
fn test_blocking_bring_up_against_simulator() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut jet = legacy(SimJetDrive::new().with_firmware_version(42), None);
    jet.bring_up().unwrap();

    assert!(jet.controller().is_initialized());
    assert_eq!(jet.controller().firmware_version(), 42);
    assert_eq!(jet.channel_mut().responder().commands(), bring_up_sequence());

    let events = jet.take_events();
    assert_eq!(events.first(), Some(&DeviceEvent::Response("Connecting to JetDrive".into())));
    assert!(events.contains(&DeviceEvent::Response("JetDrive firmware version 42".into())));
    assert_eq!(events.last(), Some(&DeviceEvent::Response("Connected to JetDrive".into())));
    assert!(!events.iter().any(DeviceEvent::is_error));
}

#[test]
fn test_bring_up_survives_fragmented_replies() {
    for seed in [1, 2, 3] {
        let mut jet = legacy(SimJetDrive::new(), Some(seed));
        jet.bring_up().unwrap();
        assert!(jet.controller().is_initialized(), "seed {seed}");
    }
}

#[test]
fn test_slow_responder_bring_up() {
    let mut jet = legacy(SimJetDrive::new().slow_responder(), Some(11));
    jet.bring_up().unwrap();
    assert!(jet.controller().is_initialized());
    assert_eq!(jet.channel_mut().responder().commands(), bring_up_sequence());
}

#[test]
fn test_settings_after_bring_up() {
    let mut jet = legacy(SimJetDrive::new(), None);
    jet.bring_up().unwrap();

    jet.run(|jet, now| jet.set_continuous_mode_frequency(2000, now))
        .unwrap();
    // Same value again sends nothing
    jet.run(|jet, now| jet.set_continuous_mode_frequency(2000, now))
        .unwrap();
    jet.run(|jet, now| jet.start_continuous_jetting(now)).unwrap();

    let sent = jet.channel_mut().responder().commands();
    assert_eq!(
        &sent[bring_up_sequence().len()..],
        &[
            Command::FullFreq,
            Command::ContMode,
            Command::Source,
            Command::SoftTrigger
        ]
    );
    assert!(jet.controller().settings().continuous);

    jet.disconnect();
    assert!(!jet.controller().is_connected());
}

#[test]
fn test_build_failure_leaves_settings_alone() {
    let mut jet = legacy(SimJetDrive::new(), None);
    jet.bring_up().unwrap();

    let err = jet
        .run(|jet, now| jet.set_continuous_mode_frequency(70_000, now))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "FULLFREQ frequency 70000 Hz does not fit in 16 bits"
    );
    assert_eq!(jet.controller().settings().frequency_hz, 1000);
}
