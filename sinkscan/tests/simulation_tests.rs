use sinkscan::{
    config::{ChannelSpec, ProtocolConfig},
    protocol::RotationState,
    sim::{SimSink, Simulation},
    time::{Ticks, Timestamp},
};

fn config(channels: &[u8]) -> ProtocolConfig {
    let specs: Vec<ChannelSpec> = channels
        .iter()
        .map(|&id| ChannelSpec::new(id, u16::from(id)))
        .collect();
    ProtocolConfig::simulation().with_channels(&specs).unwrap()
}

#[test]
fn test_single_sink_is_resolved_and_served() {
    let sinks = [SimSink::new(11, Ticks::from_secs(1), 4, Timestamp::ZERO)];
    let mut simulation = Simulation::new(config(&[11]), &sinks).unwrap();

    let report = simulation.run_until(Timestamp::from_secs(60)).unwrap();

    let estimate = report.estimate(11).unwrap();
    assert_eq!(estimate.cycle_length, Some(Ticks::from_secs(1)));
    assert_eq!(estimate.repeat_count, Some(4));
    assert!(report.all_resolved());

    // one send after T was learned, three after the channel was resolved
    let times: Vec<Timestamp> = report.transmissions.iter().map(|tx| tx.at).collect();
    assert_eq!(
        times,
        vec![
            Timestamp::from_secs(4),
            Timestamp::from_secs(19),
            Timestamp::from_secs(34),
            Timestamp::from_secs(49)
        ]
    );
    assert_eq!(report.hits(), 4);
    assert_eq!(report.misses(), 0);
    assert_eq!(report.pending_sends, 0);

    assert_eq!(report.usage.stops, 2);
    assert_eq!(report.usage.transmissions, 4);
    assert_eq!(report.usage.powered_down_at, Some(Timestamp::from_secs(15)));
    assert_eq!(simulation.scanner().state(), RotationState::RadioStopped);
}

#[test]
fn test_run_is_resumable() {
    let sinks = [SimSink::new(11, Ticks::from_secs(1), 4, Timestamp::ZERO)];
    let mut simulation = Simulation::new(config(&[11]), &sinks).unwrap();

    let first = simulation.run_until(Timestamp::from_secs(10)).unwrap();
    assert_eq!(first.transmissions.len(), 1);
    assert!(!first.all_resolved());
    assert_eq!(simulation.now(), Timestamp::from_secs(10));

    let second = simulation.run_until(Timestamp::from_secs(60)).unwrap();
    assert_eq!(second.transmissions.len(), 4);
    assert!(second.all_resolved());
}

#[test]
fn test_several_sinks_only_hit_windows() {
    let sinks = [
        SimSink::new(11, Ticks::from_micros(713_417), 4, Timestamp::from_millis(250)),
        SimSink::new(12, Ticks::from_micros(901_223), 7, Timestamp::from_millis(1_900)),
        SimSink::new(13, Ticks::from_micros(1_104_391), 3, Timestamp::from_millis(4_300)),
    ];
    let mut simulation = Simulation::new(config(&[11, 12, 13]), &sinks).unwrap();

    let report = simulation.run_until(Timestamp::from_secs(120)).unwrap();

    // channel 11 is heard first: 4 at 0.25 s, then 3 one T later
    let first = report.estimate(11).unwrap();
    assert_eq!(first.cycle_length, Some(Ticks::from_micros(713_417)));
    assert!(report.hits_for(11) >= 1);
    assert_eq!(
        report.transmissions.first().map(|tx| tx.at),
        Some(Timestamp::from_micros(3_103_668))
    );

    for sink in &sinks {
        let estimate = report.estimate(sink.channel).unwrap();
        if let Some(cycle_length) = estimate.cycle_length {
            assert_eq!(cycle_length, sink.cycle_length);
        }
        if let Some(repeat_count) = estimate.repeat_count {
            assert_eq!(repeat_count, sink.repeat_count);
        }
        if estimate.resolved {
            assert!(estimate.cycle_length.is_some() && estimate.repeat_count.is_some());
        }
    }

    assert_eq!(report.misses(), 0);
    assert_eq!(
        report.usage.transmissions as usize,
        report.transmissions.len()
    );
}

#[test]
fn test_silent_channel_never_resolves() {
    let sinks = [SimSink::new(11, Ticks::from_secs(1), 4, Timestamp::ZERO)];
    let mut simulation = Simulation::new(config(&[11, 12]), &sinks).unwrap();

    let report = simulation.run_until(Timestamp::from_secs(60)).unwrap();

    let silent = report.estimate(12).unwrap();
    assert_eq!(silent.cycle_length, None);
    assert!(!silent.resolved);
    assert!(!report.all_resolved());
    assert_eq!(report.misses(), 0);
    assert!(report.usage.powered_down_at.is_none());
}

#[test]
fn test_firmware_preset_outlasts_listen_window() {
    // every sink first wakes after the 20 s listen window closed
    let sinks = [
        SimSink::new(0, Ticks::from_secs(1), 4, Timestamp::from_secs(25)),
        SimSink::new(1, Ticks::from_secs(1), 4, Timestamp::from_secs(25)),
        SimSink::new(2, Ticks::from_secs(1), 4, Timestamp::from_secs(25)),
    ];
    let mut simulation = Simulation::new(ProtocolConfig::firmware(), &sinks).unwrap();

    let report = simulation.run_until(Timestamp::from_secs(600)).unwrap();

    for sink in &sinks {
        let estimate = report.estimate(sink.channel).unwrap();
        assert_eq!(estimate.cycle_length, Some(sink.cycle_length));
        assert_eq!(estimate.repeat_count, Some(sink.repeat_count));
    }
    assert!(report.all_resolved());
    assert!(!report.transmissions.is_empty());
    assert_eq!(report.misses(), 0);
    assert_eq!(simulation.scanner().state(), RotationState::RadioStopped);
}
