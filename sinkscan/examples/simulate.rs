//! Discovery Session Simulation
//!
//! Runs the scanner against five simulated sinks on channels 11 to 15 and
//! prints what it learned:
//! - Estimated cycle length (T) and repeat count (N) per channel
//! - Sends that landed in a reception window, per channel
//! - Radio usage: receive duty cycle, tunes, stops and power down
//!
//! # Usage
//! ```text
//! RUST_LOG=sinkscan=debug cargo run --example simulate -- 90
//! ```
//! The optional argument is the session length in seconds (default 60).

use sinkscan::{
    config::ProtocolConfig,
    sim::{SimSink, Simulation},
    time::{Ticks, Timestamp},
};

const DEFAULT_SECONDS: u64 = 60;

fn main() {
    env_logger::init();

    let seconds = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_SECONDS);

    let sinks = [
        SimSink::new(11, Ticks::from_micros(713_417), 4, Timestamp::from_millis(250)),
        SimSink::new(12, Ticks::from_micros(901_223), 7, Timestamp::from_millis(1_900)),
        SimSink::new(13, Ticks::from_micros(1_104_391), 3, Timestamp::from_millis(4_300)),
        SimSink::new(14, Ticks::from_micros(587_009), 9, Timestamp::from_millis(700)),
        SimSink::new(15, Ticks::from_micros(1_233_761), 5, Timestamp::from_millis(2_600)),
    ];

    let mut simulation = match Simulation::new(ProtocolConfig::simulation(), &sinks) {
        Ok(simulation) => simulation,
        Err(error) => {
            eprintln!("invalid configuration: {:?}", error);
            std::process::exit(1);
        }
    };

    let end = Timestamp::from_secs(seconds);
    let report = match simulation.run_until(end) {
        Ok(report) => report,
        Err(error) => {
            eprintln!("simulation failed: {:?}", error);
            std::process::exit(1);
        }
    };

    println!("session of {} s", seconds);
    println!("channel  T (us)     N   resolved  hits");
    for sink in &sinks {
        let Some(estimate) = report.estimate(sink.channel) else {
            continue;
        };
        let cycle_length = estimate
            .cycle_length
            .map_or_else(|| "-".to_string(), |t| t.ticks().to_string());
        let repeat_count = estimate
            .repeat_count
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        println!(
            "{:<8} {:<10} {:<3} {:<9} {}",
            sink.channel,
            cycle_length,
            repeat_count,
            estimate.resolved,
            report.hits_for(sink.channel)
        );
    }

    println!(
        "sends: {} ({} hits, {} misses, {} still pending)",
        report.transmissions.len(),
        report.hits(),
        report.misses(),
        report.pending_sends
    );
    println!(
        "radio: {:.1}% receive duty cycle, {} tunes, {} stops",
        report.usage.duty_cycle(end),
        report.usage.tunes,
        report.usage.stops
    );
    match report.usage.powered_down_at {
        Some(at) => println!("powered down at {} us", at.ticks()),
        None => println!("still listening"),
    }
}
