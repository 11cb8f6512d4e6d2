use std::time::{Duration, Instant};

use gain_plugin::spa_descriptor;
use spa::{OscArg, State};
use spa_host::{Host, HostConfig, LoadedModule};

fn gain_host(config: HostConfig) -> Host {
    let module = unsafe { LoadedModule::from_loader(spa_descriptor, None, None) }.unwrap();
    Host::instantiate(module, config).unwrap()
}

#[test]
fn gain_follows_control_messages() {
    let mut host = gain_host(HostConfig::default());
    assert_eq!(host.state(), State::Active);
    assert!(!host.module().is_dynamic());

    let input = [0.1f32; 10];
    for t in 0..10 {
        let gain = (t % 10) as f32 / 10.0;
        assert!(host.send("/gain", &[OscArg::Float(gain)]).unwrap());
        let (left, right) = host.run_block(&input, &input).unwrap();
        assert_eq!(left.len(), 10);
        for &sample in left.iter().chain(right) {
            assert!(
                (sample - 0.1 * gain).abs() < 1e-4,
                "block {t}: expected {}, got {sample}",
                0.1 * gain
            );
        }
    }
    host.shutdown().unwrap();
}

#[test]
fn rejected_messages_do_not_stop_processing() {
    let mut host = gain_host(HostConfig::default());
    host.send("/gain", &[OscArg::Float(0.5)]).unwrap();
    host.send("/pan", &[OscArg::Float(1.0)]).unwrap();
    host.send("/gain", &[OscArg::Str("loud")]).unwrap();

    let (left, _) = host.run_block(&[1.0; 4], &[1.0; 4]).unwrap();
    assert_eq!(left, &[0.5; 4]);
    assert_eq!(host.state(), State::Active);
}

#[test]
fn short_blocks_only_touch_their_frames() {
    let mut host = gain_host(HostConfig {
        block_size: 16,
        ..HostConfig::default()
    });
    host.send("/gain", &[OscArg::Float(2.0)]).unwrap();
    let (left, right) = host.run_block(&[1.0; 3], &[-1.0; 3]).unwrap();
    assert_eq!(left, &[2.0; 3]);
    assert_eq!(right, &[-2.0; 3]);
    assert!(host.output().0[3..].iter().all(|&s| s == 0.0));
}

#[test]
fn full_control_ring_drops_and_counts() {
    let mut host = gain_host(HostConfig::default());
    let mut sent = 0u64;
    while host.send("/gain", &[OscArg::Float(1.0)]).unwrap() {
        sent += 1;
    }
    assert!(sent > 0);
    assert_eq!(host.dropped_messages(), 1);

    host.run().unwrap();
    assert!(host.send("/gain", &[OscArg::Float(0.0)]).unwrap());
}

#[test]
fn save_load_and_restore_through_tickets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gain.json");
    let mut host = gain_host(HostConfig::default());

    host.send("/gain", &[OscArg::Float(0.25)]).unwrap();
    host.run().unwrap();
    assert!(host.save(&path).unwrap());
    assert_eq!(host.state(), State::Active);

    let saved: gain_plugin::GainState =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(saved.gain, 0.25);

    host.send("/gain", &[OscArg::Float(1.0)]).unwrap();
    host.run().unwrap();
    assert!(host.load(&path).unwrap());
    let (left, _) = host.run_block(&[1.0; 2], &[1.0; 2]).unwrap();
    assert_eq!(left, &[0.25; 2]);

    host.send("/gain", &[OscArg::Float(0.8)]).unwrap();
    host.run().unwrap();
    assert!(host.restore().unwrap());
    let (left, _) = host.run_block(&[1.0; 2], &[1.0; 2]).unwrap();
    assert_eq!(left, &[0.25; 2]);
}

#[test]
fn loading_a_missing_state_file_fails_without_waiting_out_the_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let config = HostConfig::default();
    let timeout = Duration::from_millis(config.ticket_timeout_ms);
    let mut host = gain_host(config);

    let started = Instant::now();
    assert!(!host.load(&dir.path().join("absent.json")).unwrap());
    assert!(started.elapsed() < timeout / 2);
    assert_eq!(host.state(), State::Active);
}

#[test]
fn metadata_describes_the_plugin() {
    let host = gain_host(HostConfig::default());
    let metadata = host.metadata();
    assert_eq!(metadata.unique_name, "localhost::spa::master");
    assert_eq!(metadata.label, "gain");
    assert_eq!(
        metadata.ports,
        ["in", "out", "buffersize", "samplecount", "osc"]
    );
    assert!(metadata.save_has && metadata.load_has && metadata.restore_has);

    let json = serde_json::to_value(metadata).unwrap();
    assert_eq!(json["license"], "gpl3");
}

