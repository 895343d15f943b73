use artifact_rs::{
    annotate_movement, annotate_muscle_zscore, compute_average_dev_head_t, Annotation,
    ArtifactConfig, ArtifactError, Channel, ChannelType, CollectingReporter, HeadPoseSample,
    MovementDetector, MovementLimits, MuscleConfig, MuscleDetector, RecordingTiming, SampleSpan,
    SignalBuffer, MUSCLE_DESCRIPTION,
};
use nalgebra::Point3;
use std::f64::consts::PI;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Uniform noise in [-1, 1) from a 64-bit LCG
fn noise(seed: u64, n: usize) -> Vec<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
        })
        .collect()
}

/// 8 EMG channels, 10 s at 1 kHz, with a 120 Hz burst between 5 and 6 s
fn emg_with_burst() -> SignalBuffer {
    let sample_rate = 1000.0;
    let n = 10_000;
    let channels = (0..8)
        .map(|ch| {
            let mut samples = noise(ch as u64 + 1, n);
            for (i, v) in samples.iter_mut().enumerate().take(6000).skip(5000) {
                *v += 10.0 * (2.0 * PI * 120.0 * i as f64 / sample_rate).sin();
            }
            Channel::new(format!("EMG{:03}", ch), ChannelType::Emg, samples)
        })
        .collect();
    SignalBuffer::new(sample_rate, 0, channels).unwrap()
}

fn covers(annotation: &Annotation, time: f64) -> bool {
    annotation.onset <= time && time < annotation.offset()
}

/// Poses at 10 Hz over 10 s; the head sits 2 cm higher from 5.0 to 5.5 s
fn poses_with_shift() -> Vec<HeadPoseSample> {
    (0..100)
        .map(|i| {
            let z = if (50..55).contains(&i) { 0.06 } else { 0.04 };
            HeadPoseSample::new(i as f64 / 10.0, [0.0; 3], [0.0, 0.0, z])
        })
        .collect()
}

fn landmarks() -> Vec<Point3<f64>> {
    vec![
        Point3::new(-0.07, 0.0, 0.0),
        Point3::new(0.0, 0.09, 0.0),
        Point3::new(0.07, 0.0, 0.0),
    ]
}

#[test]
fn test_muscle_burst_detected_with_butterworth() {
    init_logging();
    let signal = emg_with_burst();
    let result = annotate_muscle_zscore(&signal, &[], &MuscleConfig::default()).unwrap();

    assert_eq!(result.scores.len(), signal.n_samples());
    assert!(result.scores[5500] > 4.0, "score at burst: {}", result.scores[5500]);
    assert!(result.scores[1000] < 4.0);

    let burst = result
        .annotations
        .iter()
        .find(|a| covers(a, 5.5))
        .expect("burst annotation");
    // Zero-phase filtering keeps the edges within a few samples of the burst
    assert!((burst.onset - 5.0).abs() < 0.01, "onset {}", burst.onset);
    assert!((burst.offset() - 6.0).abs() < 0.01, "offset {}", burst.offset());
    assert!(!result.annotations.iter().any(|a| covers(a, 1.0)));
    assert!(!result.annotations.iter().any(|a| covers(a, 8.5)));
    assert!(result
        .annotations
        .iter()
        .all(|a| a.description == MUSCLE_DESCRIPTION));
}

#[test]
fn test_muscle_bad_span_masks_burst() {
    init_logging();
    let signal = emg_with_burst();
    let bad = vec![Annotation::new(4.8, 1.4, "BAD_acq_skip")]
        .into_iter()
        .collect::<artifact_rs::Annotations>();
    let spans = bad.bad_spans(&signal.timing);
    assert_eq!(spans.len(), 1);
    assert_eq!((spans[0].start, spans[0].stop), (4800, 6200));

    let detector = MuscleDetector::new(MuscleConfig::default()).unwrap();
    let mut reporter = CollectingReporter::default();
    let result = detector
        .detect_with_reporter(&signal, &spans, &mut reporter)
        .unwrap();

    assert_eq!(result.scores[5500], 4.0);
    assert!(!result.annotations.iter().any(|a| covers(a, 5.5)));
    assert_eq!(reporter.summaries.len(), 1);
}

#[test]
fn test_movement_then_average_transform() {
    init_logging();
    let timing = RecordingTiming::new(1000.0, 0, 10_000).unwrap();
    let pos = poses_with_shift();

    let limits = MovementLimits {
        translation_velocity: Some(0.1),
        ..Default::default()
    };
    let movement = annotate_movement(&pos, &timing, &[], &[], &limits).unwrap();
    let onsets: Vec<f64> = movement.annotations.iter().map(|a| a.onset).collect();
    assert_eq!(onsets.len(), 2);
    assert!((onsets[0] - 4.9).abs() < 1e-9);
    assert!((onsets[1] - 5.4).abs() < 1e-9);

    let baseline = compute_average_dev_head_t(&pos, &timing, &[]).unwrap();
    assert!((baseline.translation().z - 0.041).abs() < 1e-12);

    let mut annotations = movement.annotations;
    annotations.push(Annotation::new(5.0, 0.5, "bad_manual"));
    annotations.push(Annotation::new(1.0, 0.5, "EDGE"));
    let spans = annotations.bad_spans(&timing);
    assert_eq!(spans.len(), 3);

    let cleaned = compute_average_dev_head_t(&pos, &timing, &spans).unwrap();
    assert!((cleaned.translation().z - 0.04).abs() < 1e-12);
    assert!(cleaned.translation().x.abs() < 1e-12);
}

#[test]
fn test_distance_check_flags_shifted_block() {
    init_logging();
    let timing = RecordingTiming::new(1000.0, 0, 10_000).unwrap();
    let limits = MovementLimits {
        mean_distance: Some(0.01),
        ..Default::default()
    };
    let detector = MovementDetector::new(limits, landmarks()).unwrap();
    let mut reporter = CollectingReporter::default();
    let result = detector
        .detect_with_reporter(&poses_with_shift(), &timing, &[], &mut reporter)
        .unwrap();

    assert_eq!(result.annotations.len(), 1);
    let a = result.annotations.iter().next().unwrap();
    assert_eq!(a.description, "BAD_mov_dist");
    assert!((a.onset - 5.0).abs() < 1e-9);
    assert!((a.duration - 0.5).abs() < 1e-9);

    assert_eq!(result.displacement.len(), 100);
    // The last pose covers one sample period, so the mean sits 0.02 * 0.5 / 9.901 above baseline
    let expected = 0.02 * (1.0 - 0.5 / 9.901);
    assert!((result.displacement[52][0] - expected).abs() < 1e-9);
    assert!(result.displacement[10].iter().all(|&d| d < 0.01));
    assert!((reporter.summaries[0].percent - 0.5 / 9.999 * 100.0).abs() < 1e-6);
}

#[test]
fn test_config_drives_detectors() {
    init_logging();
    let config = ArtifactConfig::from_json(
        r#"{
            "muscle": { "threshold": 4.0 },
            "movement": { "translation_velocity": 0.1 }
        }"#,
    )
    .unwrap();

    let signal = emg_with_burst();
    let muscle = MuscleDetector::new(config.muscle.clone())
        .unwrap()
        .detect(&signal, &[])
        .unwrap();
    assert!(!muscle.annotations.is_empty());

    let movement = MovementDetector::new(config.movement, Vec::new())
        .unwrap()
        .detect(&poses_with_shift(), &signal.timing, &[])
        .unwrap();
    assert_eq!(movement.annotations.len(), 2);
}

#[test]
fn test_inverted_bad_spans_are_ignored() {
    init_logging();
    let signal = emg_with_burst();
    let inverted = [SampleSpan::new(900, 100)];
    let clean = annotate_muscle_zscore(&signal, &[], &MuscleConfig::default()).unwrap();
    let result = annotate_muscle_zscore(&signal, &inverted, &MuscleConfig::default()).unwrap();
    assert_eq!(result.annotations, clean.annotations);

    let timing = RecordingTiming::new(1000.0, 0, 10_000).unwrap();
    let pos = poses_with_shift();
    let baseline = compute_average_dev_head_t(&pos, &timing, &[]).unwrap();
    let transform = compute_average_dev_head_t(&pos, &timing, &[SampleSpan::new(150, 50)]).unwrap();
    assert_eq!(transform, baseline);
}

#[test]
fn test_error_classification() {
    let timing = RecordingTiming::new(1000.0, 0, 1000).unwrap();

    let err = MovementDetector::new(
        MovementLimits {
            rotation_velocity: Some(0.0),
            ..Default::default()
        },
        Vec::new(),
    )
    .unwrap_err();
    assert!(err.is_usage_error());
    assert!(!err.is_data_consistency_error());

    let unordered = vec![
        HeadPoseSample::new(0.5, [0.0; 3], [0.0; 3]),
        HeadPoseSample::new(0.2, [0.0; 3], [0.0; 3]),
    ];
    let err = compute_average_dev_head_t(&unordered, &timing, &[]).unwrap_err();
    assert!(matches!(err, ArtifactError::NonIncreasingTimestamps { .. }));

    let late = vec![HeadPoseSample::new(5.0, [0.0; 3], [0.0; 3])];
    let err = compute_average_dev_head_t(&late, &timing, &[]).unwrap_err();
    assert!(err.is_data_consistency_error());
}
