//! Audio Performance Benchmarks
//!
//! Checks that noise generation, single voice graphs and a full room of
//! voices render well inside the real-time budget.
//!
//! ## Real-Time Audio Constraints
//!
//! For real-time audio, we must process a buffer of samples before the next
//! buffer arrives. The time budget is:
//!
//! ```text
//! time_budget = buffer_size / sample_rate
//! ```
//!
//! | Sample Rate | Buffer 128 | Buffer 256 | Buffer 512 |
//! |-------------|------------|------------|------------|
//! | 44.1 kHz    | 2.90 ms    | 5.80 ms    | 11.61 ms   |
//! | 48 kHz      | 2.67 ms    | 5.33 ms    | 10.67 ms   |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use spatia::context::AudioContext;
use spatia::prelude::*;
use spatia::source::SourceKind;

// ============================================================================
// Constants
// ============================================================================

const SAMPLE_RATES: [f64; 2] = [44100.0, 48000.0];
const BUFFER_SIZES: [usize; 3] = [128, 256, 512];
const VOICE_COUNTS: [usize; 4] = [1, 4, 8, 16];
const PROCEDURAL: [&str; 4] = ["528", "ocean", "rain", "white"];

// ============================================================================
// Helper Functions
// ============================================================================

/// Engine with `voices` procedural instances spread around the listener
fn create_room(sample_rate: f64, voices: usize, use_filters: bool) -> Engine {
    let config = EngineConfig::default()
        .with_sample_rate(sample_rate)
        .with_filters(use_filters);
    let mut engine = Engine::new(config);
    engine.start();

    for i in 0..voices {
        let angle = i as f64 / voices as f64 * std::f64::consts::TAU;
        let position = Position::new(4.0 * angle.cos(), 4.0 * angle.sin());
        let id = engine
            .spawn(PROCEDURAL[i % PROCEDURAL.len()], position)
            .unwrap();
        if i % 2 == 0 {
            engine
                .set_movement(id, MovementKind::Circle, 1.0, 3.0)
                .unwrap();
        }
    }

    // Past the fade-in
    engine.advance(0.5);
    engine
}

// ============================================================================
// Noise Generation
// ============================================================================

fn bench_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("noise");

    for (name, color) in [
        ("white", NoiseColor::White),
        ("pink", NoiseColor::Pink),
        ("brown", NoiseColor::Brown),
    ] {
        group.throughput(Throughput::Elements(88_200));
        group.bench_function(BenchmarkId::new("2s_buffer", name), |b| {
            let mut rng = StdRng::seed_from_u64(1);
            b.iter(|| {
                black_box(NoiseGenerator::generate_with(
                    &mut rng,
                    color,
                    2.0,
                    44100.0,
                ))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Voice Graphs
// ============================================================================

fn bench_voice_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("voice_graph");

    for use_filters in [false, true] {
        let ctx = AudioContext::new(&EngineConfig::default().with_filters(use_filters));
        for name in PROCEDURAL {
            let label = format!("{}/{}", name, if use_filters { "filtered" } else { "plain" });
            let source = SourceKind::Procedural(SynthesisKind::parse(name));

            group.throughput(Throughput::Elements(1));
            group.bench_function(BenchmarkId::new("tick", &label), |b| {
                let mut graph = VoiceGraph::build(&source, Position::new(1.0, -2.0), &ctx).unwrap();
                graph.fade_in(1.0, &ctx);
                b.iter(|| black_box(graph.tick()));
            });
        }
    }

    group.finish();
}

fn bench_voice_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("voice_build");
    let ctx = AudioContext::new(&EngineConfig::default());

    for name in PROCEDURAL {
        let source = SourceKind::Procedural(SynthesisKind::parse(name));
        group.bench_function(name, |b| {
            b.iter(|| {
                let graph = VoiceGraph::build(black_box(&source), Position::ORIGIN, &ctx).unwrap();
                black_box(graph.teardown())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Full Room
// ============================================================================

fn bench_room_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("room_render");

    for sample_rate in SAMPLE_RATES {
        for voices in VOICE_COUNTS {
            let sr_name = format!("{}kHz", sample_rate as u32 / 1000);
            let name = format!("{}/{}voices", sr_name, voices);

            group.throughput(Throughput::Elements(256));
            group.bench_with_input(
                BenchmarkId::new("256samples", &name),
                &(sample_rate, voices),
                |b, &(sr, n)| {
                    let mut engine = create_room(sr, n, false);
                    let mut block = vec![0.0_f32; 512];
                    b.iter(|| {
                        engine.render(black_box(&mut block));
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_realtime_compliance(c: &mut Criterion) {
    let mut group = c.benchmark_group("realtime_compliance");

    for buffer_size in BUFFER_SIZES {
        let time_budget_us = (buffer_size as f64 / 44100.0) * 1_000_000.0;
        let name = format!("{}samples", buffer_size);

        group.throughput(Throughput::Elements(buffer_size as u64));
        group.bench_with_input(
            BenchmarkId::new("8voices_filtered", &name),
            &buffer_size,
            |b, &buf_size| {
                let mut engine = create_room(44100.0, 8, true);
                let mut block = vec![0.0_f32; buf_size * 2];
                b.iter(|| {
                    engine.on_frame();
                    engine.render(black_box(&mut block));
                });
            },
        );

        // Print budget info for reference (only visible in verbose mode)
        eprintln!("  44kHz @ {} samples: budget = {:.2}µs", buffer_size, time_budget_us);
    }

    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(source_benches, bench_noise);

criterion_group!(voice_benches, bench_voice_graph, bench_voice_build);

criterion_group!(room_benches, bench_room_render, bench_realtime_compliance);

criterion_main!(source_benches, voice_benches, room_benches);
