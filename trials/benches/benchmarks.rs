use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use crossbeam_channel::unbounded as channel;
use decoder::{
    decoder::Decoder,
    random::{custom_thread_rng, global_seed},
};
use std::hint::black_box;
use trials::{
    application::{self, decoding_failure_trial, handle_decoding_failure},
    output::OutputTo,
    parallel,
    record::DataRecord,
    settings::{SettingsBuilder, TrialSettings},
};

pub fn group_application(c: &mut Criterion) {
    c.bench_function("run_application", |b| {
        let settings = SettingsBuilder::default()
            .num_trials(10_000)
            .output(OutputTo::Void)
            .build()
            .unwrap();
        b.iter(|| black_box(application::run(&settings)))
    });

    c.bench_function("run_parallel", |b| {
        let settings = SettingsBuilder::default()
            .num_trials(10_000)
            .threads(0)
            .output(OutputTo::Void)
            .build()
            .unwrap();
        b.iter(|| black_box(parallel::run_parallel(&settings)))
    });

    c.bench_function("decoding_trial", |b| {
        let settings = TrialSettings::default();
        let mut rng = custom_thread_rng();
        let mut dec = Decoder::new();
        b.iter(|| black_box(decoding_failure_trial(&mut dec, &settings, &mut rng)))
    });
}

pub fn group_record(c: &mut Criterion) {
    c.bench_function("record_decoding_failure", |b| {
        let settings = SettingsBuilder::default()
            .num_trials(100)
            .output(OutputTo::Void)
            .build()
            .unwrap();
        let mut rng = custom_thread_rng();
        let mut dec = Decoder::new();
        let mut data = DataRecord::new(settings.fixed_key().cloned(), global_seed().unwrap());
        b.iter_batched(
            || {
                let (tx, rx) = channel();
                for _ in 0..10 {
                    if let Ok(Some(df)) =
                        decoding_failure_trial(&mut dec, settings.trial_settings(), &mut rng)
                    {
                        tx.send(df).ok();
                    }
                }
                drop(tx);
                rx
            },
            |rx| {
                rx.iter()
                    .for_each(|result| handle_decoding_failure(result, &mut data, &settings))
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = group_application, group_record
}
criterion_main!(benches);
