use decoder::random;
use trials::{
    parallel,
    output::OutputTo,
    settings::{Settings, SettingsBuilder},
};

fn multithreaded_example_settings() -> Settings {
    let seed =
        decoder::random::Seed::try_from("0a85f4ae8350b3a3034145b19a8d7bfa11f0baeeae106f6812ddfd0e5890b61d")
            .unwrap();
    SettingsBuilder::default()
        .num_trials(10_000)
        .output(OutputTo::Void)
        .threads(3)
        .seed(Some(seed))
        .build()
        .unwrap()
}

#[test]
fn main_multithreaded_test() {
    let settings = multithreaded_example_settings();
    let seed = settings.seed().unwrap();
    let data = parallel::run_parallel(&settings).unwrap();
    assert_eq!(random::global_seed().unwrap(), seed);
    assert_eq!(data.seed(), seed);
    assert_eq!(data.num_failures(), data.decoding_failures().len() as u64);
    assert_eq!(data.thread_count(), Some(3));
    assert_eq!(data.num_trials(), settings.num_trials());
    assert!(data.num_failures() <= settings.record_max() as u64);
    for df in data.decoding_failures() {
        assert!(df.thread.is_some());
    }
}
