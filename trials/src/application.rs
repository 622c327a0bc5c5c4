use crate::{
    output,
    record::{DataRecord, DecodingFailureRatio},
    settings::{Settings, TrialSettings},
};
use decoder::{
    decoder::{Decoder, DecodingFailure, DecodingResult},
    parameters::*,
    random::{current_thread_id, get_rng_from_seed, global_thread_count, Seed},
};
use rand::Rng;
use std::time::{Duration, Instant};

/// Runs a single trial against `dec`, reusing its buffers across calls.
pub fn decoding_trial<R>(
    dec: &mut Decoder,
    settings: &TrialSettings,
    rng: &mut R,
) -> Result<DecodingResult, anyhow::Error>
where
    R: Rng + ?Sized,
{
    let result = DecodingResult::from_trial(dec, settings.fixed_key(), settings.max_iter(), rng)?;
    Ok(result)
}

#[inline]
pub fn decoding_failure_trial<R>(
    dec: &mut Decoder,
    settings: &TrialSettings,
    rng: &mut R,
) -> Result<Option<DecodingFailure>, anyhow::Error>
where
    R: Rng + ?Sized,
{
    Ok(decoding_trial(dec, settings, rng)?.try_into().ok())
}

pub(crate) fn start_message(settings: &Settings) -> String {
    let num_trials = settings.num_trials();
    let parameter_message = format!(
        "    r = {BLOCK_LENGTH}, d = {BLOCK_WEIGHT}, t = {ERROR_WEIGHT}, \
        iterations = {NB_ITER}, ouroboros = {}\n",
        OUROBOROS != 0
    );
    let fixed_key_message = settings
        .fixed_key()
        .map_or(String::new(), |_| "    Using fixed key\n".to_string());
    let thread_message = if settings.parallel() {
        let thread_count = if settings.threads() == 0 {
            num_cpus::get()
        } else {
            settings.threads()
        };
        format!("[running with {thread_count} threads]\n")
    } else {
        String::new()
    };
    format!(
        "Starting decoding trials (N = {num_trials}) with parameters:\n\
        {parameter_message}\
        {fixed_key_message}\
        {thread_message}"
    )
}

pub(crate) fn end_message(dfr: &DecodingFailureRatio, runtime: Duration) -> String {
    let avg_nanos = runtime.as_nanos() / u128::from(dfr.num_trials().max(1));
    let (avg_mcs, ns_rem) = (avg_nanos / 1000, avg_nanos % 1000);
    let avg_text = if avg_mcs >= 100 {
        format!("{avg_mcs} μs")
    } else if avg_mcs >= 10 {
        format!("{}.{} μs", avg_mcs, ns_rem / 100)
    } else if avg_mcs >= 1 {
        format!("{}.{:0width$} μs", avg_mcs, ns_rem / 10, width = 2)
    } else {
        format!("{}.{:0width$} μs", avg_mcs, ns_rem, width = 3)
    };
    format!(
        "Trials: {}\n\
        Decoding failures: {}\n\
        log2(DFR): {:.2}\n\
        Runtime: {:.3} s\n\
        Average: {}",
        dfr.num_trials(),
        dfr.num_failures(),
        dfr.as_f64().log2(),
        runtime.as_secs_f64(),
        avg_text
    )
}

pub fn handle_decoding_failure(df: DecodingFailure, data: &mut DataRecord, settings: &Settings) {
    if data.decoding_failures().len() < settings.record_max() {
        if settings.verbose() >= 3 {
            eprintln!("Decoding failure found!");
            eprintln!(
                "Key: {}\nIterations: {}",
                serde_json::to_string(df.key()).unwrap_or_default(),
                df.iterations()
            );
            if data.decoding_failures().len() + 1 == settings.record_max() {
                eprintln!("Maximum number of decoding failures recorded.");
            }
        }
        data.push_decoding_failure(df);
    }
}

pub fn handle_progress(
    dfr: DecodingFailureRatio,
    data: &mut DataRecord,
    settings: &Settings,
    runtime: Duration,
) {
    data.add_results(dfr);
    data.set_runtime(runtime);
    if settings.parallel() {
        data.set_thread_count(Some(global_thread_count() as u32));
    }
    if settings.verbose() >= 2 {
        eprintln!(
            "Found {} decoding failures in {} trials (runtime: {:.3} s)",
            data.num_failures(),
            data.num_trials(),
            runtime.as_secs_f64()
        );
    }
}

pub fn run(settings: &Settings) -> Result<DataRecord, anyhow::Error> {
    let start_time = Instant::now();
    if settings.verbose() >= 1 {
        eprintln!("{}", start_message(settings));
    }
    output::check_writable(settings.output(), settings.overwrite())?;
    let seed = settings.seed().unwrap_or_else(Seed::from_entropy);
    let mut data = DataRecord::new(settings.fixed_key().cloned(), seed);
    let seed_index = settings
        .seed_index()
        .map(|idx| idx as usize)
        .unwrap_or_else(current_thread_id);
    let mut rng = get_rng_from_seed(seed, seed_index);
    let mut dec = Decoder::new();
    let mut trials_remaining = settings.num_trials();
    while trials_remaining > 0 {
        let mut new_failure_count = 0;
        let new_trials = settings.save_frequency().min(trials_remaining);
        for _ in 0..new_trials {
            let result = decoding_failure_trial(&mut dec, settings.trial_settings(), &mut rng)?;
            if let Some(mut df) = result {
                new_failure_count += 1;
                df.thread = Some(seed_index);
                handle_decoding_failure(df, &mut data, settings);
            }
        }
        let dfr = DecodingFailureRatio::new(new_failure_count, new_trials)
            .expect("number of decoding failures should be <= number of trials");
        handle_progress(dfr, &mut data, settings, start_time.elapsed());
        output::write_json(settings.output(), &data)?;
        trials_remaining -= new_trials;
    }
    if settings.verbose() >= 1 {
        eprintln!(
            "{}",
            end_message(data.decoding_failure_ratio(), data.runtime())
        );
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsBuilder;

    #[test]
    fn decoding_trial_reuses_decoder_across_calls() {
        let mut rng = rand::thread_rng();
        let mut dec = Decoder::new();
        let trial_settings = TrialSettings::default();
        for _ in 0..20 {
            let result = decoding_trial(&mut dec, &trial_settings, &mut rng).unwrap();
            assert!(result.iterations() <= trial_settings.max_iter());
        }
    }

    #[test]
    fn run_against_void_output_tracks_trial_count() {
        let settings = SettingsBuilder::default()
            .num_trials(50)
            .output(crate::output::OutputTo::Void)
            .build()
            .unwrap();
        let data = run(&settings).unwrap();
        assert_eq!(data.num_trials(), 50);
        assert!(data.num_failures() <= data.num_trials());
    }
}
