use decoder::{
    decoder::DecodingFailure,
    keys::Key,
    parameters::*,
    random::Seed,
    threshold::bf_threshold_min,
};
use getset::{CopyGetters, Getters, Setters};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, ops::AddAssign, time::Duration};
use thiserror::Error;

/// A JSON-serializable summary of a batch of trials: the code parameters in
/// effect, the fixed key if one was pinned, the aggregate decoding-failure
/// ratio, and a bounded list of the decoding failures encountered (enough to
/// replay each one: its key and error vector).
#[derive(Clone, CopyGetters, Debug, Deserialize, Getters, Serialize, Setters)]
pub struct DataRecord {
    #[getset(get_copy = "pub")]
    block_length: usize,
    #[getset(get_copy = "pub")]
    block_weight: usize,
    #[getset(get_copy = "pub")]
    error_weight: usize,
    #[getset(get_copy = "pub")]
    ouroboros: bool,
    #[getset(get_copy = "pub")]
    nb_iter: usize,
    #[getset(get_copy = "pub")]
    ttl_coeff0: f64,
    #[getset(get_copy = "pub")]
    ttl_coeff1: f64,
    #[getset(get_copy = "pub")]
    ttl_saturate: usize,
    #[getset(get_copy = "pub")]
    bf_threshold_min: u8,
    #[getset(get = "pub")]
    fixed_key: Option<Key>,
    #[getset(get = "pub")]
    #[serde(flatten)]
    decoding_failure_ratio: DecodingFailureRatio,
    #[getset(get = "pub")]
    decoding_failures: Vec<DecodingFailure>,
    #[getset(get_copy = "pub")]
    seed: Seed,
    #[getset(get_copy = "pub", set = "pub")]
    #[serde(
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    runtime: Duration,
    #[getset(get_copy = "pub", set = "pub")]
    thread_count: Option<u32>,
}

impl DataRecord {
    pub fn new(fixed_key: Option<Key>, seed: Seed) -> Self {
        Self {
            block_length: BLOCK_LENGTH,
            block_weight: BLOCK_WEIGHT,
            error_weight: ERROR_WEIGHT,
            ouroboros: OUROBOROS != 0,
            nb_iter: NB_ITER,
            ttl_coeff0: TTL_COEFF0,
            ttl_coeff1: TTL_COEFF1,
            ttl_saturate: TTL_SATURATE,
            bf_threshold_min: bf_threshold_min() as u8,
            fixed_key,
            decoding_failure_ratio: DecodingFailureRatio::default(),
            decoding_failures: Vec::new(),
            seed,
            runtime: Duration::new(0, 0),
            thread_count: None,
        }
    }

    #[inline]
    pub fn push_decoding_failure(&mut self, df: DecodingFailure) {
        self.decoding_failures.push(df);
    }

    #[inline]
    pub fn num_failures(&self) -> u64 {
        self.decoding_failure_ratio.num_failures()
    }

    #[inline]
    pub fn num_trials(&self) -> u64 {
        self.decoding_failure_ratio.num_trials()
    }

    #[inline]
    pub fn add_results(&mut self, dfr: DecodingFailureRatio) {
        self.decoding_failure_ratio += dfr;
    }
}

impl fmt::Display for DataRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", serde_json::to_string(self).or(Err(fmt::Error))?)
    }
}

#[derive(Clone, CopyGetters, Debug, Default, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct DecodingFailureRatio {
    num_failures: u64,
    num_trials: u64,
}

impl AddAssign for DecodingFailureRatio {
    fn add_assign(&mut self, other: Self) {
        self.num_failures += other.num_failures;
        self.num_trials += other.num_trials;
    }
}

impl DecodingFailureRatio {
    #[inline]
    pub fn new(num_failures: u64, num_trials: u64) -> Result<Self, InvalidDFRError> {
        if num_failures <= num_trials {
            Ok(Self {
                num_failures,
                num_trials,
            })
        } else {
            Err(InvalidDFRError)
        }
    }

    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.num_failures as f64 / self.num_trials as f64
    }
}

#[derive(Clone, Copy, Debug, Error)]
#[error("invalid decoding failure ratio: number of failures must be <= number of trials")]
pub struct InvalidDFRError;

fn serialize_duration<S>(duration: &Duration, ser: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let secs_str = format!("{}.{:09}", duration.as_secs(), duration.subsec_nanos());
    ser.serialize_str(&secs_str)
}

struct DurationVisitor;

impl<'de> de::Visitor<'de> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a duration in seconds (as string or floating-point)")
    }

    fn visit_f64<E>(self, secs: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Duration::try_from_secs_f64(secs).map_err(E::custom)
    }

    fn visit_str<E>(self, secs_str: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        let secs = secs_str.parse::<f64>().map_err(|_| {
            E::invalid_type(
                de::Unexpected::Str(secs_str),
                &"a string containing a valid float literal",
            )
        })?;
        self.visit_f64(secs)
    }

    fn visit_u64<E>(self, secs: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Duration::from_secs(secs))
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(DurationVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_record_round_trips_through_json() {
        let seed = Seed::from_entropy();
        let mut data = DataRecord::new(None, seed);
        data.add_results(DecodingFailureRatio::new(3, 1_000_000).unwrap());
        data.set_runtime(Duration::from_secs_f64(1.478772912));
        data.set_thread_count(Some(8));
        let json_str = serde_json::to_string(&data).unwrap();
        let back: DataRecord = serde_json::from_str(&json_str).unwrap();
        assert_eq!(back.num_trials(), 1_000_000);
        assert_eq!(back.num_failures(), 3);
        assert_eq!(back.block_length(), BLOCK_LENGTH);
        assert_eq!(back.seed(), seed);
        assert_eq!(back.runtime(), data.runtime());
        assert_eq!(back.thread_count(), Some(8));
    }

    #[test]
    fn rejects_more_failures_than_trials() {
        assert!(DecodingFailureRatio::new(5, 4).is_err());
    }
}
