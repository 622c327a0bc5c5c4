//! Code parameters, selectable at compile time via environment variables.
//!
//! `BIKE_PRESET` (128, 192 or 256) and `BIKE_OUROBOROS` (0 or 1) pick one of
//! the six parameter sets; any of `BIKE_BLOCK_LENGTH`, `BIKE_BLOCK_WEIGHT`,
//! `BIKE_ERROR_WEIGHT`, `BIKE_NB_ITER`, `BIKE_TTL_SATURATE` overrides the
//! corresponding value directly.

pub const INDEX: usize = 2;

pub const PRESET: usize = env_or_usize!("BIKE_PRESET", 128);
pub const OUROBOROS: usize = env_or_usize!("BIKE_OUROBOROS", 0);

const fn preset_defaults(preset: usize, ouroboros: usize) -> (usize, usize, usize) {
    match (preset, ouroboros) {
        (128, 0) => (10163, 71, 134),
        (128, _) => (11027, 67, 156),
        (192, 0) => (19853, 103, 199),
        (192, _) => (21683, 99, 226),
        (256, 0) => (32749, 137, 264),
        (256, _) => (36131, 133, 300),
        _ => (10163, 71, 134),
    }
}

const PRESET_DEFAULTS: (usize, usize, usize) = preset_defaults(PRESET, OUROBOROS);

pub const BLOCK_LENGTH: usize = env_or_usize!("BIKE_BLOCK_LENGTH", PRESET_DEFAULTS.0);
pub const BLOCK_WEIGHT: usize = env_or_usize!("BIKE_BLOCK_WEIGHT", PRESET_DEFAULTS.1);
pub const ERROR_WEIGHT: usize = env_or_usize!("BIKE_ERROR_WEIGHT", PRESET_DEFAULTS.2);

pub const NB_ITER: usize = env_or_usize!("BIKE_NB_ITER", 100);
pub const TTL_SATURATE: usize = env_or_usize!("BIKE_TTL_SATURATE", 5);

/// Additive constant and slope of the `ttl = round(coeff0 * diff + coeff1)` rule.
/// Not environment-overridable: these are tuned constants, not sizing parameters.
pub const TTL_COEFF0: f64 = 0.435;
pub const TTL_COEFF1: f64 = 1.15;

pub const SYNDROME_STOP: usize = if OUROBOROS != 0 { ERROR_WEIGHT / 2 } else { 0 };

pub const ROW_LENGTH: usize = INDEX * BLOCK_LENGTH;

/// Padding of dense per-block arrays to a multiple of 4096 bits (512 bytes),
/// matching the alignment a 16-way-unrolled 256-bit SIMD multiply needs.
pub const SIZE_AVX: usize = ((BLOCK_LENGTH * 8) + (256 * 16 - 1)) / (256 * 16) * (256 * 16) / 8;
pub const DOUBLE_SIZE_AVX: usize = 2 * SIZE_AVX;

#[allow(dead_code, clippy::all)]
const fn compile_time_assertions() {
    const _: () = assert!(usize::BITS >= 32, "16-bit systems not supported");
    const _: () = assert!(INDEX == 2, "INDEX != 2 not implemented");
    const _: () = assert!(
        0 < BLOCK_WEIGHT && BLOCK_WEIGHT <= 255,
        "BLOCK_WEIGHT must be positive and at most 255"
    );
    const _: () = assert!(BLOCK_LENGTH <= 65536, "BLOCK_LENGTH > 65536 not implemented");
    const _: () = assert!(
        0 < ERROR_WEIGHT && ERROR_WEIGHT < ROW_LENGTH,
        "ERROR_WEIGHT must be positive and less than ROW_LENGTH"
    );
    const _: () = assert!(BLOCK_LENGTH <= SIZE_AVX);
    const _: () = assert!(2 * SIZE_AVX <= u32::MAX as usize);
    const _: () = assert!(NB_ITER >= 1, "NB_ITER must be positive");
    const _: () = assert!(TTL_SATURATE >= 1, "TTL_SATURATE must be positive");
}

/// Parses environment variable as `usize` if defined, otherwise yields the
/// given `usize` value. Fails to compile if the environment variable is
/// defined but cannot be parsed.
macro_rules! env_or_usize {
    ( $name:expr, $default:expr $(,)? ) => {{
        ::konst::result::unwrap_ctx!(::konst::option::unwrap_or!(
            ::konst::option::map!(::core::option_env!($name), ::konst::primitive::parse_usize),
            ::core::result::Result::Ok::<::core::primitive::usize, _>($default)
        ))
    }};
}

use env_or_usize;
