//! Equalizer module tests: blob-configured bank setup, interleaved
//! processing, bypass, mute and response switching.

#![allow(clippy::expect_used)] // Tests use expect() for readable assertions

use dsp::{EqIir, IirBank, COEF_UNITY, GAIN_UNITY, EQ_IIR_CONFIG_ID};
use pipeline::{
    BaseConfig, FragmentPosition, InputStreamBuffer, InstanceState, ModuleConfig, ModuleOps,
    OutputStreamBuffer,
};
use stream::{CoreError, FrameFormat, SampleFormat, Sink, Source};

/// Config words: 2 channels, one response with a single half-gain
/// biquad on channel 0, channel 1 bypassed.
fn half_gain_bypass_config() -> Vec<i32> {
    let mut words = vec![
        2,  // channels_in_config
        1,  // number_of_responses
        0,  // channel 0 -> response 0
        -1, // channel 1 -> bypass
    ];
    words.push(1); // response 0: one section
    words.extend_from_slice(&[0, 0, 0, 0, COEF_UNITY / 2, 0, GAIN_UNITY]);
    words
}

fn words_to_bytes(words: &[i32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn samples_to_bytes(samples: &[i32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn bytes_to_samples(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn stereo_s32_base() -> BaseConfig {
    BaseConfig {
        ibs: 16,
        obs: 16,
        frames_per_period: 2,
        periods_sink: 1,
        frame: FrameFormat::new(48_000, 2, SampleFormat::S32Le).expect("valid format"),
    }
}

/// Build a prepared EqIir from the given config words.
fn prepared_eq(words: &[i32]) -> EqIir {
    let mut eq = EqIir::new();
    let blob = words_to_bytes(words);
    eq.init(&ModuleConfig {
        base: stereo_s32_base(),
        init_blob: &blob,
    })
    .expect("init");
    let mut sources: [&mut dyn Source; 0] = [];
    let mut sinks: [&mut dyn Sink; 0] = [];
    eq.prepare(&stereo_s32_base(), &mut sources, &mut sinks)
        .expect("prepare");
    eq
}

/// Run `frames` stereo frames through the module's stream contract.
fn run(eq: &mut EqIir, input_samples: &[i32]) -> Vec<i32> {
    let in_bytes = samples_to_bytes(input_samples);
    let mut out_bytes = vec![0u8; in_bytes.len()];
    let mut inputs = [InputStreamBuffer {
        buf: &in_bytes,
        pos: 0,
        size: in_bytes.len(),
        consumed: 0,
    }];
    let mut outputs = [OutputStreamBuffer {
        buf: &mut out_bytes,
        pos: 0,
        free: in_bytes.len(),
        size: 0,
    }];
    eq.process_stream(&mut inputs, &mut outputs)
        .expect("process");
    assert_eq!(inputs[0].consumed, inputs[0].size);
    assert_eq!(outputs[0].size, inputs[0].size);
    bytes_to_samples(&out_bytes)
}

#[test]
fn half_gain_on_channel0_bypass_on_channel1() {
    let mut eq = prepared_eq(&half_gain_bypass_config());
    // Two interleaved stereo frames.
    let out = run(&mut eq, &[1000, 2000, 2000, 4000]);
    assert_eq!(out, vec![500, 2000, 1000, 4000]);
}

#[test]
fn zero_input_gives_zero_output_after_reset() {
    let mut eq = prepared_eq(&half_gain_bypass_config());
    // Push a non-zero signal through, then reset runtime state.
    let _ = run(&mut eq, &[5000, 5000, -5000, -5000]);
    eq.reset().expect("reset");
    let out = run(&mut eq, &[0; 64]);
    assert!(out.iter().all(|&s| s == 0));
}

#[test]
fn bypass_channel_is_identity_sample_for_sample() {
    // Both channels bypassed.
    let words = vec![2, 0, -1, -1];
    let mut eq = prepared_eq(&words);
    let input = [123, -456, 789, i32::MIN / 2];
    let out = run(&mut eq, &input);
    assert_eq!(out, input);
}

#[test]
fn mute_forces_zero_and_unmute_restores() {
    let mut eq = prepared_eq(&half_gain_bypass_config());
    eq.bank_mut().mute(1).expect("mute channel 1");

    let out = run(&mut eq, &[1000, 2000, 2000, 4000]);
    assert_eq!(out, vec![500, 0, 1000, 0]);

    eq.bank_mut().unmute(1).expect("unmute channel 1");
    let out = run(&mut eq, &[1000, 2000, 2000, 4000]);
    assert_eq!(out, vec![500, 2000, 1000, 4000]);
}

#[test]
fn switch_response_rewrites_assignment() {
    let mut eq = prepared_eq(&half_gain_bypass_config());
    // Move channel 1 from bypass onto the half-gain response.
    eq.bank_mut().switch_response(1, 0).expect("switch");
    let out = run(&mut eq, &[1000, 2000]);
    assert_eq!(out, vec![500, 1000]);
}

#[test]
fn switch_response_out_of_range_is_invalid_arg() {
    let mut eq = prepared_eq(&half_gain_bypass_config());
    assert_eq!(
        eq.bank_mut().switch_response(1, 7),
        Err(CoreError::InvalidArg)
    );
    assert_eq!(
        eq.bank_mut().switch_response(9, 0),
        Err(CoreError::InvalidArg)
    );
    // Failed switch leaves behaviour unchanged.
    let out = run(&mut eq, &[1000, 2000]);
    assert_eq!(out, vec![500, 2000]);
}

#[test]
fn bank_setup_failure_keeps_previous_state() {
    let mut bank = IirBank::new();
    bank.set_config(&half_gain_bypass_config()).expect("config");
    bank.setup(2).expect("setup");
    assert_eq!(bank.channel_count(), 2);

    // Channel 0 assigned to a response that does not exist.
    let bad = vec![2, 1, 3, -1, 1, 0, 0, 0, 0, COEF_UNITY, 0, GAIN_UNITY];
    bank.set_config(&bad).expect("config stores before setup");
    assert_eq!(bank.setup(2), Err(CoreError::InvalidArg));
    // The running channels from the previous setup survive.
    assert_eq!(bank.channel_count(), 2);
    assert_eq!(bank.run_channel(0, 1000), 500);
}

#[test]
fn prepare_rejects_non_s32_format() {
    let mut eq = EqIir::new();
    let blob = words_to_bytes(&half_gain_bypass_config());
    let mut base = stereo_s32_base();
    eq.init(&ModuleConfig {
        base,
        init_blob: &blob,
    })
    .expect("init");

    base.frame = FrameFormat::new(48_000, 2, SampleFormat::S16Le).expect("valid format");
    let mut sources: [&mut dyn Source; 0] = [];
    let mut sinks: [&mut dyn Sink; 0] = [];
    assert_eq!(
        eq.prepare(&base, &mut sources, &mut sinks),
        Err(CoreError::NotSupported)
    );
}

#[test]
fn prepare_without_configuration_fails() {
    let mut eq = EqIir::new();
    eq.init(&ModuleConfig {
        base: stereo_s32_base(),
        init_blob: &[],
    })
    .expect("init");
    let mut sources: [&mut dyn Source; 0] = [];
    let mut sinks: [&mut dyn Sink; 0] = [];
    assert_eq!(
        eq.prepare(&stereo_s32_base(), &mut sources, &mut sinks),
        Err(CoreError::InvalidArg)
    );
}

#[test]
fn configuration_arrives_in_fragments() {
    let mut eq = EqIir::new();
    eq.init(&ModuleConfig {
        base: stereo_s32_base(),
        init_blob: &[],
    })
    .expect("init");

    let blob = words_to_bytes(&half_gain_bypass_config());
    let (head, tail) = blob.split_at(8);
    eq.set_configuration(
        EQ_IIR_CONFIG_ID,
        FragmentPosition::First,
        blob.len(),
        head,
        InstanceState::Ready,
    )
    .expect("first fragment");
    eq.set_configuration(
        EQ_IIR_CONFIG_ID,
        FragmentPosition::Last,
        blob.len(),
        tail,
        InstanceState::Ready,
    )
    .expect("last fragment");

    let mut sources: [&mut dyn Source; 0] = [];
    let mut sinks: [&mut dyn Sink; 0] = [];
    eq.prepare(&stereo_s32_base(), &mut sources, &mut sinks)
        .expect("prepare after fragmented config");

    // Readback returns the assembled blob.
    let mut readback = vec![0u8; blob.len()];
    let n = eq
        .get_configuration(EQ_IIR_CONFIG_ID, 0, &mut readback)
        .expect("readback");
    assert_eq!(n, blob.len());
    assert_eq!(readback, blob);
}

#[test]
fn unknown_config_id_rejected() {
    let mut eq = EqIir::new();
    assert_eq!(
        eq.set_configuration(
            99,
            FragmentPosition::Single,
            4,
            &[0; 4],
            InstanceState::Ready
        ),
        Err(CoreError::InvalidArg)
    );
}
