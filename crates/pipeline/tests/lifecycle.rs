//! Instance lifecycle + adapter integration tests, driven end-to-end
//! through real ring buffers.

#![allow(clippy::expect_used)] // Tests use expect() for readable assertions

use pipeline::{
    BaseConfig, Command, Domain, FragmentPosition, InputStreamBuffer, InstanceState, ModuleConfig,
    ModuleId, ModuleInstance, ModuleOps, OutputStreamBuffer, ProcessingMode,
};
use stream::{CoreError, FrameFormat, NullCache, RingBuffer, SampleFormat, Sink, Source};

const PERIOD_BYTES: usize = 64;

fn base_config() -> BaseConfig {
    BaseConfig {
        ibs: PERIOD_BYTES as u32,
        obs: PERIOD_BYTES as u32,
        frames_per_period: 16,
        periods_sink: 3,
        frame: FrameFormat::new(48_000, 2, SampleFormat::S16Le).expect("valid format"),
    }
}

fn test_id() -> ModuleId {
    ModuleId {
        uuid: [0x11; 16],
        module_id: 7,
        instance_id: 0,
    }
}

/// Stream-style module that copies input to output byte for byte.
#[derive(Default)]
struct CopyModule {
    prepared: bool,
}

impl ModuleOps for CopyModule {
    fn processing_mode(&self) -> ProcessingMode {
        ProcessingMode::Stream
    }

    fn init(&mut self, _cfg: &ModuleConfig<'_>) -> Result<(), CoreError> {
        Ok(())
    }

    fn prepare(
        &mut self,
        _base: &BaseConfig,
        _sources: &mut [&mut dyn Source],
        _sinks: &mut [&mut dyn Sink],
    ) -> Result<(), CoreError> {
        self.prepared = true;
        Ok(())
    }

    fn process_stream(
        &mut self,
        inputs: &mut [InputStreamBuffer<'_>],
        outputs: &mut [OutputStreamBuffer<'_>],
    ) -> Result<(), CoreError> {
        let input = &mut inputs[0];
        let output = &mut outputs[0];

        let n = input.size.min(output.free);
        let in_size = input.buf.len();
        let out_size = output.buf.len();
        for i in 0..n {
            let byte = input.buf[(input.pos + i) % in_size];
            output.buf[(output.pos + i) % out_size] = byte;
        }
        input.consumed = n;
        output.size = n;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), CoreError> {
        self.prepared = false;
        Ok(())
    }

    fn free(&mut self) {}
}

fn new_buffer() -> RingBuffer<NullCache> {
    RingBuffer::new(PERIOD_BYTES, PERIOD_BYTES, false, NullCache).expect("buffer must allocate")
}

#[test]
fn full_lifecycle_leaves_no_resources_outstanding() {
    let mut inst = ModuleInstance::new(test_id(), Domain::LowLatency, CopyModule::default());
    assert_eq!(inst.state(), InstanceState::Init);

    let cfg = ModuleConfig {
        base: base_config(),
        init_blob: &[],
    };
    inst.init(&cfg).expect("init");
    assert_eq!(inst.state(), InstanceState::Ready);

    // Allocations made on the module's behalf land in the registry.
    let _scratch = inst
        .resources_mut()
        .alloc_bytes(256)
        .expect("scratch alloc");
    assert_eq!(inst.resources().heap_usage(), 256);

    let mut upstream = new_buffer();
    let mut downstream = new_buffer();
    {
        let mut sources: [&mut dyn Source; 1] = [&mut upstream];
        let mut sinks: [&mut dyn Sink; 1] = [&mut downstream];
        inst.prepare(&mut sources, &mut sinks).expect("prepare");
    }
    assert_eq!(inst.state(), InstanceState::Prepared);

    inst.trigger(Command::Start).expect("start");
    assert_eq!(inst.state(), InstanceState::Active);

    inst.trigger(Command::Stop).expect("stop");
    assert_eq!(inst.state(), InstanceState::Prepared);

    inst.free();
    assert_eq!(inst.state(), InstanceState::Init);
    assert_eq!(inst.resources().heap_usage(), 0);
}

#[test]
fn process_moves_one_period_through_ring_buffers() {
    let mut inst = ModuleInstance::new(test_id(), Domain::LowLatency, CopyModule::default());
    inst.init(&ModuleConfig {
        base: base_config(),
        init_blob: &[],
    })
    .expect("init");

    let mut upstream = new_buffer();
    let mut downstream = new_buffer();

    // Producer side fills one period with a ramp.
    let payload: Vec<u8> = (0..PERIOD_BYTES as u8).collect();
    upstream
        .get_buffer(PERIOD_BYTES)
        .expect("room")
        .write_wrapped(&payload);
    upstream.commit(PERIOD_BYTES);

    {
        let mut sources: [&mut dyn Source; 1] = [&mut upstream];
        let mut sinks: [&mut dyn Sink; 1] = [&mut downstream];
        inst.prepare(&mut sources, &mut sinks).expect("prepare");
        inst.trigger(Command::Start).expect("start");

        let stats = inst.process(&mut sources, &mut sinks).expect("process");
        assert!(!stats.skipped);
        assert_eq!(stats.consumed.as_slice(), &[PERIOD_BYTES]);
        assert_eq!(stats.produced.as_slice(), &[PERIOD_BYTES]);
    }

    assert_eq!(upstream.available(), 0);
    assert_eq!(downstream.available(), PERIOD_BYTES);

    let mut out = vec![0u8; PERIOD_BYTES];
    downstream
        .get_data(PERIOD_BYTES)
        .expect("data present")
        .read_wrapped(&mut out);
    assert_eq!(out, payload);
}

#[test]
fn xrun_leaves_offsets_untouched_for_retry() {
    let mut inst = ModuleInstance::new(test_id(), Domain::LowLatency, CopyModule::default());
    inst.init(&ModuleConfig {
        base: base_config(),
        init_blob: &[],
    })
    .expect("init");

    let mut upstream = new_buffer();
    let mut downstream = new_buffer();

    // Half a period only: staging a full period must fail.
    upstream.commit(PERIOD_BYTES / 2);

    let mut sources: [&mut dyn Source; 1] = [&mut upstream];
    let mut sinks: [&mut dyn Sink; 1] = [&mut downstream];
    inst.prepare(&mut sources, &mut sinks).expect("prepare");
    inst.trigger(Command::Start).expect("start");

    assert_eq!(
        inst.process(&mut sources, &mut sinks),
        Err(CoreError::XRun)
    );
    assert_eq!(sources[0].available(), PERIOD_BYTES / 2);
    assert_eq!(sinks[0].free(), sinks[0].capacity());

    // Top up and retry on the "next tick".
    sources[0].release(0); // no-op; offsets are where they were
    drop(sources);
    upstream.commit(PERIOD_BYTES / 2);
    let mut sources: [&mut dyn Source; 1] = [&mut upstream];
    inst.process(&mut sources, &mut sinks).expect("retry succeeds");
}

#[test]
fn process_requires_active_state() {
    let mut inst = ModuleInstance::new(test_id(), Domain::LowLatency, CopyModule::default());
    inst.init(&ModuleConfig {
        base: base_config(),
        init_blob: &[],
    })
    .expect("init");

    let mut upstream = new_buffer();
    let mut downstream = new_buffer();
    let mut sources: [&mut dyn Source; 1] = [&mut upstream];
    let mut sinks: [&mut dyn Sink; 1] = [&mut downstream];
    inst.prepare(&mut sources, &mut sinks).expect("prepare");

    assert_eq!(
        inst.process(&mut sources, &mut sinks),
        Err(CoreError::InvalidState)
    );
}

#[test]
fn prepare_rejects_undersized_sink() {
    let mut inst = ModuleInstance::new(test_id(), Domain::LowLatency, CopyModule::default());
    let mut base = base_config();
    base.periods_sink = 16; // demands 16 * 64 = 1024 bytes of sink
    inst.init(&ModuleConfig {
        base,
        init_blob: &[],
    })
    .expect("init");

    let mut upstream = new_buffer();
    let mut downstream = new_buffer(); // only 192 bytes
    let mut sources: [&mut dyn Source; 1] = [&mut upstream];
    let mut sinks: [&mut dyn Sink; 1] = [&mut downstream];
    assert_eq!(
        inst.prepare(&mut sources, &mut sinks),
        Err(CoreError::NotSupported)
    );
    // Failed prepare leaves the instance Ready.
    assert_eq!(inst.state(), InstanceState::Ready);
}

#[test]
fn prepare_without_buffers_is_not_connected() {
    let mut inst = ModuleInstance::new(test_id(), Domain::LowLatency, CopyModule::default());
    inst.init(&ModuleConfig {
        base: base_config(),
        init_blob: &[],
    })
    .expect("init");

    let mut sources: [&mut dyn Source; 0] = [];
    let mut sinks: [&mut dyn Sink; 0] = [];
    assert_eq!(
        inst.prepare(&mut sources, &mut sinks),
        Err(CoreError::NotConnected)
    );
}

#[test]
fn reset_prepare_reset_equals_single_reset() {
    let mut inst = ModuleInstance::new(test_id(), Domain::LowLatency, CopyModule::default());
    inst.init(&ModuleConfig {
        base: base_config(),
        init_blob: &[],
    })
    .expect("init");

    let mut upstream = new_buffer();
    let mut downstream = new_buffer();
    let mut sources: [&mut dyn Source; 1] = [&mut upstream];
    let mut sinks: [&mut dyn Sink; 1] = [&mut downstream];

    inst.reset().expect("first reset");
    inst.prepare(&mut sources, &mut sinks).expect("prepare");
    inst.reset().expect("second reset");

    // Same observable state as a single reset from Ready.
    assert_eq!(inst.state(), InstanceState::Ready);
    assert!(!inst.overrun_permitted());
    assert_eq!(inst.resources().heap_usage(), 0);
}

#[test]
fn dp_instance_skips_until_watermarks_met() {
    let mut inst = ModuleInstance::new(test_id(), Domain::DataProcessing, CopyModule::default());
    inst.init(&ModuleConfig {
        base: base_config(),
        init_blob: &[],
    })
    .expect("init");

    let mut upstream = new_buffer();
    let mut downstream = new_buffer();
    let mut sources: [&mut dyn Source; 1] = [&mut upstream];
    let mut sinks: [&mut dyn Sink; 1] = [&mut downstream];
    inst.prepare(&mut sources, &mut sinks).expect("prepare");
    inst.trigger(Command::Start).expect("start");

    // Empty source: the DP instance declines the period without error.
    let stats = inst.process(&mut sources, &mut sinks).expect("skip ok");
    assert!(stats.skipped);
    assert_eq!(sinks[0].free(), sinks[0].capacity());
}

#[test]
fn pre_start_arms_overrun_flag() {
    let mut inst = ModuleInstance::new(test_id(), Domain::LowLatency, CopyModule::default());
    inst.init(&ModuleConfig {
        base: base_config(),
        init_blob: &[],
    })
    .expect("init");

    let mut upstream = new_buffer();
    let mut downstream = new_buffer();
    let mut sources: [&mut dyn Source; 1] = [&mut upstream];
    let mut sinks: [&mut dyn Sink; 1] = [&mut downstream];
    inst.prepare(&mut sources, &mut sinks).expect("prepare");

    inst.trigger(Command::PreStart).expect("pre-start");
    assert!(inst.overrun_permitted());
    assert_eq!(inst.state(), InstanceState::Prepared);

    // Reset clears the armed flag.
    inst.reset().expect("reset");
    assert!(!inst.overrun_permitted());
}

#[test]
fn bind_records_and_unbind_forgets_peers() {
    let mut inst = ModuleInstance::new(test_id(), Domain::LowLatency, CopyModule::default());
    let peer = ModuleId {
        uuid: [0x22; 16],
        module_id: 9,
        instance_id: 1,
    };

    inst.bind(peer).expect("bind");
    assert_eq!(inst.peers(), &[peer]);
    assert_eq!(inst.bind(peer), Err(CoreError::InvalidArg));

    inst.unbind(&peer);
    assert!(inst.peers().is_empty());
}

#[test]
fn set_configuration_default_rejects_unknown_id() {
    let mut inst = ModuleInstance::new(test_id(), Domain::LowLatency, CopyModule::default());
    inst.init(&ModuleConfig {
        base: base_config(),
        init_blob: &[],
    })
    .expect("init");

    assert_eq!(
        inst.set_configuration(1, FragmentPosition::Single, 4, &[0; 4]),
        Err(CoreError::InvalidArg)
    );
}
