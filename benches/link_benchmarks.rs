//! Benchmarks for the load → compose → layout pipeline.
//!
//! Run with the `profile-with-puffin` feature to record per-phase scopes:
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- "link/"
//! ```

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use shadelink::{
    ComponentType, MemoryLoader, Registry, Session, SessionDesc, ShaderFrontEnd,
    TargetDesc, TargetFormat,
};
use std::hint::black_box;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

const LIGHTING: &str = include_str!("../test_shaders/lighting.slang");
const SHADOWS: &str = include_str!("../test_shaders/shadows.slang");
const PARTICLES: &str = include_str!("../test_shaders/particles.slang");
const LIBRARY: &str = include_str!("../test_shaders/library.slang");

fn loader() -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    loader.insert("lighting", LIGHTING);
    loader.insert("shadows", SHADOWS);
    loader.insert("particles", PARTICLES);
    loader.insert("library", LIBRARY);
    loader
}

fn session() -> Session<'static> {
    let desc = SessionDesc::new()
        .with_target(TargetDesc::new(TargetFormat::Spirv, "spirv_1_6"))
        .with_target(TargetDesc::new(TargetFormat::Hlsl, "sm_6_0"))
        .with_search_path("shaders");
    Session::with_front_end(Registry::global(), desc, ShaderFrontEnd::with_loader(loader()))
        .expect("session descriptor is valid")
}

/// Load every named module and collect it with all of its entry points.
fn load_all(session: &mut Session<'_>, names: &[&str]) -> Vec<ComponentType> {
    let mut components = Vec::new();
    for name in names {
        let module = session.load_module(name).value.expect("module loads");
        components.push(module.into());
        let module = session.module(module);
        for i in 0..module.entry_point_count() {
            components.push(module.entry_point(i).expect("in range").into());
        }
    }
    components
}

fn load_benchmarks(c: &mut Criterion) {
    setup_profiler();

    let mut group = c.benchmark_group("link/load");
    for (name, source) in [("lighting", LIGHTING), ("particles", PARTICLES)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_function(name, |b| {
            let mut session = session();
            b.iter(|| {
                let module = session.load_module(black_box(name));
                end_profiling_frame();
                black_box(module.value)
            });
        });
    }
    group.finish();
}

fn compose_benchmarks(c: &mut Criterion) {
    setup_profiler();

    let mut group = c.benchmark_group("link/compose");
    group.bench_function("lighting_shadows", |b| {
        let mut session = session();
        let components = load_all(&mut session, &["lighting", "shadows"]);
        b.iter(|| {
            let program = session.create_composite_component_type(black_box(&components));
            end_profiling_frame();
            black_box(program.value)
        });
    });
    group.bench_function("everything", |b| {
        let mut session = session();
        let components =
            load_all(&mut session, &["lighting", "shadows", "particles", "library"]);
        b.iter(|| {
            let program = session.create_composite_component_type(black_box(&components));
            end_profiling_frame();
            black_box(program.value)
        });
    });
    group.finish();
}

fn pipeline_benchmarks(c: &mut Criterion) {
    setup_profiler();

    let mut group = c.benchmark_group("link/pipeline");
    group.bench_function("fresh_session", |b| {
        b.iter(|| {
            let mut session = session();
            let components = load_all(&mut session, &["lighting", "shadows"]);
            let program = session
                .create_composite_component_type(&components)
                .value
                .expect("program links");
            let count = session
                .layout(program.into(), 0)
                .expect("layout exists")
                .parameter_count();
            end_profiling_frame();
            black_box(count)
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    load_benchmarks,
    compose_benchmarks,
    pipeline_benchmarks
);
criterion_main!(benches);
