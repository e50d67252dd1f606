//! Integration tests for composition: conflicts, completeness and collisions.

use shadelink::{
    ComponentType, DiagnosticCode, LayoutError, LinkOptions, MemoryLoader, ModuleId, Registry,
    Session, SessionDesc, Severity, ShaderFrontEnd, TargetDesc, TargetFormat,
};

fn session_with(targets: &[TargetDesc], sources: &[(&str, &str)]) -> Session<'static> {
    let mut loader = MemoryLoader::new();
    for (name, text) in sources {
        loader.insert(*name, *text);
    }
    let mut desc = SessionDesc::new();
    for target in targets {
        desc = desc.with_target(target.clone());
    }
    Session::with_front_end(Registry::global(), desc, ShaderFrontEnd::with_loader(loader))
        .expect("Failed to create session")
}

fn spirv() -> TargetDesc {
    TargetDesc::new(TargetFormat::Spirv, "spirv_1_6")
}

fn hlsl() -> TargetDesc {
    TargetDesc::new(TargetFormat::Hlsl, "sm_5_1")
}

fn load(session: &mut Session<'_>, name: &str) -> ModuleId {
    let outcome = session.load_module(name);
    assert!(outcome.value.is_some(), "{:?}", outcome.diagnostics);
    outcome.value.unwrap()
}

/// The module followed by all of its entry points.
fn with_entry_points(session: &Session<'_>, module: ModuleId) -> Vec<ComponentType> {
    let module_ref = session.module(module);
    let mut components = vec![ComponentType::Module(module)];
    for i in 0..module_ref.entry_point_count() {
        components.push(module_ref.entry_point(i).unwrap().into());
    }
    components
}

const BLIT: &str = r#"
    Texture2D source;
    SamplerState samp;
    [shader("fragment")]
    float4 main(float2 uv : TEXCOORD0) : SV_Target { return source.Sample(samp, uv); }
"#;

const NEEDS_NOISE: &str = r#"
    float noise(float2 p);
    [shader("fragment")]
    float4 main(float2 uv : TEXCOORD0) : SV_Target { return float4(noise(uv).xxx, 1.0); }
"#;

const NOISE: &str = r#"
    Texture2D noiseTexture;
    float noise(float2 p) { return noiseTexture.Load(int3(p, 0)).r; }
"#;

// =============================================================================
// Success Paths
// =============================================================================

#[test]
fn test_module_and_its_entry_point_compose() {
    let mut session = session_with(&[spirv()], &[("blit", BLIT)]);
    let module = load(&mut session, "blit");
    let outcome = session.create_composite_component_type(&with_entry_points(&session, module));

    assert!(outcome.diagnostics.is_none());
    let program = outcome.value.unwrap();
    let layout = session.layout(program.into(), 0).unwrap();
    assert_eq!(layout.entry_point_count(), 1);
    assert_eq!(layout.parameter_count(), 2);
}

#[test]
fn test_entry_point_alone_brings_its_module() {
    let mut session = session_with(&[spirv()], &[("blit", BLIT)]);
    let module = load(&mut session, "blit");
    let entry_point = session.module(module).entry_point(0).unwrap();

    let program = session
        .create_composite_component_type(&[entry_point.into()])
        .value
        .unwrap();
    let composite = session.composite(program);
    assert_eq!(composite.modules().collect::<Vec<_>>(), [module]);
    assert_eq!(composite.entry_points().collect::<Vec<_>>(), [entry_point]);
}

#[test]
fn test_same_module_twice_is_idempotent() {
    let mut session = session_with(&[spirv()], &[("blit", BLIT)]);
    let module = load(&mut session, "blit");
    let entry_point = session.module(module).entry_point(0).unwrap();

    let outcome = session.create_composite_component_type(&[
        module.into(),
        module.into(),
        entry_point.into(),
        entry_point.into(),
    ]);
    let program = outcome.value.unwrap();
    let layout = session.layout(program.into(), 0).unwrap();
    assert_eq!(layout.parameter_count(), 2);
    assert_eq!(layout.entry_point_count(), 1);
}

#[test]
fn test_reloaded_module_deduplicates() {
    let mut session = session_with(&[spirv()], &[("blit", BLIT)]);
    let first = load(&mut session, "blit");
    let second = load(&mut session, "blit");

    let mut components = with_entry_points(&session, first);
    components.extend(with_entry_points(&session, second));
    let program = session.create_composite_component_type(&components).value.unwrap();

    assert_eq!(session.composite(program).modules().count(), 1);
    let layout = session.layout(program.into(), 0).unwrap();
    assert_eq!(layout.parameter_count(), 2);
    assert_eq!(layout.entry_point_count(), 1);
}

#[test]
fn test_input_order_does_not_change_counts() {
    let mut session = session_with(&[spirv()], &[("needs_noise", NEEDS_NOISE), ("noise", NOISE)]);
    let user = load(&mut session, "needs_noise");
    let provider = load(&mut session, "noise");

    let mut forward = with_entry_points(&session, user);
    forward.push(provider.into());
    let mut backward = vec![ComponentType::Module(provider)];
    backward.extend(with_entry_points(&session, user).into_iter().rev());

    let a = session.create_composite_component_type(&forward).value.unwrap();
    let b = session.create_composite_component_type(&backward).value.unwrap();
    let (a, b) = (
        session.layout(a.into(), 0).unwrap(),
        session.layout(b.into(), 0).unwrap(),
    );
    assert_eq!(a.parameter_count(), b.parameter_count());
    assert_eq!(a.entry_point_count(), b.entry_point_count());
}

// =============================================================================
// Conflicts
// =============================================================================

#[test]
fn test_incompatible_globals_conflict() {
    let mut session = session_with(
        &[spirv()],
        &[("a", "Texture2D albedo;"), ("b", "Texture2D<uint> albedo;")],
    );
    let a = load(&mut session, "a");
    let b = load(&mut session, "b");

    let outcome = session.create_composite_component_type(&[a.into(), b.into()]);
    assert!(outcome.value.is_none());
    let diagnostics = outcome.diagnostics.unwrap();
    assert_eq!(diagnostics.error_count(), 1);
    let conflict = diagnostics.errors().next().unwrap();
    assert_eq!(conflict.code, DiagnosticCode::SymbolConflict);
    assert_eq!(conflict.origin.as_deref(), Some("module 'b'"));
    assert_eq!(conflict.related.as_deref(), Some("module 'a'"));
}

#[test]
fn test_incompatible_function_signatures_conflict() {
    let mut session = session_with(
        &[spirv()],
        &[
            ("a", "float noise(float2 p);"),
            ("b", "float noise(float3 p) { return p.x; }"),
        ],
    );
    let a = load(&mut session, "a");
    let b = load(&mut session, "b");

    let diagnostics = session
        .create_composite_component_type(&[a.into(), b.into()])
        .diagnostics
        .unwrap();
    let message = &diagnostics.errors().next().unwrap().message;
    assert_eq!(
        message,
        "conflicting declarations of 'noise': signatures (float2) -> float and (float3) -> float differ"
    );
}

// =============================================================================
// Completeness
// =============================================================================

#[test]
fn test_unresolved_extern_fails_composition() {
    let mut session = session_with(&[spirv()], &[("needs_noise", NEEDS_NOISE)]);
    let module = load(&mut session, "needs_noise");

    let outcome = session.create_composite_component_type(&with_entry_points(&session, module));
    assert!(outcome.value.is_none());
    let diagnostics = outcome.diagnostics.unwrap();
    let error = diagnostics.errors().next().unwrap();
    assert_eq!(error.code, DiagnosticCode::UnresolvedReference);
    assert_eq!(
        error.message,
        "entry point 'main' references unresolved symbol 'noise'"
    );
    assert_eq!(
        error.origin.as_deref(),
        Some("entry point 'main' of module 'needs_noise'")
    );
}

#[test]
fn test_extern_satisfied_by_another_module() {
    let mut session = session_with(&[spirv()], &[("needs_noise", NEEDS_NOISE), ("noise", NOISE)]);
    let user = load(&mut session, "needs_noise");
    let provider = load(&mut session, "noise");

    let mut components = with_entry_points(&session, user);
    components.push(provider.into());
    let program = session.create_composite_component_type(&components).value.unwrap();

    let layout = session.layout(program.into(), 0).unwrap();
    let texture = layout.find_parameter("noiseTexture").unwrap();
    assert_eq!(texture.module(), "noise");
}

#[test]
fn test_library_without_entry_points_needs_nothing() {
    let mut session = session_with(&[spirv()], &[("needs_noise", NEEDS_NOISE)]);
    let module = load(&mut session, "needs_noise");

    let program = session
        .create_composite_component_type(&[module.into()])
        .value
        .unwrap();
    assert!(session.composite(program).is_complete());
}

#[test]
fn test_partial_composite_links_later() {
    let mut session = session_with(&[spirv()], &[("needs_noise", NEEDS_NOISE), ("noise", NOISE)]);
    let user = load(&mut session, "needs_noise");
    let provider = load(&mut session, "noise");

    let partial = session.create_composite_component_type_with(
        &with_entry_points(&session, user),
        LinkOptions {
            require_complete: false,
        },
    );
    let warnings = partial.diagnostics.unwrap();
    assert!(!warnings.has_errors());
    assert_eq!(warnings.iter().next().unwrap().severity, Severity::Warning);
    let partial = partial.value.unwrap();

    let composite = session.composite(partial);
    assert!(!composite.is_complete());
    assert_eq!(composite.unresolved().collect::<Vec<_>>(), [("noise", "main")]);
    assert!(matches!(
        session.layout(partial.into(), 0),
        Err(LayoutError::NotLinked { .. })
    ));

    let complete = session
        .create_composite_component_type(&[partial.into(), provider.into()])
        .value
        .unwrap();
    let layout = session.layout(complete.into(), 0).unwrap();
    assert_eq!(layout.entry_point_count(), 1);
    assert_eq!(layout.parameter_count(), 1);
}

// =============================================================================
// Binding Collisions
// =============================================================================

#[test]
fn test_explicit_register_collision() {
    let mut session = session_with(
        &[hlsl()],
        &[
            ("a", "Texture2D first : register(t1);"),
            ("b", "Texture2D<float4> second[2] : register(t0);"),
        ],
    );
    let a = load(&mut session, "a");
    let b = load(&mut session, "b");

    let diagnostics = session
        .create_composite_component_type(&[a.into(), b.into()])
        .diagnostics
        .unwrap();
    let error = diagnostics.errors().next().unwrap();
    assert_eq!(error.code, DiagnosticCode::BindingCollision);
    assert_eq!(
        error.message,
        "parameter 'second' binding t1 (space 0) collides with 'first' on target hlsl"
    );
    assert_eq!(error.origin.as_deref(), Some("module 'b'"));
}

#[test]
fn test_descriptor_collisions_depend_on_target() {
    let source = "[vk::binding(0)] Texture2D color;\n[vk::binding(0)] SamplerState samp;";

    let mut session = session_with(&[spirv()], &[("m", source)]);
    let module = load(&mut session, "m");
    let outcome = session.create_composite_component_type(&[module.into()]);
    assert!(outcome.value.is_none());
    assert!(
        outcome
            .diagnostics
            .unwrap()
            .has_code(DiagnosticCode::BindingCollision)
    );

    let mut session = session_with(&[hlsl()], &[("m", source)]);
    let module = load(&mut session, "m");
    let program = session
        .create_composite_component_type(&[module.into()])
        .value
        .unwrap();
    let layout = session.layout(program.into(), 0).unwrap();
    assert_eq!(layout.find_parameter("color").unwrap().binding_index(), 0);
    assert_eq!(layout.find_parameter("samp").unwrap().binding_index(), 0);
}

#[test]
fn test_collision_on_any_target_fails_the_composition() {
    let source = "[vk::binding(2)] Texture2D color;\n[vk::binding(2)] Texture2D depth;";
    let mut session = session_with(&[hlsl(), spirv()], &[("m", source)]);
    let module = load(&mut session, "m");

    let outcome = session.create_composite_component_type(&[module.into()]);
    assert!(outcome.value.is_none());
    let error = outcome.diagnostics.unwrap().errors().next().cloned().unwrap();
    assert!(error.message.ends_with("on target spirv"), "{}", error.message);
}

// =============================================================================
// Range Limits
// =============================================================================

#[test]
fn test_oversized_uniform_is_reported() {
    let mut session = session_with(&[spirv()], &[("m", "float4 big[300000000];")]);
    let module = load(&mut session, "m");

    let outcome = session.create_composite_component_type(&[module.into()]);
    assert!(outcome.value.is_none());
    let diagnostics = outcome.diagnostics.unwrap();
    assert_eq!(diagnostics.error_count(), 1);
    let error = diagnostics.errors().next().unwrap();
    assert_eq!(error.code, DiagnosticCode::LayoutOverflow);
    assert_eq!(
        error.message,
        "parameter 'big' is too large to lay out on target spirv"
    );
    assert_eq!(error.origin.as_deref(), Some("module 'm'"));
}

#[test]
fn test_global_buffer_past_four_gigabytes_is_reported() {
    // Each array fits on its own; together they do not.
    let source = "float4 first[200000000];\nfloat4 second[200000000];";
    let mut session = session_with(&[hlsl()], &[("m", source)]);
    let module = load(&mut session, "m");

    let outcome = session.create_composite_component_type(&[module.into()]);
    assert!(outcome.value.is_none());
    let diagnostics = outcome.diagnostics.unwrap();
    let messages: Vec<_> = diagnostics.errors().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        ["parameter 'second' is too large to lay out on target hlsl"]
    );
}

#[test]
fn test_slots_are_never_shared_at_the_end_of_the_range() {
    let source = "Texture2D a[4294967295];\nTexture2D b;\nTexture2D c;";
    let mut session = session_with(&[spirv()], &[("m", source)]);
    let module = load(&mut session, "m");

    let outcome = session.create_composite_component_type(&[module.into()]);
    assert!(outcome.value.is_none());
    let diagnostics = outcome.diagnostics.unwrap();
    assert!(diagnostics.iter().all(|d| d.code == DiagnosticCode::BindingsExhausted));
    let messages: Vec<_> = diagnostics.errors().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        [
            "parameter 'b' needs 1 binding slot(s) but set0 has no free run left on target spirv",
            "parameter 'c' needs 1 binding slot(s) but set0 has no free run left on target spirv",
        ]
    );
}

#[test]
fn test_explicit_range_past_the_last_register() {
    let source = "Texture2D tail[2] : register(t4294967295);";
    let mut session = session_with(&[hlsl()], &[("m", source)]);
    let module = load(&mut session, "m");

    let outcome = session.create_composite_component_type(&[module.into()]);
    assert!(outcome.value.is_none());
    let error = outcome.diagnostics.unwrap().errors().next().cloned().unwrap();
    assert_eq!(error.code, DiagnosticCode::BindingsExhausted);
    assert_eq!(
        error.message,
        "parameter 'tail' needs 2 binding slot(s) but t/space0 has no free run left on target hlsl"
    );
}
