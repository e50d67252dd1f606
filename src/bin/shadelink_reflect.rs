//! Load a module, compose it with all of its entry points and print the layout.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use shadelink::{
    ComponentType, CreateSession, Diagnostics, Registry, SessionDesc, TargetDesc, TargetFlags,
    TargetFormat,
};

#[derive(Parser)]
#[command(name = "shadelink-reflect")]
#[command(version, about = "Print reflection for a shader module", long_about = None)]
struct Cli {
    /// Module to load, resolved as `<MODULE>.slang` in the search paths
    #[arg(default_value = "test")]
    module: String,

    /// Additional search path (the working directory is always searched first)
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Target format
    #[arg(long, default_value = "spirv")]
    target: String,

    /// Target profile
    #[arg(long, default_value = "spirv_1_6")]
    profile: String,

    /// Preprocessor definition, `NAME` or `NAME=VALUE`
    #[arg(short = 'D', long = "define")]
    defines: Vec<String>,

    /// Pack uniform buffers with scalar alignment
    #[arg(long)]
    scalar_layout: bool,
}

fn diagnose_if_needed(diagnostics: Option<&Diagnostics>) {
    if let Some(diagnostics) = diagnostics {
        print!("Diagnostics message:\n{}", diagnostics);
    }
}

fn session_desc(cli: &Cli, registry: &Registry) -> Result<SessionDesc> {
    let format = TargetFormat::from_name(&cli.target)
        .ok_or_else(|| anyhow!("unknown target format '{}'", cli.target))?;
    let flags = registry.capabilities(format).supported_flags()
        & (TargetFlags::GENERATE_SPIRV_DIRECTLY | TargetFlags::GENERATE_WHOLE_PROGRAM);
    let mut target = TargetDesc::new(format, cli.profile.clone()).with_flags(flags);
    if cli.scalar_layout {
        target = target.with_scalar_layout();
    }

    let cwd = std::env::current_dir().context("cannot determine the working directory")?;
    println!("CWD: {}", cwd.display());

    let mut desc = SessionDesc::new().with_target(target).with_search_path(cwd);
    for path in &cli.include {
        desc = desc.with_search_path(path.clone());
    }
    for define in &cli.defines {
        let (name, value) = define.split_once('=').unwrap_or((define.as_str(), ""));
        desc = desc.with_macro(name, value);
    }
    Ok(desc)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let registry = Registry::global();
    let desc = session_desc(&cli, registry)?;
    let mut session = registry
        .create_session(desc)
        .context("failed to create session")?;

    let loaded = session.load_module(&cli.module);
    diagnose_if_needed(loaded.diagnostics.as_ref());
    let Some(module) = loaded.value else {
        bail!("failed to load module '{}'", cli.module);
    };

    let mut components = vec![ComponentType::Module(module)];
    let entry_point_count = session.module(module).entry_point_count();
    for index in 0..entry_point_count {
        let entry_point = session.module(module).entry_point(index)?;
        println!("{}", session.entry_point(entry_point));
        components.push(entry_point.into());
    }

    let linked = session.create_composite_component_type(&components);
    diagnose_if_needed(linked.diagnostics.as_ref());
    let Some(program) = linked.value else {
        bail!("failed to link module '{}'", cli.module);
    };

    let layout = session.layout(ComponentType::Composite(program), 0)?;
    println!("{}", layout);
    Ok(())
}
