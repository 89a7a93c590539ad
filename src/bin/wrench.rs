// Wrench CLI - Command Line Interface
// Usage: wrench <script.wren | module> [ARGS]...

use clap::Parser;
use colored::*;
use flexi_logger::{Logger, LoggerHandle};
use std::path::PathBuf;

use wrench_core::config::ContextConfig;
use wrench_core::context::Context;
use wrench_core::entry::{main_source, EntryTarget, MAIN_MODULE};
use wrench_core::error::Result;
use wrench_core::vm::VmCallbacks;

/// Wrench - native module loader for Wren scripts
#[derive(Parser)]
#[command(name = "wrench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve Wren modules from scripts, native libraries and the registry", long_about = None)]
struct Cli {
    /// Script file (.wren) or module name to import
    target: String,

    /// Arguments passed on to the script
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,

    /// JSON configuration file (wrench.json)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Directory prefix for native libraries and scripts
    #[arg(short = 'b', long = "base-path")]
    base_path: Option<String>,

    /// Never open shared libraries
    #[arg(long = "no-foreign")]
    no_foreign: bool,

    /// Print the resolved main module source
    #[arg(short = 's', long = "print-source")]
    print_source: bool,

    /// Verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) -> Option<LoggerHandle> {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    match Logger::try_with_env_or_str(level).and_then(|logger| logger.log_to_stderr().start()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("{} logging disabled: {}", "!".yellow(), e);
            None
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let _logger = init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<ContextConfig> {
    let mut config = match &cli.config {
        Some(path) => ContextConfig::from_json_file(path)?,
        None => ContextConfig::default(),
    };
    if let Some(base) = &cli.base_path {
        config = config.base_path(base.clone());
    }
    if cli.no_foreign {
        config = config.foreign_library_loading(false);
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let command_line = std::iter::once(cli.target.clone()).chain(cli.args.iter().cloned());
    let mut ctx = Context::new(config, command_line, None)?;

    let target = EntryTarget::parse(&cli.target, ctx.script_extension());
    let source = main_source(&mut ctx, &target)?;

    // A bare module name is what the generated main module imports, so
    // resolve it the way the VM would.
    if let EntryTarget::Module(name) = &target {
        let resolved = ctx.resolve_module(MAIN_MODULE, name);
        let loaded = ctx.load_module(&resolved);
        if !loaded.is_found() {
            let reason = ctx.error().to_string();
            ctx.shutdown(None);
            return Err(wrench_core::error::Error::ModuleNotFound {
                module: format!("{} ({})", resolved, reason),
            });
        }
    }

    if cli.print_source {
        println!("{}", format!("-- {} --", MAIN_MODULE).cyan());
        println!("{}", source);
    }

    print_summary(&ctx);
    ctx.shutdown(None);
    Ok(())
}

fn print_summary(ctx: &Context) {
    let registry = ctx.registry();
    println!("{}", "-- Modules --".cyan());
    for module in registry.module_names() {
        let bytes = registry.module_source(module).map_or(0, str::len);
        println!("  {} {}", module.bold(), format!("({} bytes)", bytes).dimmed());
        for class in registry.class_names(module).unwrap_or_default() {
            let pending = registry.method_count(module, class).unwrap_or(0);
            println!("    {} {}", class, format!("{} unbound", pending).dimmed());
        }
    }

    let providers = ctx.provider_names();
    if !providers.is_empty() {
        println!("{} {}", "Native:".green(), providers.join(", "));
    }

    let nodes = registry.node_arena();
    let sources = registry.source_arena();
    println!(
        "{}",
        format!(
            "arenas: node {}/{} bytes, source {}/{} bytes",
            nodes.mark(),
            nodes.capacity(),
            sources.mark(),
            sources.capacity()
        )
        .dimmed()
    );
}
