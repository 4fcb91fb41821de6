//! `jit-golden`: run HIR golden fixtures.

use std::path::PathBuf;
use std::sync::Once;

use jit_golden::{
    default_fixture_dir, load_suites, validate_suites, GoldenRunner, RunnerConfig,
    UnavailableFrontend,
};
use jit_opt::PassRegistry;

static TRACING_INIT: Once = Once::new();

/// Install a subscriber when `RUST_LOG` is set. `HIR_LOG_TREE` switches to
/// indented span trees, which read better for nested pass spans.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let filter = EnvFilter::from_default_env();
        let tree = std::env::var("HIR_LOG_TREE").is_ok();
        let (tree_layer, flat_layer) = if tree {
            (
                Some(tracing_tree::HierarchicalLayer::new(2).with_targets(true)),
                None,
            )
        } else {
            (
                None,
                Some(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                ),
            )
        };
        tracing_subscriber::registry()
            .with(flat_layer)
            .with(tree_layer)
            .with(filter)
            .init();
    });
}

fn print_usage() {
    eprintln!("Usage: jit-golden [options] [<fixture-dir-or-file>...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --filter=<pat>   Only run cases whose Suite.Case name contains <pat>");
    eprintln!("  --sequential     Run cases on the calling thread");
    eprintln!("  -v, --verbose    List disabled cases and suite timings");
    eprintln!();
    eprintln!("Default fixture directory: {}", default_fixture_dir().display());
}

fn main() {
    init_tracing();

    let mut config = RunnerConfig::default();
    let mut paths = Vec::new();
    for arg in std::env::args().skip(1) {
        if let Some(filter) = arg.strip_prefix("--filter=") {
            config.filter = Some(filter.to_string());
        } else if arg == "--sequential" {
            config.parallel = false;
        } else if arg == "--verbose" || arg == "-v" {
            config.verbose = true;
        } else if arg == "--help" || arg == "-h" {
            print_usage();
            return;
        } else if arg.starts_with('-') {
            eprintln!("error: unknown option `{arg}`");
            print_usage();
            std::process::exit(2);
        } else {
            paths.push(PathBuf::from(arg));
        }
    }
    if paths.is_empty() {
        paths.push(default_fixture_dir().to_path_buf());
    }

    if let Err(e) = jit_hir::stable::set_use_stable_pointers(true) {
        eprintln!("ERROR {e}");
        std::process::exit(1);
    }

    // Fixture and pass-name problems abort before any case runs.
    let registry = PassRegistry::new();
    let suites = match load_suites(&paths) {
        Ok(suites) => suites,
        Err(e) => {
            eprintln!("ERROR {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = validate_suites(&registry, &suites) {
        eprintln!("ERROR {e}");
        std::process::exit(1);
    }

    let verbose = config.verbose;
    let summary = GoldenRunner::new(&registry, &UnavailableFrontend, config).run(&suites);
    print!("{}", summary.report(verbose));
    std::process::exit(summary.exit_code());
}
