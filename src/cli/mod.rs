//! Command-line interface module.

mod args;

pub use args::{BuildArgs, Cli, Commands};

use anyhow::Result;

use crate::{
    config::ProjectConfig,
    core::BuildMode,
    logger,
    paths::PathRegistry,
    pipeline, serve,
};

/// Apply CLI overrides onto the loaded config and dispatch the command.
pub fn dispatch(cli: &Cli, mut config: ProjectConfig) -> Result<()> {
    match &cli.command {
        Commands::Build { build_args } => {
            apply_build_args(&mut config, build_args);
            let paths = PathRegistry::new(&config);
            let mode = if build_args.dev {
                BuildMode::Development
            } else {
                BuildMode::Production
            };
            pipeline::run(mode, &config, &paths).map(|_| ())
        }
        Commands::Serve {
            build_args,
            interface,
            port,
            watch,
            open,
        } => {
            apply_build_args(&mut config, build_args);
            if let Some(interface) = interface {
                config.serve.interface = *interface;
            }
            if let Some(port) = port {
                config.serve.port = *port;
            }
            if let Some(watch) = watch {
                config.serve.watch = *watch;
            }
            if let Some(open) = open {
                config.serve.open = *open;
            }
            let paths = PathRegistry::new(&config);
            serve::serve(config, paths)
        }
    }
}

fn apply_build_args(config: &mut ProjectConfig, args: &BuildArgs) {
    if args.verbose {
        logger::set_verbose(true);
    }
    if let Some(keep) = args.keep_uncompressed {
        config.build.keep_uncompressed = keep;
    }
}
