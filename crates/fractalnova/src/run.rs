use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use renderer::{
    PaletteKind, RenderBackend, Renderer, RendererConfig, RunReport, MAX_ITERATIONS,
    MIN_ITERATIONS,
};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing(&cli.log_level);

    let config = renderer_config(&cli);
    tracing::info!(
        fractal = %config.fractal,
        palette = %config.palette,
        iterations = config.iterations,
        shader_dir = %config.shader_dir.display(),
        "starting fractalnova"
    );

    let mut renderer = Renderer::new(config);
    match renderer.run()? {
        RunReport::Closed => Ok(()),
        RunReport::DryRun {
            frames,
            calls,
            violations,
        } => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for (index, call) in calls.iter().enumerate() {
                writeln!(out, "{index:>5}  {call:?}").context("failed to write call trace")?;
            }
            writeln!(out, "{frames} frame(s), {} driver calls", calls.len())
                .context("failed to write call trace")?;

            if !violations.is_empty() {
                bail!(
                    "dry run detected {} driver misuse(s): {}",
                    violations.len(),
                    violations.join("; ")
                );
            }
            Ok(())
        }
    }
}

fn initialise_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn renderer_config(cli: &Cli) -> RendererConfig {
    let iterations = cli.iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS);
    if iterations != cli.iterations {
        tracing::warn!(
            requested = cli.iterations,
            iterations,
            "iteration count out of range; clamped"
        );
    }

    RendererConfig {
        window_size: cli.window_size,
        iterations,
        fractal: cli.fractal,
        palette: PaletteKind::from_name(&cli.palette),
        palette_size: cli.palette_size,
        vsync: cli.vsync,
        lazy_clear: cli.lazy_clear,
        texture_filtering: !cli.no_filtering,
        shader_dir: cli.shader_dir.clone(),
        backend: match cli.dry_run {
            Some(frames) => RenderBackend::DryRun { frames },
            None => RenderBackend::Window,
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn cli_flags_map_onto_renderer_config() {
        let cli = Cli::try_parse_from([
            "fractalnova",
            "--iterations",
            "5000",
            "--palette",
            "bw",
            "--no-filtering",
            "--lazy-clear",
            "--dry-run",
            "4",
        ])
        .expect("parse");
        let config = renderer_config(&cli);

        assert_eq!(config.iterations, MAX_ITERATIONS);
        assert_eq!(config.palette, PaletteKind::BlackAndWhite);
        assert!(!config.texture_filtering);
        assert!(config.lazy_clear);
        assert!(matches!(config.backend, RenderBackend::DryRun { frames: 4 }));
    }

    #[test]
    fn unknown_palette_falls_back_to_rainbow() {
        let cli = Cli::try_parse_from(["fractalnova", "--palette", "plaid"]).expect("parse");
        assert_eq!(renderer_config(&cli).palette, PaletteKind::Rainbow);
        assert!(matches!(
            renderer_config(&cli).backend,
            RenderBackend::Window
        ));
    }
}
