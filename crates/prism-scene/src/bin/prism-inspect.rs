//! prism-inspect - Load a scene file and summarize its component graph.
//!
//! ```text
//! prism-inspect scene.json
//! prism-inspect scene.json --resave out.json --config io.json
//! RUST_LOG=debug prism-inspect scene.json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use prism_scene::prelude::*;

/// Summarize a prism scene file
#[derive(Parser, Debug)]
#[command(name = "prism-inspect")]
#[command(version)]
#[command(about = "Load a prism scene file and summarize its component graph")]
struct Args {
    /// Scene file to load
    scene: PathBuf,

    /// Save the loaded scene again to this path
    #[arg(long, value_name = "OUT")]
    resave: Option<PathBuf>,

    /// Scene I/O settings (JSON); defaults apply when omitted
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SceneIoConfig::read_from(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => SceneIoConfig::default(),
    };

    let registry = prism_scene::registry();
    let scene = load_scene(&args.scene, registry, &config)?;
    summarize(registry, &scene)?;

    if let Some(out) = &args.resave {
        save_scene(out, registry, &scene, &config)?;
    }
    Ok(())
}

fn summarize(registry: &TypeRegistry, scene: &Scene) -> anyhow::Result<()> {
    let index = scene.index();
    tracing::info!(
        width = scene.film.width,
        height = scene.film.height,
        components = index.len(),
        "scene summary"
    );
    for (type_name, count) in index.count_by_type() {
        tracing::info!(type_name, count, "components");
    }

    let cameras = Catalog::<dyn Camera>::of(registry)?;
    log_catalog(&cameras, scene.camera().map(|c| c.type_name()));
    let samplers = Catalog::<dyn Sampler>::of(registry)?;
    log_catalog(&samplers, Some(samplers.current(&scene.sampler)));
    let integrators = Catalog::<dyn Integrator>::of(registry)?;
    log_catalog(&integrators, Some(integrators.current(&scene.integrator)));
    log_catalog(&Catalog::<dyn Material>::of(registry)?, None);
    log_catalog(&Catalog::<dyn Shader>::of(registry)?, None);

    for dangling in scene.dangling_references() {
        tracing::warn!(
            location = %dangling.location,
            target = dangling.target.to_raw(),
            "dangling reference"
        );
    }
    Ok(())
}

fn log_catalog<I: Interface + ?Sized>(catalog: &Catalog<'_, I>, selected: Option<&str>) {
    tracing::info!(
        interface = catalog.tag(),
        choices = %catalog.entries().join(", "),
        selected = selected.unwrap_or("-"),
        "catalog"
    );
}
