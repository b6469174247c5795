use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre;
use indicatif::{ProgressBar, ProgressStyle};

use usd_scene_index::{MeshLoader, SceneIndexConfig, build_index_with_config};

#[derive(Debug, Parser)]
#[command(about = "Scene-index builder and loader for textual scene files")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compose a root stage and write the binary scene index.
    Build {
        /// Root stage file.
        input: PathBuf,
        /// Output index path.
        output: PathBuf,
        /// Drop meshes from the first N discovered files.
        #[arg(long)]
        skip_files: Option<usize>,
        /// Stop loading new files after this many (post-skip).
        #[arg(long)]
        max_files: Option<usize>,
    },
    /// Load an index and print what a consumer would spawn.
    Load {
        /// Index file.
        index: PathBuf,
        /// Load at most N meshes (0 = all).
        #[arg(long, default_value_t = 0)]
        max_meshes: usize,
    },
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SceneIndexConfig::from_toml_file(path)?,
        None => SceneIndexConfig::default(),
    };

    let start = std::time::Instant::now();

    match cli.command {
        Command::Build {
            input,
            output,
            skip_files,
            max_files,
        } => {
            if let Some(n) = skip_files {
                config = config.with_skip_files(n);
            }
            if max_files.is_some() {
                config = config.with_max_files(max_files);
            }

            let bar = ProgressBar::new_spinner().with_style(
                ProgressStyle::default_spinner()
                    .template("{spinner} Files: {prefix} Meshes: {msg}")?,
            );
            bar.enable_steady_tick(Duration::from_millis(100));

            let progress = {
                let bar = bar.clone();
                move |files: u64, meshes: u64| {
                    bar.set_prefix(files.to_string());
                    bar.set_message(meshes.to_string());
                }
            };
            let (report, summary) = build_index_with_config(&input, &output, config, progress)?;
            bar.finish_and_clear();

            println!(
                "Indexed {} meshes ({} skinned) from {} files into {}",
                summary.record_count,
                report.skinned_meshes,
                report.files_visited,
                output.display()
            );
            println!(
                "  {} source paths, {} shards merged, {} prims walked",
                summary.source_count, summary.shard_count, report.prims_visited
            );
            if report.halted {
                println!("  traversal halted early");
            }
        }
        Command::Load { index, max_meshes } => {
            let loader = MeshLoader::new();
            let meshes = loader.load_from_index(&index, max_meshes)?;
            for mesh in &meshes {
                println!(
                    "{} [{}] tris={} pos=({:.2}, {:.2}, {:.2})",
                    mesh.name,
                    mesh.source_path,
                    mesh.geometry.triangle_count,
                    mesh.transform.position.x,
                    mesh.transform.position.y,
                    mesh.transform.position.z,
                );
            }
            println!("Loaded {} meshes", meshes.len());
        }
    }

    let elapsed = start.elapsed();
    println!("Elapsed: {:.2?} seconds", elapsed.as_secs_f32());

    Ok(())
}
