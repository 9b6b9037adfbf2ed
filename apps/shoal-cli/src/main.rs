mod config;

use std::cell::RefCell;
use std::fmt::Display;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use shoal_behavior::Fish;
use shoal_kernel::{ManualClock, PacedHost, SimulatedHost, TickReport, World};
use shoal_render::{DebugTextRenderer, HeadlessRenderer, Renderer};
use shoal_tools::WorldInspector;
use tracing_subscriber::EnvFilter;

use crate::config::AquariumConfig;

#[derive(Parser)]
#[command(name = "shoal", about = "Aquarium scene engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the version and the effective configuration
    Info,
    /// Run the aquarium
    Run {
        /// Stop after this many frames
        #[arg(short, long)]
        frames: Option<u64>,
        /// Number of fish
        #[arg(long)]
        fish: Option<usize>,
        /// Base seed for fish destinations
        #[arg(long)]
        seed: Option<u64>,
        /// Step a simulated clock instead of sleeping between frames
        #[arg(long)]
        simulated: bool,
        /// Print the text rendering of the scene instead of frame summaries
        #[arg(long)]
        text: bool,
        /// Print every Nth frame
        #[arg(long, default_value = "60")]
        every: u64,
    },
    /// Simulate some frames, then describe the world and the first fish
    Inspect {
        /// Frames to simulate first
        #[arg(short, long, default_value = "60")]
        frames: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => AquariumConfig::load(path)?,
        None => AquariumConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("shoal v{}", env!("CARGO_PKG_VERSION"));
            print!("{}", config.to_yaml()?);
        }
        Commands::Run {
            frames,
            fish,
            seed,
            simulated,
            text,
            every,
        } => {
            config.frames = frames.or(config.frames);
            config.fish_count = fish.unwrap_or(config.fish_count);
            config.seed = seed.unwrap_or(config.seed);
            if text {
                run(DebugTextRenderer::new(), &config, simulated, every)?;
            } else {
                run(HeadlessRenderer::new(), &config, simulated, every)?;
            }
        }
        Commands::Inspect { frames } => inspect(&config, frames)?,
    }

    Ok(())
}

fn frame_step(config: &AquariumConfig) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(config.fps.max(1)))
}

/// Load the template now; set the camera and spawn the fish once loading settles.
fn populate<R: Renderer + 'static>(
    world: &mut World<R>,
    config: &AquariumConfig,
) -> Rc<RefCell<Vec<Fish>>> {
    if world.load_model(&config.template, &config.model, false).is_err() {
        tracing::warn!(template = %config.template, "no template; the tank will stay empty");
    }
    if config.show_grid
        && let Err(e) = world.show_grid()
    {
        tracing::warn!(error = %e, "grid not shown");
    }

    let shoal = Rc::new(RefCell::new(Vec::new()));
    let spawned = Rc::clone(&shoal);
    let config = config.clone();
    world.on_loaded(move |world| {
        // camera only after loading, so the first rendered frame is complete
        world.set_camera(Some(config.camera()));
        for i in 0..config.fish_count {
            let seed = config.seed.wrapping_add(i as u64);
            match Fish::spawn(world, &config.template, config.fish.clone(), seed) {
                Ok(fish) => spawned.borrow_mut().push(fish),
                Err(e) => {
                    tracing::error!(error = %e, "fish spawn failed");
                    break;
                }
            }
        }
        tracing::info!(fish = spawned.borrow().len(), "aquarium populated");
    });
    shoal
}

fn run<R>(renderer: R, config: &AquariumConfig, simulated: bool, every: u64) -> anyhow::Result<()>
where
    R: Renderer + 'static,
    R::Output: Display,
{
    let clock = ManualClock::new();
    let mut world = World::new(renderer);
    if simulated {
        world = world.with_clock(clock.clone());
    }
    let shoal = populate(&mut world, config);

    let every = every.max(1);
    let on_frame = |report: &TickReport<R::Output>| {
        let due = every == 1 || report.frame % every == 1;
        if let (true, Some(output)) = (due, &report.output) {
            println!("frame {} (dt={:.4}s): {output}", report.frame, report.delta);
        }
    };

    let frames = if simulated {
        let count = config.frames.unwrap_or(u64::from(config.fps) * 10);
        let mut host = SimulatedHost::new(clock, frame_step(config), count);
        world.run_with(&mut host, on_frame)
    } else {
        let [width, height] = config.viewport;
        let mut host = PacedHost::new(config.fps, config.frames).with_viewport(width, height);
        world.run_with(&mut host, on_frame)
    };

    println!("{}", WorldInspector::summary(&world));
    for fish in shoal.borrow_mut().iter_mut() {
        fish.dispose(&mut world)?;
    }
    tracing::info!(frames, "run complete");
    Ok(())
}

fn inspect(config: &AquariumConfig, frames: u64) -> anyhow::Result<()> {
    let clock = ManualClock::new();
    let mut world = World::new(HeadlessRenderer::new()).with_clock(clock.clone());
    let shoal = populate(&mut world, config);
    world.run(&mut SimulatedHost::new(clock, frame_step(config), frames));

    println!("{}", WorldInspector::summary(&world));
    for failure in world.load_failures() {
        println!(
            "load failed: {} from {}: {}",
            failure.name,
            failure.path.display(),
            failure.message
        );
    }

    let shoal = shoal.borrow();
    let Some(fish) = shoal.first() else {
        println!("no fish spawned");
        return Ok(());
    };
    let scene = world.scene();
    if let Some(info) = WorldInspector::inspect_node(scene, fish.mesh()) {
        println!("{info}");
    }
    let destination = fish.destination();
    println!(
        "destination=({:.2}, {:.2}) yaw={:.3} clip={}",
        destination.x,
        destination.y,
        fish.yaw(scene).unwrap_or_default(),
        fish.active_clip().as_deref().unwrap_or("none")
    );
    print!("{}", WorldInspector::tree(scene, fish.mesh()));
    for skin in WorldInspector::skins(scene, fish.mesh()) {
        println!(
            "skin {} -> [{}] self_contained={}",
            skin.mesh_name,
            skin.bones.join(", "),
            skin.self_contained
        );
    }
    Ok(())
}
