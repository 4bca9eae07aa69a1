//! Print a generated Haven world as ASCII.
//!
//! `.` empty, `T` tree, `R` rock, `#` other obstacle, `~` water, `H` house
//! floor, `o` path step, `S`/`G` path start and goal.

use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use haven_world::mapgen::CellState;
use haven_world::{
    generate_terrain_in_background, AuthoritativeWorld, GameWorld, GridChecksum, PathOutcome, Seed,
    WorldConfig, WorldSynchronizer,
};

#[derive(Parser)]
#[command(name = "haven-map")]
#[command(about = "Generate a Haven world and print it as ASCII")]
struct Cli {
    /// World seed, number or text
    #[arg(long, default_value = "42")]
    seed: String,

    /// Override the map size from the config
    #[arg(long)]
    size: Option<i32>,

    /// JSON world config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also print water autotile indices (hex, one digit per cell)
    #[arg(long)]
    autotile: bool,

    /// Sync the server's resource list onto the map before printing
    #[arg(long)]
    server: bool,

    /// Harvest the server resource at X,Y after syncing
    #[arg(long, value_parser = parse_cell, requires = "server")]
    harvest: Option<(i32, i32)>,

    /// Find a path, as X1,Y1,X2,Y2
    #[arg(long, value_parser = parse_route)]
    path: Option<Route>,
}

#[derive(Debug, Clone, Copy)]
struct Route {
    start: (i32, i32),
    goal: (i32, i32),
}

fn parse_ints(raw: &str) -> Result<Vec<i32>, String> {
    raw.split(',')
        .map(|p| p.trim().parse::<i32>().map_err(|e| format!("{:?}: {}", p, e)))
        .collect()
}

fn parse_cell(raw: &str) -> Result<(i32, i32), String> {
    match parse_ints(raw)?[..] {
        [x, y] => Ok((x, y)),
        _ => Err(format!("expected X,Y, got {:?}", raw)),
    }
}

fn parse_route(raw: &str) -> Result<Route, String> {
    match parse_ints(raw)?[..] {
        [x1, y1, x2, y2] => Ok(Route { start: (x1, y1), goal: (x2, y2) }),
        _ => Err(format!("expected X1,Y1,X2,Y2, got {:?}", raw)),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn cell_char(world: &GameWorld, x: i32, y: i32) -> char {
    if let Some(object) = world.objects().at(x, y) {
        if object.role.is_blocking() {
            return match object.asset.as_str() {
                "tree" | "apple_tree" => 'T',
                "rock" => 'R',
                _ => '#',
            };
        }
    }
    match world.cell(x, y) {
        CellState::Water => '~',
        CellState::Obstacle => '#',
        CellState::Empty if world.is_in_house(x, y) => 'H',
        CellState::Empty => '.',
    }
}

fn print_map(world: &GameWorld, route: Option<(Route, &HashSet<(i32, i32)>)>) {
    let size = world.grid().size();
    for y in 0..size {
        let row: String = (0..size)
            .map(|x| match route {
                Some((r, _)) if r.start == (x, y) => 'S',
                Some((r, _)) if r.goal == (x, y) => 'G',
                Some((_, steps)) if steps.contains(&(x, y)) => 'o',
                _ => cell_char(world, x, y),
            })
            .collect();
        println!("{}", row);
    }
}

fn print_autotile(world: &GameWorld) {
    let size = world.grid().size();
    println!();
    println!("Water autotile indices:");
    for y in 0..size {
        let row: String = (0..size)
            .map(|x| match world.water_connections(x, y) {
                Some(c) => char::from_digit(c.tile_index() as u32, 16).unwrap_or('?'),
                None => ' ',
            })
            .collect();
        println!("{}", row.trim_end());
    }
}

async fn run(cli: Cli) -> haven_world::Result<()> {
    let mut config = match &cli.config {
        Some(path) => WorldConfig::load(path)?,
        None => WorldConfig::default(),
    };
    if let Some(size) = cli.size {
        config.map_size = size;
        config.validate()?;
    }

    let seed = Seed::from(cli.seed.as_str());
    let mut world = GameWorld::generate(&seed, config.clone())?;

    if cli.server {
        // The server regenerates terrain on its own; both sides must agree
        // before any objects are exchanged.
        let server_terrain = generate_terrain_in_background(seed.clone(), config.terrain()).await?;
        GridChecksum::verify(world.grid(), GridChecksum::of_terrain(&server_terrain))?;

        let mut server = AuthoritativeWorld::generate(&seed, &config)?;
        let mut sync = WorldSynchronizer::new();
        let diff = sync.sync(&mut world, &server.snapshot());
        println!(
            "Server objects: {} added, {} skipped",
            diff.added.len(),
            diff.skipped.len()
        );

        if let Some((x, y)) = cli.harvest {
            match server.harvest(x, y) {
                Some((object, item)) => {
                    sync.apply_removed(&mut world, &object.id);
                    println!("Harvested {} at ({}, {}) for {}", object.asset, x, y, item);
                }
                None => println!("Nothing to harvest at ({}, {})", x, y),
            }
        }
    }

    let route = match cli.path {
        Some(route) => {
            let mover = world.move_controller();
            match mover.move_to(route.start, route.goal).await {
                PathOutcome::Found(path) => {
                    let facing = path
                        .facings(route.start)
                        .first()
                        .map(|d| format!("{:?}", d))
                        .unwrap_or_else(|| "none".to_string());
                    println!(
                        "Path {:?} -> {:?}: {} steps, cost {:.2}, first facing {}",
                        route.start,
                        route.goal,
                        path.len(),
                        path.cost_from(route.start),
                        facing
                    );
                    Some((route, path.into_steps().into_iter().collect::<HashSet<_>>()))
                }
                PathOutcome::NoPath | PathOutcome::Superseded => {
                    println!("Path {:?} -> {:?}: none", route.start, route.goal);
                    None
                }
            }
        }
        None => None,
    };

    println!(
        "Seed {} ({:#010x}), {}x{}, water {}, objects {}",
        seed,
        world.seed,
        world.grid().size(),
        world.grid().size(),
        world.grid().count(CellState::Water),
        world.objects().len()
    );
    print_map(&world, route.as_ref().map(|(r, steps)| (*r, steps)));

    if cli.autotile {
        print_autotile(&world);
    }

    println!();
    println!("Checksum: {:#010x}", world.checksum());
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
