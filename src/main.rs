use clap::Parser;
use env_logger::Env;

use grid_pursuit::config::Config;
use grid_pursuit::simulation::Simulation;

fn main() {
    let config = Config::parse();

    let default_filter = if config.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if !config.quiet {
        println!("Starting pursuit simulation...");
        println!(
            "Grid size: {}x{} (spacing {})",
            config.width, config.height, config.cell_spacing
        );
        println!(
            "Obstacles: {} every {} steps, replan every {}s",
            config.num_obstacles, config.obstacle_interval, config.replan_interval
        );
        if config.no_visualization {
            println!("Visualization disabled - running in fast mode");
        } else {
            println!("Visualization enabled with {}ms delay", config.delay_ms);
            println!("Press Ctrl+C to stop the simulation");
        }
        println!();
    }

    let mut simulation = match Simulation::new(config.clone()) {
        Ok(simulation) => simulation,
        Err(e) => {
            eprintln!("Failed to create simulation: {}", e);
            std::process::exit(1);
        }
    };

    let (stats, timing) = simulation.run();

    println!("\n=== FINAL RESULTS ===");
    println!("Seed: {}", simulation.environment().seed);
    print!("{}", stats);

    println!("\n=== TIMING ANALYSIS ===");
    print!("{}", timing);
    if timing.total_calls() > 0 {
        let total: std::time::Duration = timing.find_path_times.iter().sum();
        println!("Total time in find_path: {:.2?}", total);
    }
}
