use clap::Parser;
use screen_navigation::cli::commands::{
    NavigateArgs, build_planner, cmd_encode, cmd_inspect, cmd_navigate, cmd_plan,
};
use screen_navigation::cli::config::{Cli, Commands, load_config};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref());

    // Resolve solver settings: CLI > config > defaults
    let solver = config.resolve_solver(&cli);
    let planner = build_planner(&solver)?;

    match cli.command {
        Commands::Plan {
            graph,
            from,
            to,
            via,
            format,
        } => {
            let reachable = cmd_plan(&graph, &from, &via, &to, format, &planner)?;
            if !reachable {
                std::process::exit(1);
            }
        }
        Commands::Encode {
            graph,
            current,
            target,
            codes,
        } => {
            cmd_encode(&graph, &current, &target, codes)?;
        }
        Commands::Inspect { graph } => {
            cmd_inspect(&graph)?;
        }
        Commands::Navigate {
            graph,
            to,
            driver,
            continue_on_failure,
            save,
            driver_args,
        } => {
            let args = NavigateArgs {
                graph_path: &graph,
                target: &to,
                driver: &driver,
                driver_args: &driver_args,
                continue_on_failure,
                save,
                trace: config.trace.as_deref(),
                driver_config: config.driver.to_driver_config(),
            };
            let arrived = cmd_navigate(&args, planner, config.session_config(), cli.verbose)?;
            if !arrived {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise each `-v` raises the level one step from `warn`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
