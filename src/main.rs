use clap::{Parser, Subcommand};

use ferrous_sieve::pipelines::linear::filter::main_filter;
use ferrous_sieve::pipelines::linear::filter_opt::FilterCliOptions;

#[derive(Parser)]
#[command(name = "ferrous-sieve")]
#[command(about = "FerrousSieve - approximate seed-and-extend read filter against reference databases", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split reads into those that align to the references and those that do not
    Filter(FilterCliOptions),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Filter(opts) => {
            // 1=error, 2=warning, 3=message, 4=debug, 5+=trace
            let log_level = match opts.verbosity {
                v if v <= 1 => log::LevelFilter::Error,
                2 => log::LevelFilter::Warn,
                3 => log::LevelFilter::Info,
                4 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            };

            env_logger::Builder::from_default_env()
                .filter_level(log_level)
                .format_timestamp(None)
                .format_target(false)
                .init();

            if opts.reads.len() > 2 {
                log::error!(
                    "Maximum 2 read files allowed (paired-end), got {} files:",
                    opts.reads.len()
                );
                for (i, r) in opts.reads.iter().enumerate() {
                    log::error!("  File {}: {}", i + 1, r.display());
                }
                std::process::exit(1);
            }

            let mut num_threads = opts.threads.unwrap_or_else(num_cpus::get);
            if num_threads < 1 {
                log::warn!("Invalid thread count {}, using 1 thread", num_threads);
                num_threads = 1;
            }
            let max_threads = num_cpus::get() * 2;
            if num_threads > max_threads {
                log::warn!(
                    "Thread count {} exceeds recommended maximum {}, capping at {}",
                    num_threads,
                    max_threads,
                    max_threads
                );
                num_threads = max_threads;
            }

            // Index construction runs on the rayon pool
            if let Err(e) = rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
            {
                log::warn!(
                    "Failed to configure thread pool: {} (may already be initialized)",
                    e
                );
            }

            let opt = match opts.to_filter_opt(num_threads) {
                Ok(mut opt) => {
                    opt.n_threads = num_threads;
                    opt
                }
                Err(e) => {
                    log::error!("{}", e);
                    std::process::exit(1);
                }
            };

            if let Err(e) = main_filter(&opts, opt) {
                log::error!("{:#}", e);
                std::process::exit(1);
            }
        }
    }
}
