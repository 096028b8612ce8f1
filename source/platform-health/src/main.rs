use std::process;

use clap::Parser;
use tokio::runtime::Runtime;

use platform_health::app_context::{AppContext, ServerOptions};
use platform_health::cli::{Cli, Command};
use platform_health::client::{self, ClientOptions};
use platform_health::provider::builder;
use platform_health::provider::registry::ProviderRegistry;
use platform_health::{adhoc, migrate};

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let rt = Runtime::new().expect("Failed to build Tokio runtime");

    let code = rt.block_on(run(cli))?;
    if code != 0 {
        process::exit(code);
    }
    Ok(())
}

async fn run(cli: Cli) -> miette::Result<i32> {
    match cli.command {
        Command::Server {
            config,
            listen,
            server_id,
            strict,
            parallelism,
            no_watch,
        } => {
            let ctx = AppContext::bootstrap(ServerOptions {
                config,
                listen,
                server_id,
                strict,
                parallelism,
                watch: !no_watch,
            })?;
            ctx.run().await?;
            Ok(0)
        }

        Command::Client {
            server,
            context,
            components,
            fail_fast,
            output,
        } => {
            client::run(ClientOptions {
                server,
                context,
                components,
                fail_fast,
                output,
                quiet: cli.quiet,
            })
            .await
        }

        Command::Check { args } => {
            let registry = ProviderRegistry::builtin();
            adhoc::run(&registry, &args, cli.quiet).await
        }

        Command::Validate { config } => {
            let registry = ProviderRegistry::builtin();
            // Lenient load collects every warning; validate treats any of
            // them as a failure, like a strict server start would.
            match builder::load(&config, &registry, false) {
                Ok(loaded) if loaded.warnings.is_empty() => {
                    println!("OK: {} top-level components", loaded.instances.len());
                    Ok(0)
                }
                Ok(loaded) => {
                    for warning in &loaded.warnings {
                        eprintln!("warning: {warning}");
                    }
                    Ok(2)
                }
                Err(e) => {
                    eprintln!("{:?}", miette::Report::new(e));
                    Ok(2)
                }
            }
        }

        Command::Migrate { input, output } => {
            migrate::run(&input, output)?;
            Ok(0)
        }

        Command::Context { action } => client::run_context(action),
    }
}
