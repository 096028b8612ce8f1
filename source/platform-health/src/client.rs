//! The client command: one `Check` round trip against a running server,
//! rendered locally.

use miette::{IntoDiagnostic, WrapErr};

use crate::cli::ContextAction;
use crate::context_store::{ContextEntry, ContextStore};
use crate::pb::v1::health_client::HealthClient;
use crate::pb::v1::HealthCheckRequest;
use crate::render::{self, OutputFormat};

pub struct ClientOptions {
    pub server: Option<String>,
    pub context: Option<String>,
    pub components: Vec<String>,
    pub fail_fast: bool,
    pub output: OutputFormat,
    pub quiet: u8,
}

pub async fn run(options: ClientOptions) -> miette::Result<i32> {
    let store = ContextStore::load()?;
    let address = store.resolve(options.server, options.context)?;
    let endpoint = normalize_endpoint(&address);

    tracing::debug!(%endpoint, "connecting");
    let mut client = HealthClient::connect(endpoint.clone())
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to connect to {endpoint}"))?;

    let response = client
        .check(HealthCheckRequest {
            components: options.components,
            hops: Vec::new(),
            fail_fast: options.fail_fast,
        })
        .await
        .into_diagnostic()
        .wrap_err("check call failed")?
        .into_inner();

    let rendered = render::render(&response, options.output, options.quiet);
    if !rendered.is_empty() {
        println!("{rendered}");
    }

    Ok(render::exit_code(&response))
}

fn normalize_endpoint(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

/// The `context` subcommand: manage the named servers the client can talk to.
pub fn run_context(action: ContextAction) -> miette::Result<i32> {
    let mut store = ContextStore::load()?;

    match action {
        ContextAction::List => {
            for (name, entry) in &store.contexts {
                let marker = if store.current.as_deref() == Some(name) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {name}\t{}", entry.server);
            }
        }
        ContextAction::Show => match &store.current {
            Some(name) => {
                let entry = store.get(name)?;
                println!("{name}\t{}", entry.server);
            }
            None => println!("no context selected"),
        },
        ContextAction::Set { name, server } => {
            store.contexts.insert(name.clone(), ContextEntry { server });
            if store.current.is_none() {
                store.current = Some(name);
            }
            store.save()?;
        }
        ContextAction::Use { name } => {
            store.get(&name)?;
            store.current = Some(name);
            store.save()?;
        }
    }

    Ok(0)
}
