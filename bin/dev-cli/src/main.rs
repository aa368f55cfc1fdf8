mod logger;

use std::env;
use std::process;

use anyhow::{bail, Context};
use braid::{Braid, GraphQLRequest};
use braid_config::{load_config, BraidConfig};
use serde_json::Value;
use tracing::info;

use crate::logger::configure_logging;

const USAGE: &str = "Usage:
  braid-dev-cli schema <config_path>
  braid-dev-cli query <config_path> <query_path> [variables_json]
  braid-dev-cli config-schema";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("schema") if args.len() == 3 => {
            let braid = load_braid(&args[2])?;
            println!("{}", braid.schema_sdl());
        }
        Some("query") if (4..=5).contains(&args.len()) => {
            let braid = load_braid(&args[2])?;
            let query = std::fs::read_to_string(&args[3])
                .with_context(|| format!("Unable to read query file {}", args[3]))?;
            let mut request = GraphQLRequest::new(query);
            if let Some(variables) = args.get(4) {
                match serde_json::from_str(variables).context("Invalid variables")? {
                    Value::Object(variables) => request = request.with_variables(variables),
                    _ => bail!("Variables must be a JSON object"),
                }
            }
            let result = braid.execute(request).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Some("config-schema") => {
            let schema = schemars::schema_for!(BraidConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        _ => {
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    }

    Ok(())
}

fn load_braid(config_path: &str) -> anyhow::Result<Braid> {
    let config = load_config(Some(config_path.to_string()))
        .with_context(|| format!("Unable to load configuration {}", config_path))?;
    configure_logging(&config.log)?;
    info!(sources = config.sources.len(), "composing braid");
    Ok(Braid::from_config(&config)?)
}
