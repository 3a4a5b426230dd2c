mod authorize;
mod config;
mod import;
mod vector_db;

use std::fs;
use std::io::{self, Read};
use std::sync::Arc;

use aigov_authz::config::ConfigArgs;
use aigov_authz::store::factory::DbFactory;
use aigov_authz::store::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Authorization decisions for governed AI applications.
#[derive(Parser)]
#[command(author, version, about)]
pub struct App {
    #[command(subcommand)]
    pub commands: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Authorize(authorize::AuthorizeArgs),
    VectorDb(vector_db::VectorDbArgs),
    Import(import::ImportArgs),
    Config(config::ShowConfigArgs),
}

#[async_trait]
pub trait RunCommand {
    async fn run(&self) -> Result<()>;
}

impl App {
    pub async fn run(&self) -> Result<()> {
        match &self.commands {
            Commands::Authorize(args) => args.run().await,
            Commands::VectorDb(args) => args.run().await,
            Commands::Import(args) => args.run().await,
            Commands::Config(args) => args.run().await,
        }
    }
}

/// Loads the configuration, sets up logging and opens the database.
fn open_database(args: &ConfigArgs) -> Result<Arc<Database>> {
    let cfg = args.load()?;
    cfg.logs.init().context("init logs")?;
    debug!("Use config: {:?}", cfg);

    DbFactory::new().build_db(&cfg.db).context("build database")
}

/// Reads a JSON document from `path`, `-` means stdin.
fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let data = if path == "-" {
        let mut data = String::new();
        io::stdin()
            .read_to_string(&mut data)
            .context("read json from stdin")?;
        data
    } else {
        fs::read_to_string(path).with_context(|| format!("read json file '{path}'"))?
    };
    serde_json::from_str(&data).with_context(|| format!("parse json '{path}'"))
}

fn display_json<T: Serialize>(o: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&o)?);
    Ok(())
}
