//! usingdata - render wiki pages that share data through `#data`.

use anyhow::Result;
use clap::Parser;
use std::io::{Write, stdout};
use usingdata::{
    build::build_site,
    cli::{Cli, Commands},
    config::WikiConfig,
    engine::Engine,
    log,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Render { page } => {
            let engine = Engine::from_config(&config)?;
            let page = page.as_deref().unwrap_or(&config.wiki.main_page);
            print(&engine.render_page(page)?)
        }
        Commands::Query {
            target,
            field,
            default,
        } => {
            let engine = Engine::from_config(&config)?;
            match engine.query(target, field, default.as_deref())? {
                Some(value) => print(&format!("{value}\n")),
                None => {
                    log!("warn"; "`{}` does not publish `{}`", target, field);
                    Ok(())
                }
            }
        }
        Commands::Inspect { page } => {
            let engine = Engine::from_config(&config)?;
            let summary = engine.inspect(page)?;
            print(&format!("{}\n", serde_json::to_string_pretty(&summary)?))
        }
        Commands::Build { .. } => build_site(&config).map(|_| ()),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<WikiConfig> {
    let root = cli.root.clone().unwrap_or_else(|| "./".into());
    let mut config = WikiConfig::load(&root.join(&cli.config))?;
    config.update_with_cli(cli);
    config.validate()?;
    Ok(config)
}

fn print(text: &str) -> Result<()> {
    let mut out = stdout().lock();
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}
