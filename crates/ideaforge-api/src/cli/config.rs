//! `forge config`: print the effective configuration.

use std::path::Path;

use anyhow::Result;
use console::style;

use ideaforge_infra::llm::{API_KEY_ENV, api_key_from_env};
use ideaforge_types::config::ForgeConfig;

/// Render the configuration as TOML, or JSON when `json` is set.
pub fn render(config: &ForgeConfig, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(config)?)
    } else {
        Ok(toml::to_string_pretty(config)?)
    }
}

pub fn show_config(data_dir: &Path, config: &ForgeConfig, json: bool) -> Result<()> {
    let rendered = render(config, json)?;
    if json {
        println!("{rendered}");
        return Ok(());
    }

    let key_status = if api_key_from_env().is_some() {
        style("set").green()
    } else {
        style("missing").red()
    };

    println!();
    println!(
        "  {} {}",
        style("Config file:").bold(),
        style(data_dir.join("config.toml").display()).cyan()
    );
    println!("  {} {key_status}", style(format!("{API_KEY_ENV}:")).bold());
    println!();
    for line in rendered.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}
