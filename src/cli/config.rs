use anyhow::Result;

use crate::config::Config;

/// Handle config get command
pub async fn handle_config_get(key: String) -> Result<()> {
    let config = Config::load()?;

    if let Some(value) = config.get(&key) {
        println!("{value}");
        Ok(())
    } else {
        anyhow::bail!("Config key '{key}' not set");
    }
}

/// Handle config set command
pub async fn handle_config_set(key: String, value: String) -> Result<()> {
    let mut config = Config::load()?;

    config.set(&key, value)?;
    config.save()?;

    println!("Config '{key}' set");
    println!("  Saved to: {}", Config::get_config_path()?.display());

    Ok(())
}

/// Handle config unset command
pub async fn handle_config_unset(key: String) -> Result<()> {
    let mut config = Config::load()?;

    config.unset(&key)?;
    config.save()?;

    println!("Config '{key}' reset");

    Ok(())
}

/// Handle config list command
pub async fn handle_config_list() -> Result<()> {
    let config = Config::load()?;

    for (key, value) in config.list() {
        println!("{key} = {value}");
    }
    println!();
    println!("Config file: {}", Config::get_config_path()?.display());

    Ok(())
}

/// Handle config path command
pub async fn handle_config_path() -> Result<()> {
    println!("{}", Config::get_config_path()?.display());
    Ok(())
}
