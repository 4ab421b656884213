use crate::config::Config;

/// Prints every validation error, or the effective config with secrets masked.
pub fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    let errors = config.validation_errors();

    if !errors.is_empty() {
        println!("Configuration has {} problem(s):", errors.len());
        for error in &errors {
            println!("  ✗ {error}");
        }
        anyhow::bail!("invalid configuration");
    }

    println!("✓ Configuration is valid");
    println!("{:-<60}", "");
    print!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}
