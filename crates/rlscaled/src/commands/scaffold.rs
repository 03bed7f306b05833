use std::path::Path;

use rlscale_core::ControllerConfig;
use rlscale_env::SimConfig;

pub fn run(namespace: &str, name: &str, output: Option<&Path>, sim: bool) -> anyhow::Result<()> {
    let rendered = render(namespace, name, sim)?;
    match output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            println!("✓ Generated {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn render(namespace: &str, name: &str, sim: bool) -> anyhow::Result<String> {
    if sim {
        return Ok(toml::to_string_pretty(&SimConfig::default())?);
    }
    Ok(ControllerConfig::scaffold(namespace, name).to_toml_string()?)
}
