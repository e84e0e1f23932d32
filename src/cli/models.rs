use anyhow::Result;

use crate::catalog;
use crate::core::config;

pub fn run() -> Result<()> {
    let catalog = catalog::load(config::models_path());
    if let Some(problem) = &catalog.problem {
        println!("Error: {}", problem);
    }
    for model in catalog.choices() {
        println!("{}", model);
    }
    Ok(())
}
