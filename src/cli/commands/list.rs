use super::{load_definitions, print_banner};
use anyhow::Result;
use std::path::PathBuf;

pub struct ListCommand {
    pub definitions_path: PathBuf,
}

impl ListCommand {
    pub fn new(definitions_path: PathBuf) -> Self {
        Self { definitions_path }
    }

    pub async fn execute(&self) -> Result<()> {
        print_banner("AVAILABLE TEMPLATES", 50);

        let definitions = load_definitions(&self.definitions_path)
            .inspect_err(|e| println!("❌ Failed to list templates: {e:#}"))?;

        for definition in definitions.pipelines() {
            println!("\n🔧 {}", definition.name);
            if let Some(description) = &definition.description {
                println!("   {description}");
            }
            println!("   Template: {}", definition.template_path.display());
            if !definition.required_env.is_empty() {
                println!("   Requires: {}", definition.required_env.join(", "));
            }
        }

        println!("{}", "=".repeat(50));
        Ok(())
    }
}
