use super::{load_definitions, print_banner};
use anyhow::Result;
use std::path::PathBuf;

pub struct ValidateCommand {
    pub definitions_path: PathBuf,
}

impl ValidateCommand {
    pub fn new(definitions_path: PathBuf) -> Self {
        Self { definitions_path }
    }

    /// Load the definitions document and mark each pipeline whose template
    /// directory is present.
    pub async fn execute(&self) -> Result<()> {
        print_banner("CONFIGURATION VALIDATION", 50);

        let definitions = match load_definitions(&self.definitions_path) {
            Ok(definitions) => definitions,
            Err(e) => {
                println!("❌ Configuration validation failed: {e:#}");
                return Err(e);
            }
        };

        let types = definitions.pipeline_types();
        println!("✅ Configuration is valid");
        println!("📊 Found {} pipeline types:", types.len());

        for definition in definitions.pipelines() {
            let status = if definition.template_dir_exists() { "✅" } else { "❌" };
            println!("   {status} {}", definition.name);

            let missing = definition.missing_templates();
            if definition.template_dir_exists() && !missing.is_empty() {
                println!("      ⚠️  missing templates: {}", missing.join(", "));
            }
        }

        println!("{}", "=".repeat(50));
        Ok(())
    }
}
