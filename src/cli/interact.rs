//! Console prompts used by the interactive commands.

use crate::analyzer::ProjectDescriptor;
use crate::gitlab::{BranchConflict, BranchConflictResolver, ConflictDecision};
use async_trait::async_trait;
use std::io::{self, Write};
use tracing::warn;

const VARIABLE_HINTS: &[(&str, &str)] = &[
    ("CI_REGISTRY_URL", "GitLab Container Registry URL (e.g., registry.gitlab.com)"),
    ("DOCKER_REGISTRY", "Docker registry URL (e.g., docker-registry.company.com)"),
    ("OPENSHIFT_SERVER", "OpenShift cluster API server URL (e.g., https://api.openshift.company.com)"),
    ("OPENSHIFT_TOKEN", "OpenShift authentication token (oc whoami -t)"),
    ("PYPI_TOKEN", "PyPI API token for publishing Python packages"),
    ("NPM_TOKEN", "npm registry authentication token for publishing packages"),
    ("TWINE_USERNAME", "Username for PyPI (usually __token__)"),
    ("TWINE_PASSWORD", "PyPI token (same as PYPI_TOKEN)"),
];

const SENSITIVE_WORDS: &[&str] = &["token", "password", "secret", "key"];

/// Prompting for more than this many variables first offers to skip them all.
const BULK_SKIP_THRESHOLD: usize = 2;

/// Print `question`, read one line from stdin and return it trimmed.
pub fn prompt(question: &str) -> io::Result<String> {
    print!("{question}");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// `y`/`yes` and `n`/`no` in any case; anything else (including an empty
/// answer) gives `default`.
pub fn parse_yes_no(input: &str, default: bool) -> bool {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

/// Ask a yes/no question; unreadable input counts as "no".
pub fn confirm(question: &str, default: bool) -> bool {
    match prompt(question) {
        Ok(answer) => parse_yes_no(&answer, default),
        Err(err) => {
            warn!(error = %err, "Failed to read answer");
            false
        }
    }
}

/// `python_service` → `Python → Service`
pub fn pretty_type(pipeline_type: &str) -> String {
    pipeline_type
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" → ")
}

pub fn variable_hint(name: &str) -> Option<&'static str> {
    VARIABLE_HINTS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, hint)| *hint)
}

pub fn is_sensitive(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_WORDS.iter().any(|word| lower.contains(word))
}

/// 1-based menu selection into `options`.
pub fn parse_menu_index(input: &str, options: &[&str]) -> Option<usize> {
    let index: usize = input.trim().parse().ok()?;
    (1..=options.len()).contains(&index).then(|| index - 1)
}

pub fn display_project_analysis(descriptor: &ProjectDescriptor) {
    println!();
    println!("{}", "=".repeat(50));
    println!("        PROJECT ANALYSIS");
    println!("{}", "=".repeat(50));
    println!("📁 Project:     {}", descriptor.name);
    println!("🔤 Language:    {}", descriptor.language);
    println!("📦 Type:        {}", descriptor.archetype);
    if descriptor.analysis_branch != descriptor.default_branch {
        println!("🔍 Branch:      {} (dev branch used)", descriptor.analysis_branch);
    }
    println!(
        "🚀 Pipeline:    {}",
        if descriptor.has_pipeline { "✅ Exists" } else { "❌ Missing" }
    );
    println!("{}", "=".repeat(50));
}

fn choose_from(types: &[&str]) -> Option<String> {
    for (i, pipeline_type) in types.iter().enumerate() {
        println!("  {}. {}", i + 1, pretty_type(pipeline_type));
    }
    loop {
        let answer = prompt(&format!("\nChoose (1-{}, q to cancel): ", types.len())).ok()?;
        if answer.eq_ignore_ascii_case("q") {
            return None;
        }
        match parse_menu_index(&answer, types) {
            Some(index) => return Some(types[index].to_string()),
            None => println!("Please choose 1-{}", types.len()),
        }
    }
}

/// Show the analysis and let the user accept the detected pipeline type,
/// pick another one of `types`, or cancel (`None`).
pub fn confirm_pipeline_type(descriptor: &ProjectDescriptor, types: &[&str]) -> Option<String> {
    display_project_analysis(descriptor);

    if descriptor.has_pipeline {
        println!("\n⚠️  This project already has a pipeline - will be updated");
    }

    let detected = descriptor.detected_type();
    println!("\n🎯 Will create: {}", pretty_type(&detected));
    println!("\nWhat would you like to do?");
    println!("  1️⃣  Continue with these settings");
    println!("  2️⃣  Choose another pipeline type");
    println!("  3️⃣  Exit");

    let mut selected = loop {
        let answer = prompt("\nChoice [1]: ").ok()?;
        match answer.as_str() {
            "" | "1" => break detected,
            "2" => break choose_from(types)?,
            "3" => return None,
            _ => println!("❌ Please choose 1, 2, or 3"),
        }
    };

    if !types.contains(&selected.as_str()) {
        println!("\n⚠️  '{selected}' not available. Available options:");
        selected = choose_from(types)?;
    }

    println!("\n🚀 Final selection: {}", pretty_type(&selected));
    Some(selected)
}

/// Ask for a value for each of `missing`; skipped variables are left out.
pub fn ask_for_variables(missing: &[String]) -> Vec<(String, String)> {
    println!();
    println!("{}", "=".repeat(60));
    println!("       MISSING ENVIRONMENT VARIABLES");
    println!("{}", "=".repeat(60));
    for (i, name) in missing.iter().enumerate() {
        println!("  {}. {name}", i + 1);
        if let Some(hint) = variable_hint(name) {
            println!("     💡 {hint}");
        }
    }
    println!("{}", "=".repeat(60));
    println!("\n🔧 You can also set these in GitLab:");
    println!("   Project Settings → CI/CD → Variables");
    println!("   Or Group Settings → CI/CD → Variables (for multiple projects)");

    if missing.len() > BULK_SKIP_THRESHOLD
        && confirm("\nWould you like to skip adding variables now? [y/N]: ", false)
    {
        println!("⏭️  Skipping variable setup - you can add them manually later");
        return Vec::new();
    }

    let mut values = Vec::new();
    for (i, name) in missing.iter().enumerate() {
        println!("\n📝 Variable {}/{}: {name}", i + 1, missing.len());
        if is_sensitive(name) {
            println!("⚠️  This looks like a sensitive value");
            if confirm("Skip this variable for now? [y/N]: ", false) {
                println!("⏭️  Skipped {name}");
                continue;
            }
        }

        loop {
            let Ok(value) = prompt(&format!("Enter value for '{name}' (or 'skip' to skip): ")) else {
                break;
            };
            if value.eq_ignore_ascii_case("skip") {
                println!("⏭️  Skipped {name}");
                break;
            }
            if value.is_empty() {
                println!("❌ Value cannot be empty. Please try again or type 'skip'.");
                continue;
            }
            values.push((name.clone(), value));
            println!("✅ {name} configured");
            break;
        }
    }

    values
}

/// Asks on the console whether an existing branch may be replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractiveResolver;

#[async_trait]
impl BranchConflictResolver for InteractiveResolver {
    async fn resolve(&self, conflict: &BranchConflict) -> ConflictDecision {
        let conflict = conflict.clone();
        let answer = tokio::task::spawn_blocking(move || {
            println!("\n⚠️  Branch '{}' already exists", conflict.name);
            if let Some(message) = &conflict.last_commit_message {
                println!("   Last commit: {message}");
            }
            if let Some(date) = &conflict.last_commit_date {
                println!("   Date: {date}");
            }
            confirm("🗑️  Delete it and create it again? [y/N]: ", false)
        })
        .await;

        match answer {
            Ok(true) => ConflictDecision::Recreate,
            Ok(false) => ConflictDecision::Abort,
            Err(err) => {
                warn!(error = %err, "Branch conflict prompt failed");
                ConflictDecision::Abort
            }
        }
    }
}
