use console::style;

use crate::types::{AnalysisResult, Tier};

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Human-readable rendering of one result
    pub fn result(&self, result: &AnalysisResult) {
        let tier = match result.tier {
            Tier::Model => style(result.tier.to_string()).green(),
            Tier::Structural => style(result.tier.to_string()).cyan(),
            Tier::Heuristic => style(result.tier.to_string()).yellow(),
            Tier::Error => style(result.tier.to_string()).red(),
        };
        println!("{} [{}]", style(&result.target).bold(), tier);
        println!("  {}", result.summary);

        if !result.roles.is_empty() {
            let roles: Vec<&str> = result.roles.iter().map(|r| r.as_str()).collect();
            self.field("roles", &roles.join(", "));
        }
        if let Some(language) = &result.language {
            self.field("language", language);
        }
        self.list("exports", &result.exports);
        self.list("dependencies", &result.dependencies);
        self.list("related", &result.related);
        if let Some(reason) = &result.fallback {
            self.warning(&format!("fell back: {}", reason));
        }
    }

    fn field(&self, name: &str, value: &str) {
        println!("  {:<13} {}", style(name).dim(), value);
    }

    fn list(&self, name: &str, items: &[String]) {
        if !items.is_empty() {
            self.field(name, &items.join(", "));
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
