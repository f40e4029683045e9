use console::{Emoji, style};

use super::history::StoredIncident;
use super::incident::{Analysis, Severity};

pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_step(step: &str) {
    println!("{} {}", SPARKLE, style(step).bold());
}

pub fn print_link(label: &str, url: &str) {
    println!(
        "  {} {}: {}",
        GLOBE,
        style(label).bold(),
        style(url).underlined().cyan()
    );
}

pub fn print_banner() {
    println!();
    println!(
        "{} {}",
        LOOKING_GLASS,
        style("incident-triage").bold().cyan()
    );
    println!(
        "{}\n",
        style("Turns a failed LLM API request into an incident report.").dim()
    );
}

/// A titled block of help lines.
pub struct GuideSection {
    title: String,
    lines: Vec<String>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, description: &str) -> Self {
        self.lines.push(format!(
            "  {:<10} {}",
            style(name).green(),
            style(description).dim()
        ));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.lines.push(format!("  {}", text));
        self
    }

    pub fn blank(mut self) -> Self {
        self.lines.push(String::new());
        self
    }

    pub fn print(self) {
        println!(" {}", style(self.title).bold().underlined());
        for line in self.lines {
            println!("{}", line);
        }
        println!();
    }
}

fn severity_style(severity: Severity) -> console::StyledObject<&'static str> {
    let label = severity.as_str();
    match severity {
        Severity::Critical => style(label).red().bold(),
        Severity::High => style(label).red(),
        Severity::Medium => style(label).yellow(),
        Severity::Low => style(label).green(),
    }
}

fn print_list(title: &str, items: &[String]) {
    println!("\n{}", style(title).bold());
    for item in items {
        println!("  - {}", item);
    }
}

pub fn print_analysis(analysis: &Analysis) {
    let c = &analysis.classification;
    let r = &analysis.report;

    print_step("Classification");
    print_status("Category", c.error_category.as_str());
    print_status("Fault domain", c.fault_domain.as_str());
    print_status("Severity", &severity_style(c.severity).to_string());
    print_status("Provider", c.provider.as_deref().unwrap_or("unknown"));
    if c.severity.is_production_impacting() {
        print_warn("Production-impacting incident");
    }

    println!("\n{}", style("Root cause").bold());
    println!("  {}", r.root_cause);
    print_list("Evidence", &r.evidence);
    println!("\n{}", style("Customer impact").bold());
    println!("  {}", r.customer_impact);
    print_list("Mitigation", &r.mitigation);
    println!("\n{}", style("Reproduction").bold());
    println!("{}", style(&r.reproduction_script).dim());
    println!("\n{}", style("Escalation").bold());
    println!("  {}", r.escalation_notes);

    if let Some(similar) = &r.similar_incidents {
        println!("\n{}", style("Similar incidents").bold());
        for s in similar {
            println!(
                "  {} {} [{} / {}] {}",
                style(&s.created_at).dim(),
                style(&s.id).cyan(),
                s.fault_domain,
                s.severity,
                s.error_message
            );
        }
    }
    println!();
}

pub fn print_incident_table(incidents: &[StoredIncident]) {
    if incidents.is_empty() {
        print_info("No incidents recorded yet.");
        return;
    }
    for i in incidents {
        println!(
            "{}  {}  {:>4}  {:<20} {:<8} {}",
            style(&i.created_at).dim(),
            style(&i.id).cyan(),
            i.error_code,
            i.fault_domain,
            i.severity,
            i.error_message
        );
    }
}
