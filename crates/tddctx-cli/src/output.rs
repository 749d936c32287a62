use serde::Serialize;
use tddctx_core::evaluator::Issue;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_issue(issue: &Issue) {
    println!(
        "{} {} [{}]: {}",
        issue.severity.symbol(),
        issue.severity,
        issue.kind.as_str(),
        issue.message
    );
}

pub fn print_section(title: &str) {
    println!("\n{title}");
    println!("{}", "-".repeat(title.chars().count()));
}
