use console::style;

use crate::error::ReleaseError;
use crate::reactor::Reactor;

pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

pub fn display_warning(message: &str) {
    eprintln!("{} {}", style("WARNING:").yellow().bold(), message);
}

pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Show a validation failure as a banner so its remediation lines stand out
/// from the surrounding build output.
pub fn display_validation_error(error: &ReleaseError) {
    let messages = error.messages();
    let width = messages.iter().map(|m| m.len()).max().unwrap_or(0);
    eprintln!("{}", style("#".repeat(width + 4)).red());
    for message in &messages {
        eprintln!("{} {}", style("#").red(), message);
    }
    eprintln!("{}", style("#".repeat(width + 4)).red());
}

/// One line per module: what will happen to it this run and why
pub fn display_decisions(reactor: &Reactor) {
    println!("\n{}", style("Release plan:").bold());
    for module in reactor.modules_in_build_order() {
        if module.will_be_released() {
            println!(
                "  {} {} {} because {}",
                style("+").green(),
                module.name(),
                style(module.new_version()).green(),
                module.reason()
            );
        } else {
            println!(
                "  {} {} stays at {} because {}",
                style("-").dim(),
                module.name(),
                style(module.version_to_depend_on()).dim(),
                module.reason()
            );
        }
    }
    println!();
}
