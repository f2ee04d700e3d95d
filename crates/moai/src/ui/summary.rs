use console::style;
use moai_core::InstallationResult;
use std::fmt::Write;

/// Render a human-readable summary of an installation result
pub fn render_summary(result: &InstallationResult) -> String {
    let mut out = String::new();

    if result.success {
        let _ = writeln!(
            out,
            "{} MoAI installed in {}",
            style("✓").green().bold(),
            result.project_path.display()
        );
    } else {
        let _ = writeln!(
            out,
            "{} MoAI installation failed for {}",
            style("✗").red().bold(),
            result.project_path.display()
        );
    }

    let _ = writeln!(
        out,
        "  Mode: {}  Files: {}  Duration: {} ms",
        result.config.mode,
        result.files_created.len(),
        result.duration_ms
    );

    if !result.errors.is_empty() {
        let _ = writeln!(out, "\n{}", style("Errors:").red().bold());
        for error in &result.errors {
            let _ = writeln!(out, "  - {}", error);
        }
    }

    if !result.warnings.is_empty() {
        let _ = writeln!(out, "\n{}", style("Warnings:").yellow().bold());
        for warning in &result.warnings {
            let _ = writeln!(out, "  - {}", warning);
        }
    }

    if !result.next_steps.is_empty() {
        let _ = writeln!(out, "\n{}", style("Next steps:").bold());
        for (index, step) in result.next_steps.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", index + 1, step);
        }
    }

    out
}
