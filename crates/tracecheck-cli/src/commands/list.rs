// Command handler for: List

use miette::IntoDiagnostic;

use tracecheck_engine::config::{catalog_entries, CatalogEntry, ModelChoice};

use super::helpers::{parse_flag, parse_output_format};
use crate::OutputFormat;

pub(crate) fn run_list_command(model: &str, format: &str) -> miette::Result<()> {
    let format = parse_output_format(format)?;
    let model = parse_flag::<ModelChoice>(Some(model))?.unwrap_or_default();
    let entries = catalog_entries(model);
    match format {
        OutputFormat::Text => print!("{}", render_catalog_text(model, &entries)),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries).into_diagnostic()?);
        }
    }
    Ok(())
}

fn render_catalog_text(model: ModelChoice, entries: &[CatalogEntry]) -> String {
    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    let mut out = format!("Invariants of the {} model:\n", model.name());
    for entry in entries {
        out.push_str(&format!(
            "  {:<width$}  [{}]  {}\n",
            entry.name, entry.shape, entry.description
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_listing_names_every_invariant() {
        let entries = catalog_entries(ModelChoice::Ballot);
        let text = render_catalog_text(ModelChoice::Ballot, &entries);
        for entry in &entries {
            assert!(text.contains(&entry.name));
        }
        assert!(text.contains("[cross-trace]"));
    }
}
