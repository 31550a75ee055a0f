//! `schema` command: shows the resolved field mapping for each account.

use threadnote_core::{AppConfig, FieldMapping, Role};
use threadnote_sync::schema::RULES;
use threadnote_sync::SchemaCache;

use crate::runtime;

pub(crate) async fn run_schema(config: &AppConfig, account: Option<&str>) -> anyhow::Result<()> {
    let runtime = runtime::build(config, account).await?;
    let cache = SchemaCache::new();

    let mut failed = 0usize;
    for ctx in &runtime.accounts {
        let collection = &ctx.account.destination_collection_id;
        match cache
            .resolve(
                ctx.destination.as_ref(),
                collection,
                ctx.account.field_mapping.as_ref(),
            )
            .await
        {
            Ok(mapping) => {
                let source = if ctx.account.field_mapping.is_some() {
                    "override"
                } else {
                    "detected"
                };
                println!("{} ({collection}, {source}):", ctx.account.id);
                println!("{}", format_mapping(&mapping));
            }
            Err(e) => {
                eprintln!("error: {}: {e}", ctx.account.id);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} schema lookups failed");
    }
    Ok(())
}

pub(crate) fn format_mapping(mapping: &FieldMapping) -> String {
    let mut lines: Vec<String> = mapping
        .iter()
        .map(|(role, field)| {
            let role = format!("{role:?}");
            format!("  {role:<12} {field}")
        })
        .collect();
    let unmapped: Vec<String> = RULES
        .iter()
        .map(|rule| rule.role)
        .filter(|role| !mapping.contains(*role))
        .map(|role: Role| format!("{role:?}"))
        .collect();
    if !unmapped.is_empty() {
        lines.push(format!("  unmapped: {}", unmapped.join(", ")));
    }
    lines.join("\n")
}
