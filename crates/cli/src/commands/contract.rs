//! `controlgate list | validate | test | eval`: inspect and exercise contracts.

use super::{build_layer, eval_limits, load_config, load_store};
use controlgate_contracts::{Contract, try_evaluate};
use controlgate_hooks::{format_directive, parse_tool_output};
use std::path::Path;

/// List governed tools with their rules in evaluation order.
pub fn list(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let (store, _) = load_store(&config);

    if store.is_empty() {
        println!("No contracts configured in {}.", config.contracts_dir.display());
        println!("\nAdd a contract file such as search.yaml:");
        println!("  tool_name: search");
        println!("  description: Web search results");
        println!("  rules:");
        println!("    - name: non_empty");
        println!("      description: Results must be reviewed");
        println!("      trigger_condition: \"len(tool_output) > 0\"");
        println!("      instruction: Review the results before answering.");
        println!("      priority: 1");
        return Ok(());
    }

    println!("Governed tools ({}):\n", store.len());
    for contract in store.iter() {
        print_contract(contract);
    }
    Ok(())
}

fn print_contract(contract: &Contract) {
    println!("  {} ({} rules)", contract.tool_name, contract.rules().len());
    if !contract.description.is_empty() {
        println!("     {}", contract.description);
    }
    for (i, rule) in contract.rules().iter().enumerate() {
        let status = if rule.condition().is_ok() { "OK " } else { "ERR" };
        println!(
            "     {}. [{}] {} (priority: {})",
            i + 1,
            status,
            rule.name,
            rule.priority
        );
        println!("        condition: {}", rule.trigger_condition);
        if let Err(e) = rule.condition() {
            println!("        error: {e}");
        }
    }
}

/// Load every contract file and report what loaded and what was skipped.
/// Exits with status 1 when any file was skipped.
pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let (_, report) = load_store(&config);

    println!("Contracts directory: {}", report.dir.display());
    for file in &report.loaded {
        println!(
            "  OK   {} (tool: {}, rules: {})",
            file.path.display(),
            file.tool_name,
            file.rule_count
        );
    }
    for issue in &report.issues {
        println!("  FAIL {issue}");
    }

    if report.is_clean() {
        println!("\nAll {} contract files are valid.", report.loaded.len());
        Ok(())
    } else {
        eprintln!(
            "\nContract validation found {} problem(s).",
            report.issues.len()
        );
        std::process::exit(1);
    }
}

/// Evaluate `output` against the contract for `tool`.
pub fn test(
    config_path: Option<&Path>,
    tool: &str,
    output: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let layer = build_layer(&config);

    if layer.store().get(tool).is_none() {
        println!("NO CONTRACT for tool '{tool}'");
        return Ok(());
    }

    let value = parse_tool_output(output);
    match layer.evaluate(tool, &value).rule() {
        Some(rule) => {
            println!("MATCH (rule: {}, priority: {})", rule.name, rule.priority);
            println!("  instruction: {}", rule.instruction);
            println!(
                "  directive: {}",
                format_directive(&config.product_label, tool, rule)
            );
        }
        None => println!("NO MATCH"),
    }
    Ok(())
}

/// Evaluate a single expression and report the result or the error.
pub fn eval(
    config_path: Option<&Path>,
    expression: &str,
    output: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let value = parse_tool_output(output);

    match try_evaluate(expression, &value, &eval_limits(&config)) {
        Ok(result) => println!("{result}"),
        Err(e) => {
            eprintln!("error evaluating expression: {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
