//! `switch` and `validate` commands.

use gitswitch::{
    FinalState, SwitchRequest, Switcher, TransactionResult, config::Config, git::ConfigScope,
};

use super::CommandResult;
use crate::cli::{SwitchArgs, ValidateArgs};
use crate::output::{OutputFormat, print_issues, print_json, step_list};

fn scope_for(local: &Option<std::path::PathBuf>) -> ConfigScope {
    match local {
        Some(repo) => ConfigScope::Local(repo.clone()),
        None => ConfigScope::Global,
    }
}

/// Run the `switch` command. Returns `false` unless the switch completed.
pub async fn run(
    switcher: &Switcher,
    config: &Config,
    args: &SwitchArgs,
    format: OutputFormat,
) -> CommandResult<bool> {
    let options = args.transaction.apply(&config.transaction);
    let mut request = SwitchRequest::new(&args.alias, options).with_scope(scope_for(&args.local));
    if args.validate_only {
        request = request.validate_only();
    }
    let result = switcher.switch(request).await?;
    report(&result, format)?;
    Ok(result.success)
}

/// Run the `validate` command: pre-validation only, nothing is changed.
pub async fn validate(
    switcher: &Switcher,
    config: &Config,
    args: &ValidateArgs,
    format: OutputFormat,
) -> CommandResult<bool> {
    let mut options = config.transaction.clone();
    options.strict_validation |= args.strict;
    options.validate_before_switch = true;
    let request = SwitchRequest::new(&args.alias, options)
        .with_scope(scope_for(&args.local))
        .validate_only();
    let result = switcher.switch(request).await?;
    report(&result, format)?;
    Ok(result.success)
}

fn report(result: &TransactionResult, format: OutputFormat) -> CommandResult {
    match format {
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Human => print_human(result),
    }
    Ok(())
}

fn print_human(result: &TransactionResult) {
    let from = result.source.as_deref().unwrap_or("(none)");
    match result.final_state {
        FinalState::Switched => println!(
            "Switched {from} -> {} in {:.2}s",
            result.target,
            result.duration.as_secs_f64()
        ),
        FinalState::Unchanged if result.success => {
            println!("{} is ready to switch to", result.target)
        }
        state => println!("Switch to {} failed: {state}", result.target),
    }
    println!("Transaction: {}", result.transaction_id);

    if let Some(failure) = &result.failed_step {
        println!("Failed step: {} ({:?}): {}", failure.step, failure.kind, failure.message);
    }
    if result.failed_step.is_some() {
        println!("Rollback succeeded:     {}", step_list(&result.rollback_steps));
        for failure in &result.rollback_failures {
            println!("Rollback failed:        {}: {}", failure.step, failure.message);
        }
        println!(
            "Rollback not attempted: {}",
            step_list(&result.rollback_not_attempted())
        );
        if !result.uncompensated_steps.is_empty() {
            println!(
                "Still in effect:        {}",
                step_list(&result.uncompensated_steps)
            );
        }
    }

    let issues: Vec<_> = result
        .validation_errors
        .iter()
        .chain(result.warnings.iter())
        .collect();
    if !issues.is_empty() {
        println!();
        print_issues(&issues);
    }
}
