//! Cross-parameter checks that run after tokenizing and prompting.

use serde_json::Value;
use tracing::debug;

use crate::args::ParsedArgs;
use crate::error::UsageError;
use crate::param::ToolDefinition;

fn given(definition: &ToolDefinition, args: &ParsedArgs, name: &str) -> bool {
    definition
        .find(name)
        .is_some_and(|param| args.is_given(&param.key()))
}

/// A parameter that is given needs its `depends_on` parameter given too.
pub fn check_dependencies(
    definition: &ToolDefinition,
    args: &ParsedArgs,
) -> Result<(), UsageError> {
    for param in &definition.parameters {
        let Some(dependency) = &param.depends_on else {
            continue;
        };
        if args.is_given(&param.key()) && !given(definition, args, dependency) {
            return Err(UsageError::MissingDependency {
                name: param.name.clone(),
                dependency: dependency.clone(),
            });
        }
    }
    Ok(())
}

pub fn check_mutually_exclusive(
    definition: &ToolDefinition,
    args: &ParsedArgs,
) -> Result<(), UsageError> {
    for group in &definition.mutually_exclusive {
        let present: Vec<String> = group
            .iter()
            .filter(|name| given(definition, args, name))
            .map(|name| format!("--{name}"))
            .collect();
        if present.len() > 1 {
            return Err(UsageError::MutuallyExclusive { given: present });
        }
    }
    Ok(())
}

pub fn check_required_one_of(
    definition: &ToolDefinition,
    args: &ParsedArgs,
) -> Result<(), UsageError> {
    for group in &definition.required_one_of {
        if !group.iter().any(|name| given(definition, args, name)) {
            return Err(UsageError::RequiredOneOf {
                group: group.iter().map(|name| format!("--{name}")).collect(),
            });
        }
    }
    Ok(())
}

/// Move values to their `dest` key.
///
/// The parameter's own key is always removed. The destination is only
/// written when the value is present or the destination does not exist
/// yet, so an absent flag never clobbers one that shares its `dest`.
pub fn apply_dest(definition: &ToolDefinition, args: &mut ParsedArgs) {
    for param in &definition.parameters {
        let Some(dest) = &param.dest else {
            continue;
        };
        let key = param.key();
        if *dest == key {
            continue;
        }

        let value = args.remove(&key).unwrap_or(Value::Null);
        if !value.is_null() || !args.contains(dest) {
            debug!(parameter = %param.name, dest = %dest, "moving value to dest");
            args.insert(dest.clone(), value);
        }
    }
}

/// Run every check in order, then remap destinations.
pub fn enforce(definition: &ToolDefinition, args: &mut ParsedArgs) -> Result<(), UsageError> {
    check_dependencies(definition, args)?;
    check_mutually_exclusive(definition, args)?;
    check_required_one_of(definition, args)?;
    apply_dest(definition, args);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{Action, Parameter};
    use serde_json::json;

    fn servers() -> ToolDefinition {
        ToolDefinition {
            parameters: vec![
                Parameter::new("mailserver")
                    .short('m')
                    .action(Action::StoreConst)
                    .constant("mail")
                    .dest("server"),
                Parameter::new("webserver")
                    .short('w')
                    .action(Action::StoreConst)
                    .constant("web")
                    .dest("server"),
                Parameter::new("ssl").action(Action::StoreTrue).depends_on("w"),
            ],
            mutually_exclusive: vec![vec!["mailserver".to_string(), "webserver".to_string()]],
            ..ToolDefinition::default()
        }
    }

    fn args(mail: Value, web: Value, ssl: bool) -> ParsedArgs {
        let mut args = ParsedArgs::new(0);
        args.insert("mailserver", mail);
        args.insert("webserver", web);
        args.insert("ssl", json!(ssl));
        args
    }

    #[test]
    fn dependency_by_short_name() {
        let definition = servers();
        let err = check_dependencies(&definition, &args(json!("mail"), json!(null), true))
            .unwrap_err();
        assert_eq!(err.to_string(), "argument --ssl requires --w to be present.");

        assert!(check_dependencies(&definition, &args(json!(null), json!("web"), true)).is_ok());
        assert!(check_dependencies(&definition, &args(json!(null), json!(null), false)).is_ok());
    }

    #[test]
    fn mutual_exclusion_lists_present_members() {
        let definition = servers();
        let err =
            check_mutually_exclusive(&definition, &args(json!("mail"), json!("web"), false))
                .unwrap_err();
        assert_eq!(
            err.to_string(),
            "arguments --mailserver, --webserver are mutually exclusive."
        );
        assert!(
            check_mutually_exclusive(&definition, &args(json!("mail"), json!(null), false))
                .is_ok()
        );
    }

    #[test]
    fn required_one_of_lists_all_members() {
        let mut definition = servers();
        definition.required_one_of = vec![vec!["mailserver".to_string(), "w".to_string()]];

        let err = check_required_one_of(&definition, &args(json!(null), json!(null), false))
            .unwrap_err();
        assert_eq!(err.to_string(), "at least one of --mailserver, --w is needed.");
        assert!(
            check_required_one_of(&definition, &args(json!(null), json!("web"), false)).is_ok()
        );
    }

    #[test]
    fn falsy_values_are_not_given() {
        let definition = ToolDefinition {
            parameters: vec![
                Parameter::new("count").action(Action::Count),
                Parameter::new("force").action(Action::StoreTrue),
            ],
            required_one_of: vec![vec!["count".to_string(), "force".to_string()]],
            ..ToolDefinition::default()
        };
        let mut parsed = ParsedArgs::new(0);
        parsed.insert("count", json!(0));
        parsed.insert("force", json!(false));
        assert!(check_required_one_of(&definition, &parsed).is_err());
    }

    #[test]
    fn shared_dest_with_neither_given() {
        let definition = servers();
        let mut parsed = args(json!(null), json!(null), false);
        enforce(&definition, &mut parsed).unwrap();
        assert_eq!(parsed.get("server"), Some(&Value::Null));
        assert!(!parsed.contains("mailserver"));
        assert!(!parsed.contains("webserver"));
    }

    #[test]
    fn shared_dest_with_one_given() {
        let definition = servers();
        for (mail, web, expected) in [
            (json!("mail"), json!(null), "mail"),
            (json!(null), json!("web"), "web"),
        ] {
            let mut parsed = args(mail, web, false);
            apply_dest(&definition, &mut parsed);
            assert_eq!(parsed.get("server"), Some(&json!(expected)));
            assert!(!parsed.contains("mailserver"));
            assert!(!parsed.contains("webserver"));
        }
    }

    #[test]
    fn dest_keeps_declaration_order_of_first_write() {
        let definition = servers();
        let mut parsed = args(json!(null), json!("web"), false);
        apply_dest(&definition, &mut parsed);
        let keys: Vec<_> = parsed.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["ssl", "server"]);
    }
}
