use std::collections::HashMap;

/// Replace every `$NAME` in `template` with `variables[NAME]`.
///
/// Single pass, left to right: substituted values are never re-scanned. When
/// several names match at one `$` (`$TOKEN` and `$TOKEN_RO`) the longest wins.
/// Names absent from `variables` are left untouched.
pub fn substitute_variables(template: &str, variables: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('$') {
        result.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let matched = variables
            .iter()
            .filter(|(name, _)| !name.is_empty() && after.starts_with(name.as_str()))
            .max_by_key(|(name, _)| name.len());
        match matched {
            Some((name, value)) => {
                result.push_str(value);
                rest = &after[name.len()..];
            }
            None => {
                result.push('$');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}
