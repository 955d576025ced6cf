//! Model capability queries.

/// Model families that reject an explicit sampling temperature.
const REASONING_PREFIXES: &[&str] = &["o1", "o3", "o4", "gpt-5"];

/// Whether requests to `model` may carry a `temperature`.
///
/// `no_temperature` lists extra model or deployment names (exact match,
/// case-insensitive) that must be treated like reasoning models.
pub fn model_supports_temperature(model: &str, no_temperature: &[String]) -> bool {
    let model = model.to_ascii_lowercase();
    if no_temperature.iter().any(|m| m.eq_ignore_ascii_case(&model)) {
        return false;
    }
    !REASONING_PREFIXES.iter().any(|prefix| {
        model == *prefix
            || model
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with(['-', '.', '_']))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_models_support_temperature() {
        assert!(model_supports_temperature("gpt-4o", &[]));
        assert!(model_supports_temperature("gpt-4.1-mini", &[]));
        assert!(model_supports_temperature("o1x-custom", &[]));
    }

    #[test]
    fn reasoning_models_do_not() {
        assert!(!model_supports_temperature("o1", &[]));
        assert!(!model_supports_temperature("o3-mini", &[]));
        assert!(!model_supports_temperature("O4-mini", &[]));
        assert!(!model_supports_temperature("gpt-5-chat", &[]));
    }

    #[test]
    fn overrides_apply_to_deployment_names() {
        let overrides = vec!["TB-Reasoner".to_string()];
        assert!(!model_supports_temperature("tb-reasoner", &overrides));
        assert!(model_supports_temperature("tb-chat", &overrides));
    }
}
