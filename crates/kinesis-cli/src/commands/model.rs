//! /models and /model: list and switch models

/// Render the server's models, marking the current one
pub fn list_models_text(current: &str, models: &[String]) -> String {
    if models.is_empty() {
        return "No models available. Pull one with `ollama pull <model>`".to_string();
    }

    let mut output = String::from("Available models:\n");
    for model in models {
        let marker = if model == current { " *" } else { "" };
        output.push_str(&format!("  {}{}\n", model, marker));
    }
    output.push_str("\nSwitch with: /model <name>");
    output
}

/// Find a model by exact name, then by name without tag, then by substring
pub fn find_model<'a>(query: &str, models: &'a [String]) -> Option<&'a str> {
    let query_lower = query.to_lowercase();

    if let Some(model) = models.iter().find(|m| m.to_lowercase() == query_lower) {
        return Some(model);
    }

    // "llama3.2" matches "llama3.2:latest"
    if let Some(model) = models.iter().find(|m| {
        m.split(':')
            .next()
            .is_some_and(|base| base.to_lowercase() == query_lower)
    }) {
        return Some(model);
    }

    models
        .iter()
        .find(|m| m.to_lowercase().contains(&query_lower))
        .map(String::as_str)
}
