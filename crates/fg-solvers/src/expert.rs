use fg_types::SolverError;

/// Parse `key = value` overrides from free-form expert settings text.
///
/// Entries are separated by newlines or `;`, and `#` starts a comment that
/// runs to the end of the line. Empty text yields no overrides.
pub fn parse_expert_settings(text: &str) -> Result<Vec<(String, f64)>, SolverError> {
    let mut overrides = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or_default();
        for entry in line.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let malformed = |message: String| SolverError::MalformedExpertSettings {
                line: idx + 1,
                message,
            };

            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| malformed(format!("expected `key = value`, got `{entry}`")))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(malformed(format!("missing key in `{entry}`")));
            }
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| malformed(format!("`{}` is not a number", value.trim())))?;
            if !value.is_finite() {
                return Err(malformed(format!("{key} must be finite")));
            }

            overrides.push((key.to_string(), value));
        }
    }

    Ok(overrides)
}
