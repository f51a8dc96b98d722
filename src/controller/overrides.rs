//! Invocation-time overrides applied on top of the job template

/// Values supplied at invocation time
///
/// Every field is optional; `None` leaves the template value unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSet {
    pub vus: Option<String>,
    /// Seconds, without unit
    pub duration: Option<String>,
    pub rps: Option<String>,
    pub parallelism: Option<String>,
    pub script_file: Option<String>,
}

impl OverrideSet {
    /// Build an override set from raw string inputs
    ///
    /// Inputs arrive as plain strings where empty means unset, so empty and
    /// whitespace-only values are normalised to `None`.
    pub fn from_inputs(
        vus: Option<String>,
        duration: Option<String>,
        rps: Option<String>,
        parallelism: Option<String>,
        script_file: Option<String>,
    ) -> Self {
        OverrideSet {
            vus: non_empty(vus),
            duration: non_empty(duration),
            rps: non_empty(rps),
            parallelism: non_empty(parallelism),
            script_file: non_empty(script_file),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == OverrideSet::default()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
