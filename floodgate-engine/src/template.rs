use thiserror::Error;

/// The fixed set of names operators may reference from message templates.
pub const TEMPLATE_PARAMETERS: [&str; 5] = [
    "post_ids",
    "num_posts",
    "period",
    "report_threshold",
    "remove_threshold",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown template parameter `{name}`")]
    UnknownParameter { name: String },
    #[error("unterminated `{{` placeholder")]
    UnterminatedPlaceholder,
}

/// Values substituted into the four policy templates.
#[derive(Debug, Clone)]
pub struct TemplateParams {
    /// Pre-formatted list of post IDs (see `formatting::format_id_list`).
    pub post_ids: String,
    pub num_posts: u64,
    /// The policy window expressed in hours.
    pub period_hours: u64,
    pub report_threshold: u64,
    pub remove_threshold: u64,
}

impl TemplateParams {
    /// Representative values used to validate templates at policy-load
    /// time, so a bad placeholder surfaces as a reload problem instead of
    /// blocking a real escalation.
    pub fn representative() -> Self {
        Self {
            post_ids: "abc1, def2".to_owned(),
            num_posts: 2,
            period_hours: 24,
            report_threshold: 2,
            remove_threshold: 3,
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "post_ids" => Some(self.post_ids.clone()),
            "num_posts" => Some(self.num_posts.to_string()),
            "period" => Some(self.period_hours.to_string()),
            "report_threshold" => Some(self.report_threshold.to_string()),
            "remove_threshold" => Some(self.remove_threshold.to_string()),
            _ => None,
        }
    }
}

/// Substitute `{name}` placeholders in `template`.
///
/// `{{` and `}}` escape literal braces. Referencing a name outside the
/// fixed vocabulary is an error carrying the offending name.
pub fn render(template: &str, params: &TemplateParams) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => return Err(TemplateError::UnterminatedPlaceholder),
                    }
                }

                match params.lookup(&name) {
                    Some(value) => out.push_str(&value),
                    None => return Err(TemplateError::UnknownParameter { name }),
                }
            }
            '}' => {
                // Collapse `}}` to a literal; a lone `}` passes through.
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Check a template against the parameter vocabulary without keeping the
/// output. Called for all four templates during policy validation.
pub fn validate(template: &str) -> Result<(), TemplateError> {
    render(template, &TemplateParams::representative()).map(|_| ())
}
