//! Specialized agents.
//!
//! Each agent is a thin policy layer over the [`ResilientInvoker`]: it
//! renders a prompt from upstream data, invokes the model, and shapes the
//! typed record into its final form (clamped scores, trimmed lists,
//! normalized paths). Agents never decide whether they run; that is the
//! sequencer's job.
//!
//! Agent entry points are methods on [`Agents`], split across one module per
//! agent.

pub mod codegen;
pub mod competitors;
pub mod market;
pub mod pricing;
pub mod quality;
pub mod reviews;
pub mod schema;
pub mod scores;

use ideaforge_types::build::BuildRequest;
use ideaforge_types::config::ModelSettings;

use crate::invoker::{AgentInvocation, ResilientInvoker};

/// Output contract appended to every system prompt.
const JSON_CONTRACT: &str = "Respond with exactly one JSON object that matches the requested \
    shape. Do not wrap it in markdown, do not add commentary before or after it, and use plain \
    double quotes for every key and string.";

/// The agent roster, bound to one invoker and one model table.
#[derive(Debug, Clone)]
pub struct Agents {
    invoker: ResilientInvoker,
    models: ModelSettings,
}

impl Agents {
    pub fn new(invoker: ResilientInvoker, models: ModelSettings) -> Self {
        Self { invoker, models }
    }

    pub fn invoker(&self) -> &ResilientInvoker {
        &self.invoker
    }

    /// Fresh invocation for `agent`, using its configured model.
    fn invocation(
        &self,
        agent: &'static str,
        persona: &str,
        prompt: String,
        max_tokens: u32,
    ) -> AgentInvocation {
        AgentInvocation::new(agent, self.models.model_for(agent), prompt, max_tokens)
            .with_system(format!("{persona}\n\n{JSON_CONTRACT}"))
    }
}

// ---------------------------------------------------------------------------
// Prompt helpers
// ---------------------------------------------------------------------------

/// The request block every prompt starts with.
fn request_block(request: &BuildRequest) -> String {
    let mut block = format!(
        "## Product idea\n{}\n\n## Target market\n{}\n\n## Tier\n{}\n",
        request.idea.trim(),
        request.target_market.trim(),
        request.tier,
    );
    if let Some(country) = request.target_country.as_deref() {
        block.push_str(&format!("\n## Target country\n{}\n", country.trim()));
    }
    block
}

/// Markdown bullet list, or `(none)` when empty.
fn bullets<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let lines: Vec<String> = items
        .into_iter()
        .map(|s| format!("- {}", s.as_ref()))
        .collect();
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Shaping helpers
// ---------------------------------------------------------------------------

/// Normalize a generated file path.
///
/// Backslashes become `/`, leading `/` and `.` segments are dropped. Returns
/// `None` for empty paths and for any path containing a `..` segment.
pub fn normalize_path(path: &str) -> Option<String> {
    let unified = path.trim().replace('\\', "/");
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Trim every string and drop the empty ones.
fn clean_strings(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_types::build::Tier;

    #[test]
    fn normalize_path_strips_leading_slash() {
        assert_eq!(normalize_path("/src/main.rs").as_deref(), Some("src/main.rs"));
        assert_eq!(normalize_path("///a//b.ts").as_deref(), Some("a/b.ts"));
    }

    #[test]
    fn normalize_path_rejects_parent_segments() {
        assert_eq!(normalize_path("../etc/passwd"), None);
        assert_eq!(normalize_path("src/../../x"), None);
        assert_eq!(normalize_path("..\\windows\\x"), None);
    }

    #[test]
    fn normalize_path_handles_dots_and_backslashes() {
        assert_eq!(normalize_path("./src/./app.py").as_deref(), Some("src/app.py"));
        assert_eq!(normalize_path("server\\routes\\users.js").as_deref(), Some("server/routes/users.js"));
        assert_eq!(normalize_path("src/..config").as_deref(), Some("src/..config"));
    }

    #[test]
    fn normalize_path_rejects_empty() {
        assert_eq!(normalize_path(""), None);
        assert_eq!(normalize_path(" / "), None);
        assert_eq!(normalize_path("./"), None);
    }

    #[test]
    fn request_block_includes_country_when_present() {
        let request = BuildRequest::new("Recipe planner", "busy parents", Tier::Starter)
            .with_country("Germany");
        let block = request_block(&request);
        assert!(block.contains("Recipe planner"));
        assert!(block.contains("busy parents"));
        assert!(block.contains("starter"));
        assert!(block.contains("## Target country\nGermany"));

        let without = request_block(&BuildRequest::new("x", "y", Tier::Free));
        assert!(!without.contains("Target country"));
    }

    #[test]
    fn bullets_renders_none_for_empty() {
        assert_eq!(bullets(Vec::<String>::new()), "(none)");
        assert_eq!(bullets(["a", "b"]), "- a\n- b");
    }

    #[test]
    fn clean_strings_drops_blank_entries() {
        let cleaned = clean_strings(vec![" a ".into(), "".into(), "  ".into(), "b".into()]);
        assert_eq!(cleaned, vec!["a", "b"]);
    }
}
