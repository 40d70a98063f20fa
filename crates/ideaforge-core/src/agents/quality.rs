//! Quality Auditor agent.

use ideaforge_types::artifacts::GeneratedFile;
use ideaforge_types::build::BuildRequest;
use ideaforge_types::provenance::Sourced;
use ideaforge_types::quality::{QualityIssue, QualityReport};

use super::{Agents, clean_strings, request_block};
use crate::invoker::{AgentOutput, Cancelled, InvokeScope};

pub const AGENT: &str = "quality_auditor";

pub const PERSONA: &str = "You are a meticulous code reviewer. You audit generated code for \
    security holes, performance problems, and maintainability, and you score it honestly.";

const MAX_TOKENS: u32 = 4_096;

/// Characters of each file included in the audit prompt.
pub const MAX_FILE_CHARS: usize = 6_000;

/// Overall score used when the audit itself is unavailable.
pub const FALLBACK_SCORE: u8 = 60;

impl AgentOutput for QualityReport {}

pub fn fallback() -> QualityReport {
    QualityReport {
        overall_score: FALLBACK_SCORE,
        security_score: None,
        performance_score: None,
        maintainability_score: None,
        issues: vec![QualityIssue {
            severity: "info".to_string(),
            message: "audit unavailable".to_string(),
            file: None,
        }],
        recommendations: vec!["Review the generated code manually before deploying.".to_string()],
    }
}

/// Prompt over `files`, each truncated to [`MAX_FILE_CHARS`].
///
/// The caller decides how many files to pass.
pub fn prompt(request: &BuildRequest, files: &[GeneratedFile]) -> String {
    let mut listing = String::new();
    for f in files {
        let (content, truncated) = truncate_chars(&f.content, MAX_FILE_CHARS);
        listing.push_str(&format!(
            "### {path}\n```{lang}\n{content}\n```\n{note}\n",
            path = f.path,
            lang = f.language.as_deref().unwrap_or(""),
            note = if truncated { "(truncated)\n" } else { "" },
        ));
    }
    if listing.is_empty() {
        listing.push_str("(no files)\n");
    }

    format!(
        "{request}\n\
         ## Generated files\n{listing}\n\
         ## Task\n\
         Audit the generated code above.\n\n\
         Return JSON with:\n\
         - overall_score (integer 0-100)\n\
         - security_score, performance_score, maintainability_score (integers 0-100)\n\
         - issues (array of {{\"severity\": \"low\" | \"medium\" | \"high\" | \"critical\", \"message\": string, \"file\": string}})\n\
         - recommendations (array of strings)\n",
        request = request_block(request),
    )
}

fn truncate_chars(s: &str, max: usize) -> (&str, bool) {
    match s.char_indices().nth(max) {
        Some((idx, _)) => (&s[..idx], true),
        None => (s, false),
    }
}

pub fn shape(mut report: QualityReport) -> QualityReport {
    report.overall_score = report.overall_score.min(100);
    report.security_score = report.security_score.map(|s| s.min(100));
    report.performance_score = report.performance_score.map(|s| s.min(100));
    report.maintainability_score = report.maintainability_score.map(|s| s.min(100));
    report.issues.retain(|i| !i.message.trim().is_empty());
    for issue in &mut report.issues {
        issue.severity = issue.severity.trim().to_lowercase();
    }
    report.recommendations = clean_strings(report.recommendations);
    report
}

impl Agents {
    /// Run the Quality Auditor over `files`; falls back to score 60.
    pub async fn quality_auditor(
        &self,
        request: &BuildRequest,
        files: &[GeneratedFile],
        scope: &InvokeScope,
    ) -> Result<Sourced<QualityReport>, Cancelled> {
        let mut invocation = self.invocation(AGENT, PERSONA, prompt(request, files), MAX_TOKENS);
        let report = self.invoker().invoke(&mut invocation, fallback(), scope).await?;
        Ok(report.map(shape))
    }
}
