//! Backend and Frontend Generator agents.

use ideaforge_types::artifacts::{DatabaseSchema, GeneratedCode, GeneratedFile};
use ideaforge_types::build::BuildRequest;
use ideaforge_types::provenance::Sourced;
use ideaforge_types::strategy::{CompetitiveAdvantage, PricingStrategy};

use super::{Agents, bullets, normalize_path, request_block};
use crate::invoker::{AgentOutput, Cancelled, InvokeScope};

pub const BACKEND_AGENT: &str = "backend_generator";
pub const FRONTEND_AGENT: &str = "frontend_generator";

pub const BACKEND_PERSONA: &str = "You are a senior backend engineer. You write small, \
    runnable REST API servers with one route module per resource.";

pub const FRONTEND_PERSONA: &str = "You are a senior frontend engineer. You write small, \
    runnable single-page web apps with a landing page, a pricing page, and a dashboard.";

const MAX_TOKENS: u32 = 8_192;

impl AgentOutput for GeneratedCode {
    fn validate(&self) -> Result<(), String> {
        if self.files.is_empty() {
            return Err("generated code must contain at least one file".to_string());
        }
        Ok(())
    }
}

fn file(path: &str, language: &str, content: &str) -> GeneratedFile {
    GeneratedFile {
        path: path.to_string(),
        content: content.to_string(),
        language: Some(language.to_string()),
    }
}

/// Minimal Express server scaffold.
pub fn backend_fallback() -> GeneratedCode {
    GeneratedCode {
        framework: Some("express".to_string()),
        files: vec![
            file(
                "server/package.json",
                "json",
                r#"{
  "name": "server",
  "version": "0.1.0",
  "private": true,
  "main": "index.js",
  "scripts": { "start": "node index.js" },
  "dependencies": { "express": "^4.19.2" }
}
"#,
            ),
            file(
                "server/index.js",
                "javascript",
                r#"const express = require("express");

const app = express();
app.use(express.json());

app.get("/health", (_req, res) => res.json({ status: "ok" }));

const port = process.env.PORT || 3000;
app.listen(port, () => console.log(`listening on ${port}`));
"#,
            ),
        ],
    }
}

/// Minimal React app scaffold.
pub fn frontend_fallback() -> GeneratedCode {
    GeneratedCode {
        framework: Some("react".to_string()),
        files: vec![
            file(
                "web/package.json",
                "json",
                r#"{
  "name": "web",
  "version": "0.1.0",
  "private": true,
  "scripts": { "dev": "vite", "build": "vite build" },
  "dependencies": { "react": "^18.3.1", "react-dom": "^18.3.1" },
  "devDependencies": { "vite": "^5.4.0", "@vitejs/plugin-react": "^4.3.1" }
}
"#,
            ),
            file(
                "web/index.html",
                "html",
                r#"<!doctype html>
<html lang="en">
  <head><meta charset="UTF-8" /><title>App</title></head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.jsx"></script>
  </body>
</html>
"#,
            ),
            file(
                "web/src/main.jsx",
                "javascript",
                r#"import React from "react";
import { createRoot } from "react-dom/client";

function App() {
  return <h1>Welcome</h1>;
}

createRoot(document.getElementById("root")).render(<App />);
"#,
            ),
        ],
    }
}

/// Compact one-line-per-table rendering for prompts.
fn schema_outline(schema: &DatabaseSchema) -> String {
    let tables = schema.tables.iter().map(|t| {
        let columns: Vec<String> = t
            .columns
            .iter()
            .map(|c| {
                let mut col = format!("{} {}", c.name, c.data_type);
                if c.primary_key {
                    col.push_str(" pk");
                }
                if let Some(target) = &c.references {
                    col.push_str(&format!(" -> {target}"));
                }
                col
            })
            .collect();
        format!("{}({})", t.name, columns.join(", "))
    });
    bullets(tables)
}

const FILES_CONTRACT: &str = "Return JSON with:\n\
    - framework (string)\n\
    - files (array of {\"path\": string, \"content\": string, \"language\": string}, at least one). \
    Paths are relative to the project root; never use absolute paths or \"..\".\n";

pub fn backend_prompt(request: &BuildRequest, schema: &DatabaseSchema) -> String {
    format!(
        "{request}\n\
         ## Database schema\n{schema}\n\n\
         ## Task\n\
         Generate the backend API for this product with CRUD routes for every table above.\n\n\
         {FILES_CONTRACT}",
        request = request_block(request),
        schema = schema_outline(schema),
    )
}

pub fn frontend_prompt(
    request: &BuildRequest,
    advantages: &[CompetitiveAdvantage],
    pricing: &PricingStrategy,
) -> String {
    let plans = pricing
        .tiers
        .iter()
        .map(|t| format!("{} ({} {:.2}/month)", t.name, pricing.currency, t.price_monthly));
    format!(
        "{request}\n\
         ## Key selling points\n{advantages}\n\n\
         ## Pricing plans\n{plans}\n\n\
         ## Task\n\
         Generate the frontend for this product: landing page built around the selling points, \
         pricing page with the plans above, and a dashboard shell.\n\n\
         {FILES_CONTRACT}",
        request = request_block(request),
        advantages = bullets(advantages.iter().map(|a| &a.description)),
        plans = bullets(plans),
    )
}

/// Normalize paths, dropping files whose path is unusable, and drop
/// duplicate paths (first wins).
pub fn shape(mut code: GeneratedCode) -> GeneratedCode {
    let mut seen = std::collections::HashSet::new();
    code.files = code
        .files
        .into_iter()
        .filter_map(|mut f| match normalize_path(&f.path) {
            Some(path) => {
                f.path = path;
                Some(f)
            }
            None => {
                tracing::debug!(path = %f.path, "dropping generated file with unsafe path");
                None
            }
        })
        .filter(|f| seen.insert(f.path.clone()))
        .collect();
    code
}

impl Agents {
    /// Run the Backend Generator against the designed schema.
    pub async fn backend_generator(
        &self,
        request: &BuildRequest,
        schema: &DatabaseSchema,
        scope: &InvokeScope,
    ) -> Result<Sourced<GeneratedCode>, Cancelled> {
        let mut invocation = self.invocation(
            BACKEND_AGENT,
            BACKEND_PERSONA,
            backend_prompt(request, schema),
            MAX_TOKENS,
        );
        let code = self
            .invoker()
            .invoke(&mut invocation, backend_fallback(), scope)
            .await?;
        Ok(code.map(shape))
    }

    /// Run the Frontend Generator.
    pub async fn frontend_generator(
        &self,
        request: &BuildRequest,
        advantages: &[CompetitiveAdvantage],
        pricing: &PricingStrategy,
        scope: &InvokeScope,
    ) -> Result<Sourced<GeneratedCode>, Cancelled> {
        let mut invocation = self.invocation(
            FRONTEND_AGENT,
            FRONTEND_PERSONA,
            frontend_prompt(request, advantages, pricing),
            MAX_TOKENS,
        );
        let code = self
            .invoker()
            .invoke(&mut invocation, frontend_fallback(), scope)
            .await?;
        Ok(code.map(shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{pricing, schema};
    use ideaforge_types::build::Tier;

    #[test]
    fn fallbacks_are_valid_and_shape_stable() {
        for fb in [backend_fallback(), frontend_fallback()] {
            assert!(fb.validate().is_ok());
            assert_eq!(shape(fb.clone()), fb);
        }
    }

    #[test]
    fn shape_normalizes_and_drops_unsafe_paths() {
        let code: GeneratedCode = serde_json::from_str(
            r#"{"files": [
                {"path": "/src/index.ts", "content": "a"},
                {"path": "../../etc/passwd", "content": "b"},
                {"path": "src/index.ts", "content": "dup"},
                {"path": "", "content": "c"},
                {"path": "src\\routes\\users.ts", "content": "d"}
            ]}"#,
        )
        .unwrap();

        let shaped = shape(code);
        let paths: Vec<&str> = shaped.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/index.ts", "src/routes/users.ts"]);
        assert_eq!(shaped.files[0].content, "a");
    }

    #[test]
    fn empty_file_list_fails_validation() {
        let code = GeneratedCode {
            framework: None,
            files: vec![],
        };
        assert!(code.validate().is_err());
    }

    #[test]
    fn backend_prompt_outlines_schema() {
        let prompt = backend_prompt(&BuildRequest::new("x", "y", Tier::Free), &schema::fallback());
        assert!(prompt.contains("- users(id uuid pk, email text, name text, created_at timestamptz)"));
        assert!(prompt.contains("owner_id uuid -> users.id"));
    }

    #[test]
    fn frontend_prompt_lists_plans() {
        let prompt = frontend_prompt(
            &BuildRequest::new("x", "y", Tier::Free),
            &[],
            &pricing::fallback(),
        );
        assert!(prompt.contains("- Pro (USD 19.00/month)"));
        assert!(prompt.contains("## Key selling points\n(none)"));
    }
}
