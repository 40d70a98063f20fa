//! Schema Designer agent.

use ideaforge_types::artifacts::{ColumnDef, DatabaseSchema, TableDef};
use ideaforge_types::build::BuildRequest;
use ideaforge_types::provenance::Sourced;
use ideaforge_types::research::MarketIntelligence;
use ideaforge_types::strategy::CompetitiveAdvantage;

use super::{Agents, bullets, request_block};
use crate::invoker::{AgentOutput, Cancelled, InvokeScope};

pub const AGENT: &str = "schema_designer";

pub const PERSONA: &str = "You are a database architect. You design normalized relational \
    schemas for new SaaS products with clear primary and foreign keys.";

const MAX_TOKENS: u32 = 4_096;

impl AgentOutput for DatabaseSchema {
    fn validate(&self) -> Result<(), String> {
        if self.tables.is_empty() {
            return Err("schema must define at least one table".to_string());
        }
        for table in &self.tables {
            if table.name.trim().is_empty() {
                return Err("every table needs a name".to_string());
            }
            if table.columns.is_empty() {
                return Err(format!("table '{}' has no columns", table.name));
            }
        }
        Ok(())
    }
}

fn column(name: &str, data_type: &str) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        data_type: data_type.to_string(),
        nullable: false,
        primary_key: false,
        references: None,
    }
}

/// Minimal `users` + `projects` schema.
pub fn fallback() -> DatabaseSchema {
    let id = ColumnDef {
        primary_key: true,
        ..column("id", "uuid")
    };
    DatabaseSchema {
        tables: vec![
            TableDef {
                name: "users".to_string(),
                columns: vec![
                    id.clone(),
                    column("email", "text"),
                    column("name", "text"),
                    column("created_at", "timestamptz"),
                ],
            },
            TableDef {
                name: "projects".to_string(),
                columns: vec![
                    id,
                    ColumnDef {
                        references: Some("users.id".to_string()),
                        ..column("owner_id", "uuid")
                    },
                    column("name", "text"),
                    ColumnDef {
                        nullable: true,
                        ..column("description", "text")
                    },
                    column("created_at", "timestamptz"),
                ],
            },
        ],
        relationships: vec!["projects.owner_id -> users.id (many-to-one)".to_string()],
    }
}

pub fn prompt(
    request: &BuildRequest,
    market: &MarketIntelligence,
    advantages: &[CompetitiveAdvantage],
) -> String {
    format!(
        "{request}\n\
         ## Target audience\n{audience}\n\n\
         ## Differentiating features\n{advantages}\n\n\
         ## Task\n\
         Design the relational database schema for the first version of this product.\n\n\
         Return JSON with:\n\
         - tables (array of {{\"name\": string, \"columns\": [{{\"name\": string, \"type\": string, \"nullable\": bool, \"primary_key\": bool, \"references\": \"table.column\"}}]}}, at least one)\n\
         - relationships (array of strings)\n",
        request = request_block(request),
        audience = bullets(&market.target_audience),
        advantages = bullets(advantages.iter().map(|a| &a.description)),
    )
}

/// Drop duplicate table names (first wins) and duplicate columns within a table.
pub fn shape(mut schema: DatabaseSchema) -> DatabaseSchema {
    let mut seen = std::collections::HashSet::new();
    schema
        .tables
        .retain(|t| seen.insert(t.name.trim().to_lowercase()));
    for table in &mut schema.tables {
        let mut columns = std::collections::HashSet::new();
        table
            .columns
            .retain(|c| columns.insert(c.name.trim().to_lowercase()));
    }
    schema
}

impl Agents {
    /// Run the Schema Designer; falls back to `users` + `projects`.
    pub async fn schema_designer(
        &self,
        request: &BuildRequest,
        market: &MarketIntelligence,
        advantages: &[CompetitiveAdvantage],
        scope: &InvokeScope,
    ) -> Result<Sourced<DatabaseSchema>, Cancelled> {
        let mut invocation = self.invocation(
            AGENT,
            PERSONA,
            prompt(request, market, advantages),
            MAX_TOKENS,
        );
        let schema = self.invoker().invoke(&mut invocation, fallback(), scope).await?;
        Ok(schema.map(shape))
    }
}
