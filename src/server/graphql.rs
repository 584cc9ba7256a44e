//! Minimal GraphQL endpoint exposing `Node` lookups by global id
//!
//! Supported root fields:
//! - `node(id: ID!)`: any global id shape, no expected type
//! - `<type>(id: ID!)`, e.g. `widget(id: …)`: the expected type is the model's
//!   GraphQL type, which also enables bare numeric ids
//!
//! Selections on the resolved object may ask for `id`, `pk`, `__typename`
//! and any key of the row data.

use anyhow::{Result, anyhow, bail};
use axum::{Json, extract::State};
use graphql_parser::query::{
    Definition, Field, OperationDefinition, Selection, Value as GqlValue, parse_query,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;

use crate::core::entity::Row;
use crate::core::error::IdError;
use crate::server::handlers::AppState;

#[derive(Debug, Deserialize)]
pub struct GraphQLRequestBody {
    pub query: String,
    #[serde(default)]
    pub variables: Option<HashMap<String, Value>>,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
}

/// Executes node lookups against the resolution context
pub struct GraphQLExecutor<'a> {
    state: &'a AppState,
    variables: HashMap<String, Value>,
}

impl<'a> GraphQLExecutor<'a> {
    pub fn new(state: &'a AppState, variables: HashMap<String, Value>) -> Self {
        Self { state, variables }
    }

    /// Execute a query document. Field-level failures land in `errors`
    /// next to a `null` value, as GraphQL clients expect.
    ///
    /// With several operations in the document, `operation_name` picks one;
    /// without it the first operation runs.
    pub async fn execute(&self, query: &str, operation_name: Option<&str>) -> Result<Value> {
        let doc = parse_query::<String>(query)
            .map_err(|e| anyhow!("Failed to parse query: {}", e))?;

        let mut operations = doc.definitions.iter().filter_map(|def| match def {
            Definition::Operation(op) => Some(op),
            Definition::Fragment(_) => None,
        });
        let operation = match operation_name {
            Some(name) => operations
                .find(|op| operation_name_of(op) == Some(name))
                .ok_or_else(|| anyhow!("Unknown operation named \"{}\"", name))?,
            None => operations
                .next()
                .ok_or_else(|| anyhow!("No query operation found"))?,
        };

        let selections = match operation {
            OperationDefinition::Query(q) => &q.selection_set.items,
            OperationDefinition::SelectionSet(s) => &s.items,
            OperationDefinition::Mutation(_) | OperationDefinition::Subscription(_) => {
                bail!("Only queries are supported")
            }
        };

        let mut data = serde_json::Map::new();
        let mut errors = Vec::new();
        for selection in selections {
            let Selection::Field(field) = selection else {
                continue;
            };
            let key = field.alias.clone().unwrap_or_else(|| field.name.clone());
            match self.resolve_root_field(field).await {
                Ok(value) => {
                    data.insert(key, value);
                }
                Err(err) => {
                    errors.push(json!({
                        "message": err.to_string(),
                        "path": [key.clone()],
                        "extensions": { "code": err.error_code() },
                    }));
                    data.insert(key, Value::Null);
                }
            }
        }

        let mut response = json!({ "data": data });
        if !errors.is_empty() {
            response["errors"] = Value::Array(errors);
        }
        Ok(response)
    }

    async fn resolve_root_field(&self, field: &Field<'_, String>) -> Result<Value, IdError> {
        let id = self.id_argument(field)?;
        let ctx = &self.state.ctx;

        let row = if field.name == "node" {
            ctx.resolve_node(&id, None).await?
        } else {
            let model = ctx
                .registry()
                .iter()
                .find(|m| m.graphql_type_name().map(lower_first).as_deref() == Some(field.name.as_str()))
                .ok_or_else(|| IdError::invalid_format(field.name.clone(), "unknown query field"))?;
            let type_name = model.graphql_type_name().unwrap_or_default().to_string();
            ctx.resolve_node(&id, Some(&type_name)).await?
        };

        match row {
            Some(row) => self.resolve_object(field, row).await,
            None => Ok(Value::Null),
        }
    }

    async fn resolve_object(&self, field: &Field<'_, String>, row: Row) -> Result<Value, IdError> {
        let ctx = &self.state.ctx;
        let model = ctx.model(&row.entity_type)?;
        let mut object = serde_json::Map::new();
        for selection in &field.selection_set.items {
            let Selection::Field(sub) = selection else {
                continue;
            };
            let key = sub.alias.clone().unwrap_or_else(|| sub.name.clone());
            let value = match sub.name.as_str() {
                "id" => Value::String(ctx.to_global_id(&row).await?),
                "pk" => json!(row.pk),
                "__typename" => json!(model.graphql_type_name()),
                other => row.data.get(other).cloned().unwrap_or(Value::Null),
            };
            object.insert(key, value);
        }
        Ok(Value::Object(object))
    }

    fn id_argument(&self, field: &Field<'_, String>) -> Result<String, IdError> {
        let value = field
            .arguments
            .iter()
            .find(|(name, _)| name == "id")
            .map(|(_, value)| value)
            .ok_or_else(|| IdError::invalid_format(field.name.clone(), "missing argument 'id'"))?;

        match value {
            GqlValue::String(s) => Ok(s.clone()),
            GqlValue::Int(i) => Ok(i.as_i64().unwrap_or_default().to_string()),
            GqlValue::Variable(name) => match self.variables.get(name) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(Value::Number(n)) => Ok(n.to_string()),
                _ => Err(IdError::invalid_format(
                    format!("${}", name),
                    "variable is missing or not an id",
                )),
            },
            _ => Err(IdError::invalid_format(field.name.clone(), "argument 'id' must be an ID")),
        }
    }
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn operation_name_of<'d>(op: &'d OperationDefinition<'_, String>) -> Option<&'d str> {
    match op {
        OperationDefinition::Query(q) => q.name.as_deref(),
        OperationDefinition::Mutation(m) => m.name.as_deref(),
        OperationDefinition::Subscription(s) => s.name.as_deref(),
        OperationDefinition::SelectionSet(_) => None,
    }
}

/// POST /graphql
pub async fn graphql_handler(
    State(state): State<AppState>,
    Json(body): Json<GraphQLRequestBody>,
) -> Json<Value> {
    let executor = GraphQLExecutor::new(&state, body.variables.unwrap_or_default());
    match executor
        .execute(&body.query, body.operation_name.as_deref())
        .await
    {
        Ok(response) => Json(response),
        Err(e) => Json(json!({
            "data": null,
            "errors": [{ "message": e.to_string() }],
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_first() {
        assert_eq!(lower_first("Widget"), "widget");
        assert_eq!(lower_first("OtherModel"), "otherModel");
        assert_eq!(lower_first(""), "");
    }
}
