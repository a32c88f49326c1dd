//! Experiment tools and registry
//!
//! Two canned lookup tools, pure functions of a city name. Arguments are
//! typed and their schemas generated, so the declarations advertised to
//! the model match what `call` actually decodes.

use crate::error::CanvasError;
use crate::gemini::FunctionDeclaration;
use crate::schema::ResponseSchema;
use crate::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for a single experiment tool
#[async_trait]
pub trait ExperimentTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters_schema(&self) -> serde_json::Value;
    async fn call(&self, args: &serde_json::Value) -> Result<String>;
}

/// Registry for looking up and executing tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ExperimentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn ExperimentTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExperimentTool>> {
        self.tools.get(name).cloned()
    }

    /// Function declarations for every registered tool.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        let mut declarations: Vec<FunctionDeclaration> = self
            .tools
            .values()
            .map(|tool| FunctionDeclaration {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters_json_schema: tool.parameters_schema(),
            })
            .collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    /// Execute a tool by name. Unknown names and argument decode
    /// failures are tool errors; the guard middleware decides what they
    /// mean for the run.
    pub async fn execute(&self, name: &str, args: &serde_json::Value) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| CanvasError::ToolError(format!("tool not found: {}", name)))?;
        tool.call(args).await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CityArgs {
    city: String,
}

fn decode_city(tool: &str, args: &serde_json::Value) -> Result<String> {
    let decoded: CityArgs = serde_json::from_value(args.clone())
        .map_err(|e| CanvasError::ToolError(format!("{}: invalid arguments: {}", tool, e)))?;
    Ok(decoded.city)
}

/// Current weather for a city
pub struct GetWeatherTool;

#[async_trait]
impl ExperimentTool for GetWeatherTool {
    fn name(&self) -> &'static str {
        "get_weather"
    }

    fn description(&self) -> &'static str {
        "Get weather for a given city."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        CityArgs::response_schema()
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String> {
        let city = decode_city(self.name(), args)?;
        Ok(format!("It's always sunny in {}!", city))
    }
}

/// Weekly forecast for a city
pub struct GetForecastTool;

#[async_trait]
impl ExperimentTool for GetForecastTool {
    fn name(&self) -> &'static str {
        "get_forecast"
    }

    fn description(&self) -> &'static str {
        "Get forecast for a given city."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        CityArgs::response_schema()
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String> {
        let city = decode_city(self.name(), args)?;
        Ok(format!("The forecast for {} is sunny all week!", city))
    }
}

/// Registry with both experiment tools registered.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(GetWeatherTool));
    registry.register(Arc::new(GetForecastTool));
    registry
}
