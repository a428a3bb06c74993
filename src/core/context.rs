use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use super::languages::RouteMatch;
use super::params::{ParamExtractor, Parameters};
use super::parser::SourceFile;
use super::resource::{infer_purpose, infer_resource};
use super::responses::{ResponseExtractor, Responses};
use super::validation::ConstraintCollector;

/// Everything the model is told about one route
#[derive(Debug, Clone, Serialize)]
pub struct ApiContext {
    #[serde(rename = "codeContext")]
    pub code_context: CodeContext,

    #[serde(rename = "apiDetails")]
    pub api_details: ApiDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeContext {
    /// Repository-relative path, `/`-separated
    pub filename: String,

    #[serde(rename = "functionName")]
    pub function_name: String,

    pub line: LineSpan,

    pub general_purpose: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineSpan {
    pub beginning: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiDetails {
    pub endpoint: Endpoint,
    pub parameters: Parameters,
    pub responses: Responses,
    pub validation: Validation,
}

#[derive(Debug, Clone, Serialize)]
pub struct Endpoint {
    pub path: String,
    pub method: String,

    #[serde(rename = "resourceType")]
    pub resource_type: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Validation {
    #[serde(rename = "inputConstraints")]
    pub input_constraints: Vec<String>,
}

/// Builds [`ApiContext`] records from extracted routes
pub struct ContextAssembler {
    params: ParamExtractor,
    responses: ResponseExtractor,
    constraints: ConstraintCollector,
    skip_documented: bool,
}

impl ContextAssembler {
    pub fn new(skip_documented: bool) -> Result<Self> {
        Ok(Self {
            params: ParamExtractor::new()?,
            responses: ResponseExtractor::new()?,
            constraints: ConstraintCollector::new()?,
            skip_documented,
        })
    }

    /// Contexts for the routes of one file, in source order
    pub fn assemble(&self, file: &SourceFile, routes: &[RouteMatch]) -> Vec<ApiContext> {
        routes
            .iter()
            .filter(|route| {
                if route.handler_body.trim().is_empty() {
                    debug!("Skipping {} {}: no handler body", route.method, route.path);
                    return false;
                }
                if self.skip_documented && route.documented {
                    debug!("Skipping {} {}: already documented", route.method, route.path);
                    return false;
                }
                true
            })
            .map(|route| self.build(&file.relative_path, route))
            .collect()
    }

    fn build(&self, filename: &str, route: &RouteMatch) -> ApiContext {
        let body = &route.handler_body;
        let parameters = self.params.extract(body, &route.path);
        let calls = self.responses.calls(body);
        let responses = self.responses.extract(&calls);
        let input_constraints =
            self.constraints
                .collect(body, &calls, &parameters.required_inputs());

        let resource_type = infer_resource(&route.path, &route.function_name);
        let general_purpose = infer_purpose(&route.method, &route.function_name, &resource_type);

        ApiContext {
            code_context: CodeContext {
                filename: filename.to_string(),
                function_name: route.function_name.clone(),
                line: LineSpan {
                    beginning: route.line,
                    end: route.end_line,
                },
                general_purpose,
            },
            api_details: ApiDetails {
                endpoint: Endpoint {
                    path: route.path.clone(),
                    method: route.method.clone(),
                    resource_type,
                },
                parameters,
                responses,
                validation: Validation { input_constraints },
            },
        }
    }
}
