//! Framework-specific route extractors
//!
//! Each web framework gets its own module with a consistent interface for finding
//! route registrations in raw source text.

mod express;

pub use express::ExpressParser;

/// A route registration found in a source file
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    /// HTTP method, uppercased
    pub method: String,

    /// Route path as written, e.g. `/users/:id`
    pub path: String,

    /// Raw text of the handler argument(s)
    pub handler_text: String,

    /// Byte offset where the handler argument starts
    pub handler_start: usize,

    /// Text between the handler's outer braces, empty when none were found
    pub handler_body: String,

    /// Name of the handler function, or `anonymous`
    pub function_name: String,

    /// 1-based line of the registration
    pub line: usize,

    /// 1-based line of the handler's closing brace
    pub end_line: usize,

    /// Preceded by an @swagger/@openapi JSDoc block
    pub documented: bool,
}

/// Trait that all route extractors must implement
pub trait RouteParser: Send + Sync {
    /// Find every route registration in the source. Never fails.
    fn extract_routes(&self, content: &str) -> Vec<RouteMatch>;

    /// Whether the source looks like it defines routes at all
    fn is_api_source(&self, content: &str) -> bool;

    /// Get the file extensions this parser handles
    fn file_extensions(&self) -> &[&str];

    /// Get the framework name
    fn framework_name(&self) -> &str;
}
