//! Resource naming and one-line purpose summaries for routes.

/// Domain nouns recognised in paths and handler names
pub const RESOURCE_KEYWORDS: [&str; 16] = [
    "user", "product", "order", "item", "account", "post", "comment", "category", "session",
    "profile", "cart", "payment", "address", "book", "article", "event",
];

/// Verbs in handler names that override the HTTP method's default action
const VERB_ACTIONS: [(&str, &str); 25] = [
    ("get", "Retrieve"),
    ("list", "List"),
    ("find", "Find"),
    ("search", "Search"),
    ("fetch", "Fetch"),
    ("create", "Create"),
    ("add", "Add"),
    ("new", "Register"),
    ("post", "Post"),
    ("register", "Register"),
    ("update", "Update"),
    ("edit", "Edit"),
    ("modify", "Modify"),
    ("set", "Set"),
    ("patch", "Patch"),
    ("delete", "Delete"),
    ("remove", "Remove"),
    ("cancel", "Cancel"),
    ("process", "Process"),
    ("handle", "Handle"),
    ("login", "Log in"),
    ("logout", "Log out"),
    ("signin", "Log in"),
    ("authenticate", "Authenticate"),
    ("authorize", "Authorize"),
];

const UNKNOWN_RESOURCE: &str = "Unknown";

/// Resource type a route operates on, e.g. `User` for `/api/v1/users/:id`
pub fn infer_resource(path: &str, function_name: &str) -> String {
    let segment = path
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| !s.starts_with(':') && !s.starts_with('{') && *s != "*")
        .find(|s| !is_conventional_prefix(s));

    if let Some(segment) = segment {
        let singular = singularize(&segment.to_lowercase());
        if RESOURCE_KEYWORDS.contains(&singular.as_str()) {
            return capitalize(&singular);
        }
    }

    let lowered = function_name.to_lowercase();
    if let Some(keyword) = RESOURCE_KEYWORDS.iter().find(|k| lowered.contains(*k)) {
        return capitalize(keyword);
    }

    match segment {
        Some(segment) => capitalize(segment),
        None => UNKNOWN_RESOURCE.to_string(),
    }
}

/// Sentence describing what the endpoint does
pub fn infer_purpose(method: &str, function_name: &str, resource: &str) -> String {
    let words = if function_name == "anonymous" {
        Vec::new()
    } else {
        split_words(function_name)
    };

    let mut action = match method.to_uppercase().as_str() {
        "GET" => "Retrieve",
        "POST" => "Create",
        "PUT" => "Update",
        "PATCH" => "Partially update",
        "DELETE" => "Delete",
        _ => "Handle",
    };
    if let Some(verb) = words
        .iter()
        .find_map(|w| VERB_ACTIONS.iter().find(|(k, _)| *k == w.as_str()).map(|(_, v)| *v))
    {
        action = verb;
    }

    let plural = method.eq_ignore_ascii_case("GET")
        && (action == "List" || words.iter().any(|w| w == "all" || w == "search"));
    if plural {
        action = "List";
    }

    let singular = if resource == UNKNOWN_RESOURCE {
        "resource".to_string()
    } else {
        singularize(&resource.to_lowercase())
    };
    let plural_form = pluralize(&singular);
    let display = if plural { &plural_form } else { &singular };

    let action_lower = action.to_lowercase();
    let extras: Vec<&str> = words
        .iter()
        .map(String::as_str)
        .filter(|w| !VERB_ACTIONS.iter().any(|(k, _)| k == w))
        .filter(|w| *w != singular && *w != plural_form && *w != action_lower && *w != "all")
        .collect();

    if extras.is_empty() {
        format!("API endpoint to {} {}.", action_lower, display)
    } else {
        format!(
            "API endpoint to {} {} related to {}.",
            action_lower,
            display,
            extras.join(" ")
        )
    }
}

fn is_conventional_prefix(segment: &str) -> bool {
    let lowered = segment.to_lowercase();
    lowered == "api"
        || (lowered.len() > 1
            && lowered.starts_with('v')
            && lowered[1..].bytes().all(|b| b.is_ascii_digit()))
}

/// Lowercase words of a camelCase, PascalCase or snake_case identifier
fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = name.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        let boundary = c.is_ascii_uppercase()
            && i > 0
            && (chars[i - 1].is_ascii_lowercase()
                || chars[i - 1].is_ascii_digit()
                || (chars[i - 1].is_ascii_uppercase()
                    && chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase())));
        if boundary && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{}y", stem)
    } else if let Some(stem) = word.strip_suffix("sses") {
        format!("{}ss", stem)
    } else if word.len() > 1 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

fn pluralize(word: &str) -> String {
    let consonant_y = word.len() > 1
        && word.ends_with('y')
        && !matches!(word.as_bytes()[word.len() - 2], b'a' | b'e' | b'i' | b'o' | b'u');
    if consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_from_path() {
        assert_eq!(infer_resource("/users/:id", "anonymous"), "User");
        assert_eq!(infer_resource("/api/v1/products", "anonymous"), "Product");
        assert_eq!(infer_resource("/categories", "anonymous"), "Category");
        assert_eq!(infer_resource("/addresses/:addressId", "anonymous"), "Address");
    }

    #[test]
    fn test_resource_from_function_name_then_segment() {
        assert_eq!(infer_resource("/me", "getProfile"), "Profile");
        assert_eq!(infer_resource("/health", "anonymous"), "Health");
        assert_eq!(infer_resource("/", "anonymous"), "Unknown");
        assert_eq!(infer_resource("/:id", "anonymous"), "Unknown");
    }

    #[test]
    fn test_purpose_defaults_by_method() {
        assert_eq!(infer_purpose("GET", "anonymous", "User"), "API endpoint to retrieve user.");
        assert_eq!(infer_purpose("POST", "anonymous", "Item"), "API endpoint to create item.");
        assert_eq!(
            infer_purpose("PATCH", "anonymous", "Order"),
            "API endpoint to partially update order."
        );
        assert_eq!(infer_purpose("DELETE", "anonymous", "Unknown"), "API endpoint to delete resource.");
    }

    #[test]
    fn test_purpose_from_handler_name() {
        assert_eq!(infer_purpose("GET", "getAllUsers", "User"), "API endpoint to list users.");
        assert_eq!(infer_purpose("POST", "registerAccount", "Account"), "API endpoint to register account.");
        assert_eq!(infer_purpose("POST", "loginUser", "Session"), "API endpoint to log in session related to user.");
        assert_eq!(
            infer_purpose("GET", "searchCategories", "Category"),
            "API endpoint to list categories."
        );
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("getUserByID"), vec!["get", "user", "by", "id"]);
        assert_eq!(split_words("list_all_orders"), vec!["list", "all", "orders"]);
        assert_eq!(split_words("HTMLParser"), vec!["html", "parser"]);
    }
}
