//! Static environment catalog consulted by the orchestrator and exposed
//! to clients at `GET /api/v1/environments`.

use crate::model::Environment;

/// Returns the built-in catalog of supported languages.
///
/// Image construction and compile-driver scripts live outside the core
/// (see the out-of-scope list); this table only needs to know enough to
/// resolve an image tag and a source file extension per language.
pub fn default_catalog() -> Vec<Environment> {
    vec![
        Environment {
            language: "cpp".to_string(),
            compilers: vec!["gcc-13".to_string(), "clang-17".to_string()],
            standards: vec!["c++17".to_string(), "c++20".to_string()],
            os: vec!["linux".to_string()],
            architectures: vec!["x86_64".to_string(), "arm64".to_string()],
        },
        Environment {
            language: "rust".to_string(),
            compilers: vec!["rustc-1.75".to_string()],
            standards: vec!["2021".to_string()],
            os: vec!["linux".to_string()],
            architectures: vec!["x86_64".to_string(), "arm64".to_string()],
        },
        Environment {
            language: "go".to_string(),
            compilers: vec!["go-1.21".to_string()],
            standards: vec!["default".to_string()],
            os: vec!["linux".to_string()],
            architectures: vec!["x86_64".to_string()],
        },
    ]
}

/// File extension used for the fixed in-container source path
/// (`/workspace/source.<ext>`).
pub fn source_extension(language: &str) -> Option<&'static str> {
    match language {
        "cpp" => Some("cpp"),
        "rust" => Some("rs"),
        "go" => Some("go"),
        _ => None,
    }
}

/// Resolves an image tag from a validated `(language, compiler)` pair.
pub fn image_tag(language: &str, compiler: &str) -> String {
    format!("compileforge/{}-{}:latest", language, compiler)
}

pub fn find(catalog: &[Environment], language: &str) -> Option<&Environment> {
    catalog.iter().find(|e| e.language == language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_nonempty() {
        let catalog = default_catalog();
        assert!(!catalog.is_empty());
        let cpp = find(&catalog, "cpp").unwrap();
        assert!(!cpp.compilers.is_empty());
        assert!(!cpp.standards.is_empty());
        assert!(!cpp.os.is_empty());
        assert!(!cpp.architectures.is_empty());
    }

    #[test]
    fn test_source_extension() {
        assert_eq!(source_extension("cpp"), Some("cpp"));
        assert_eq!(source_extension("cobol"), None);
    }

    #[test]
    fn test_image_tag() {
        assert_eq!(image_tag("cpp", "gcc-13"), "compileforge/cpp-gcc-13:latest");
    }
}
