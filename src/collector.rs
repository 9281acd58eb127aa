use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::finding::{FileEntry, InputSchema, PackageKind, PackageProfile, ToolDefinition};

const PER_FILE_CAP: usize = 50 * 1024;
const TOTAL_BUDGET: usize = 300 * 1024;

static EXCLUDED_DIRS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "node_modules",
        ".git",
        "__pycache__",
        "venv",
        ".venv",
        "dist",
        "build",
        ".next",
        ".nuxt",
        "coverage",
        "vendor",
        "test",
        "tests",
        "__tests__",
        "spec",
        "specs",
        "docs",
        "doc",
        "examples",
        "example",
        "fixtures",
        "e2e",
        "benchmarks",
        ".tox",
        ".eggs",
        "htmlcov",
    ]
    .into_iter()
    .collect()
});

static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // images / fonts / audio / video
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "woff", "woff2", "ttf", "otf",
        "mp3", "wav", "ogg", "mp4", "mov", "avi", "webm",
        // archives
        "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "whl",
        // compiled / byte-compiled
        "pyc", "pyo", "class", "jar", "war", "ear", "o", "a", "so", "dylib", "dll", "exe", "wasm",
        "node",
        // misc opaque
        "lock", "map", "d.ts", "min.js", "db", "sqlite", "sqlite3",
    ]
    .into_iter()
    .collect()
});

static MCP_FINGERPRINTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "@modelcontextprotocol/sdk",
        "mcp.server",
        "from mcp import",
        "FastMCP",
        "ModelContextProtocol",
    ]
});

static CLI_FRAMEWORK_MARKERS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "#!/usr/bin/env",
        "argparse",
        "click.command",
        "clap::Parser",
        "yargs(",
        "commander.",
    ]
});

static TOOL_NAME_NOISE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["self", "cls", "args", "kwargs", "name", "tool", "request", "response"]
        .into_iter()
        .collect()
});

static RE_TOOL_DECORATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@(?:mcp\.)?tool\s*\(\s*(?:name\s*=\s*)?["']?([A-Za-z0-9_\-]+)?"#).unwrap());
static RE_TOOL_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)@(?:mcp\.)?tool[^\n]*\n\s*(?:async\s+)?def\s+([A-Za-z0-9_]+)"#).unwrap()
});
static RE_TOOL_REGISTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:register_tool|add_tool|registerTool)\s*\(\s*["']([A-Za-z0-9_\-]+)["']"#)
        .unwrap()
});
static RE_TOOL_CTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"Tool\s*\(\s*name\s*=\s*["']([A-Za-z0-9_\-]+)["']"#).unwrap());
static RE_TOOL_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{\s*name\s*:\s*["']([A-Za-z0-9_\-]+)["']\s*,\s*description\s*:"#).unwrap()
});
static RE_PROMPT_DECORATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@(?:mcp\.)?prompt\s*\(\s*(?:name\s*=\s*)?["']?([A-Za-z0-9_\-]+)?"#).unwrap()
});
static RE_PROMPT_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)@(?:mcp\.)?prompt[^\n]*\n\s*(?:async\s+)?def\s+([A-Za-z0-9_]+)"#).unwrap()
});

/// Collect File Entries under `root` plus the derived Package Profile.
///
/// Individual file-read errors are swallowed (§4.1 failure semantics); an
/// empty result is valid. Traversal is depth-first, lexical order, and
/// symlink-safe: canonical directories are visited at most once and a
/// symlink whose target is a directory is never descended into.
pub fn collect(root: &Path) -> (Vec<FileEntry>, PackageProfile) {
    let mut entries = Vec::new();
    let mut visited_dirs: HashSet<PathBuf> = HashSet::new();
    let mut total_bytes = 0usize;

    walk(root, root, &mut visited_dirs, &mut entries, &mut total_bytes);

    entries.sort_by(|a, b| a.path.cmp(&b.path));

    let profile = derive_package_profile(root, &entries);
    (entries, profile)
}

/// SHA-256 over the sorted `(path, content)` sequence, per the Report data
/// model. `entries` is expected pre-sorted by path (as `collect` returns
/// it); two collections with identical path/content pairs hash identically
/// regardless of filesystem metadata like mtime.
pub fn source_hash(entries: &[FileEntry]) -> String {
    let mut hasher = Sha256::new();
    let mut sorted: Vec<&FileEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    for entry in sorted {
        hasher.update(entry.path.as_bytes());
        hasher.update(b"\0");
        hasher.update(entry.content.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

fn walk(
    root: &Path,
    dir: &Path,
    visited_dirs: &mut HashSet<PathBuf>,
    out: &mut Vec<FileEntry>,
    total_bytes: &mut usize,
) {
    if *total_bytes >= TOTAL_BUDGET {
        return;
    }

    let canonical = match fs::canonicalize(dir) {
        Ok(c) => c,
        Err(_) => return,
    };
    if !visited_dirs.insert(canonical) {
        return;
    }

    let mut children: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => return,
    };
    children.sort();

    for child in children {
        if *total_bytes >= TOTAL_BUDGET {
            return;
        }

        let file_name = match child.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => continue,
        };

        let is_symlink = child
            .symlink_metadata()
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);

        let metadata = match child.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };

        if metadata.is_dir() {
            if is_symlink {
                // a symlink whose target is a directory is skipped unconditionally
                continue;
            }
            if is_excluded_dir(&file_name, &child, root) {
                continue;
            }
            walk(root, &child, visited_dirs, out, total_bytes);
            continue;
        }

        if !metadata.is_file() {
            continue;
        }

        if is_binary_filename(&file_name) {
            continue;
        }

        let len = metadata.len() as usize;
        if len == 0 || len > PER_FILE_CAP {
            continue;
        }

        let content = match fs::read_to_string(&child) {
            Ok(c) => c,
            Err(_) => continue,
        };

        if *total_bytes + content.len() > TOTAL_BUDGET && *total_bytes > 0 {
            return;
        }

        let rel_path = child
            .strip_prefix(root)
            .unwrap_or(&child)
            .to_string_lossy()
            .replace('\\', "/");

        *total_bytes += content.len();
        out.push(FileEntry {
            path: rel_path,
            byte_len: content.len(),
            content,
        });
    }
}

fn is_excluded_dir(name: &str, path: &Path, root: &Path) -> bool {
    if name == ".github" {
        // pruned except .github/workflows
        return false;
    }
    if name.starts_with('.') {
        return true;
    }
    if EXCLUDED_DIRS.contains(name) {
        return true;
    }
    // .github itself is walked so workflows/ survives, but any other
    // .github/* subdirectory stays out per the fixed exclusion rule.
    let rel = path.strip_prefix(root).unwrap_or(path).to_string_lossy();
    if rel.starts_with(".github/") && !rel.starts_with(".github/workflows") {
        return true;
    }
    false
}

fn is_binary_filename(name: &str) -> bool {
    let lower = name.to_lowercase();
    if let Some(ext) = lower.rsplit('.').next() {
        if BINARY_EXTENSIONS.contains(ext) {
            return true;
        }
    }
    lower.ends_with(".min.js") || lower.ends_with(".d.ts")
}

fn derive_package_profile(root: &Path, entries: &[FileEntry]) -> PackageProfile {
    let language = dominant_language(entries);
    let kind = detect_kind(root, entries);
    let version = detect_version(root);
    let tool_names = extract_names(entries, true);
    let prompt_names = extract_names(entries, false);
    let entrypoint = detect_entrypoint(entries);

    PackageProfile {
        kind,
        language,
        version,
        tool_names,
        prompt_names,
        entrypoint,
    }
}

fn dominant_language(entries: &[FileEntry]) -> Option<String> {
    use std::collections::HashMap;
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for e in entries {
        let lang = match Path::new(&e.path).extension().and_then(|e| e.to_str()) {
            Some("py") => "python",
            Some("js") | Some("mjs") | Some("cjs") => "javascript",
            Some("ts") | Some("tsx") => "typescript",
            Some("rs") => "rust",
            Some("go") => "go",
            Some("rb") => "ruby",
            Some("java") => "java",
            _ => continue,
        };
        *counts.entry(lang).or_insert(0) += 1;
    }
    counts.into_iter().max_by_key(|(_, c)| *c).map(|(l, _)| l.to_string())
}

fn detect_kind(root: &Path, entries: &[FileEntry]) -> PackageKind {
    let has_mcp = entries
        .iter()
        .any(|e| MCP_FINGERPRINTS.iter().any(|f| e.content.contains(f)));
    if has_mcp {
        return PackageKind::McpServer;
    }
    if root.join("SKILL.md").exists() || entries.iter().any(|e| e.path == "SKILL.md") {
        return PackageKind::AgentSkill;
    }
    let has_cli = entries
        .iter()
        .any(|e| CLI_FRAMEWORK_MARKERS.iter().any(|m| e.content.contains(m)));
    if has_cli {
        return PackageKind::CliTool;
    }
    if entries.is_empty() {
        return PackageKind::Unknown;
    }
    PackageKind::Library
}

fn detect_version(root: &Path) -> Option<String> {
    let manifests = [
        ("package.json", Regex::new(r#""version"\s*:\s*"([^"]+)""#).unwrap()),
        ("pyproject.toml", Regex::new(r#"(?m)^version\s*=\s*"([^"]+)""#).unwrap()),
        ("setup.py", Regex::new(r#"version\s*=\s*["']([^"']+)["']"#).unwrap()),
        ("setup.cfg", Regex::new(r"(?m)^version\s*=\s*(\S+)").unwrap()),
        ("Cargo.toml", Regex::new(r#"(?m)^version\s*=\s*"([^"]+)""#).unwrap()),
    ];
    for (name, re) in manifests.iter() {
        if let Ok(contents) = fs::read_to_string(root.join(name)) {
            if let Some(cap) = re.captures(&contents) {
                return Some(cap[1].to_string());
            }
        }
    }
    None
}

fn extract_names(entries: &[FileEntry], tools: bool) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for e in entries {
        if !MCP_FINGERPRINTS.iter().any(|f| e.content.contains(f)) {
            continue;
        }
        let regexes: &[&Regex] = if tools {
            &[&RE_TOOL_DEF, &RE_TOOL_REGISTER, &RE_TOOL_CTOR, &RE_TOOL_OBJECT]
        } else {
            &[&RE_PROMPT_DEF, &RE_PROMPT_DECORATOR]
        };
        for re in regexes {
            for cap in re.captures_iter(&e.content) {
                if let Some(m) = cap.get(1) {
                    let name = m.as_str().to_string();
                    if name.len() >= 3
                        && name.len() <= 49
                        && !TOOL_NAME_NOISE.contains(name.as_str())
                        && !found.contains(&name)
                    {
                        found.push(name);
                    }
                }
            }
        }
    }
    // guard against a bare decorator with no captured name
    let _ = &RE_TOOL_DECORATOR;
    found
}

fn detect_entrypoint(entries: &[FileEntry]) -> Option<String> {
    const CANDIDATES: [&str; 6] = [
        "main.py",
        "server.py",
        "index.js",
        "index.ts",
        "main.rs",
        "src/main.py",
    ];
    CANDIDATES
        .iter()
        .find(|c| entries.iter().any(|e| &e.path == *c))
        .map(|c| c.to_string())
}

/// Pull Tool Definitions out of collected files for the C2 pass.
///
/// MCP manifests ship tools as a JSON array of `{name, description,
/// inputSchema}` objects, either as a standalone file or under a top-level
/// `tools` key; both shapes are tried on every JSON-looking file. Files that
/// do not parse as JSON, or parse but contain neither shape, contribute
/// nothing -- this is a best-effort extraction, not a manifest validator.
pub fn extract_tool_definitions(entries: &[FileEntry]) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    for entry in entries {
        if !looks_like_json(&entry.path) {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&entry.content) else {
            continue;
        };
        let candidates = value
            .get("tools")
            .and_then(|v| v.as_array())
            .cloned()
            .or_else(|| value.as_array().cloned())
            .unwrap_or_default();
        for candidate in candidates {
            if let Some(tool) = parse_tool_value(&candidate) {
                tools.push(tool);
            }
        }
        if candidates.is_empty() {
            if let Some(tool) = parse_tool_value(&value) {
                tools.push(tool);
            }
        }
    }
    tools
}

fn looks_like_json(path: &str) -> bool {
    path.ends_with(".json")
}

fn parse_tool_value(value: &serde_json::Value) -> Option<ToolDefinition> {
    let name = value.get("name")?.as_str()?.to_string();
    let description = value
        .get("description")
        .and_then(|d| d.as_str())
        .unwrap_or_default()
        .to_string();
    let input_schema = value
        .get("inputSchema")
        .or_else(|| value.get("input_schema"))
        .and_then(|s| serde_json::from_value::<InputSchema>(s.clone()).ok())
        .unwrap_or_default();
    Some(ToolDefinition {
        name,
        description,
        input_schema,
    })
}

/// Source URL validation per §6: scheme/shorthand allowlist, shell
/// metacharacter rejection before any clone subprocess is constructed.
pub fn validate_source_url(input: &str) -> Result<(), String> {
    static SHELL_META: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[;&|`$(){}!\n\r]"#).unwrap());
    if SHELL_META.is_match(input) {
        return Err("source contains shell metacharacters".to_string());
    }

    let is_scheme = input.starts_with("https://")
        || input.starts_with("http://")
        || input.starts_with("git://")
        || input.starts_with("ssh://");
    let is_scp_like = Regex::new(r"^[\w.-]+@[\w.-]+:.+").unwrap().is_match(input);
    let is_shorthand = Regex::new(r"^[\w.-]+/[\w.-]+$").unwrap().is_match(input);

    if is_scheme || is_scp_like || is_shorthand {
        Ok(())
    } else {
        Err("unrecognized source format: expected a URL, git@host:path, or owner/repo".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_shell_metacharacters() {
        assert!(validate_source_url("https://x/y; rm -rf /").is_err());
    }

    #[test]
    fn extracts_tools_from_a_tools_array() {
        let entries = vec![FileEntry {
            path: "manifest.json".into(),
            content: r#"{"tools":[{"name":"fetch","description":"Fetch a URL","inputSchema":{"type":"object"}}]}"#.into(),
            byte_len: 0,
        }];
        let tools = extract_tool_definitions(&entries);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "fetch");
    }

    #[test]
    fn non_json_files_contribute_no_tools() {
        let entries = vec![FileEntry {
            path: "main.py".into(),
            content: "print('hi')".into(),
            byte_len: 0,
        }];
        assert!(extract_tool_definitions(&entries).is_empty());
    }

    #[test]
    fn accepts_https_and_shorthand() {
        assert!(validate_source_url("https://github.com/foo/bar").is_ok());
        assert!(validate_source_url("foo/bar").is_ok());
        assert!(validate_source_url("git@github.com:foo/bar.git").is_ok());
    }

    #[test]
    fn rejects_unrecognized_format() {
        assert!(validate_source_url("not a url at all!!").is_err());
    }
}
