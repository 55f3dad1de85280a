//! Skill tag extraction from free-text job content.
//!
//! Two passes over the lower-cased text: a scan for a fixed vocabulary of
//! known skills matched at word boundaries, then a small parser for labelled
//! lists such as `Skills: Rust, Tokio; SQL.`.

use std::collections::HashSet;

/// Maximum number of skills kept per posting.
pub const MAX_SKILLS: usize = 20;

/// Known skill tokens, matched case-insensitively at word boundaries.
pub const KNOWN_SKILLS: &[&str] = &[
    "javascript",
    "typescript",
    "python",
    "java",
    "c++",
    "c#",
    "php",
    "ruby",
    "go",
    "rust",
    "react",
    "vue",
    "angular",
    "node.js",
    "express",
    "django",
    "flask",
    "spring",
    "laravel",
    "sql",
    "postgresql",
    "mysql",
    "mongodb",
    "redis",
    "elasticsearch",
    "docker",
    "kubernetes",
    "aws",
    "azure",
    "gcp",
    "terraform",
    "git",
    "ci/cd",
    "jenkins",
    "github actions",
    "agile",
    "scrum",
    "devops",
    "microservices",
    "html",
    "css",
    "sass",
    "less",
    "webpack",
    "babel",
    "machine learning",
    "ai",
    "data science",
    "big data",
    "rest api",
    "graphql",
    "soap",
    "linux",
    "unix",
    "bash",
    "shell scripting",
];

/// Vocabulary entries that are also common English words. They only count
/// when they sit in a list, next to a separator such as `,` or `/`.
const AMBIGUOUS_SKILLS: &[&str] = &["go", "less"];

/// Labels that introduce an explicit list of skills.
const LIST_LABELS: &[&str] = &[
    "compétences",
    "compétence",
    "technologies",
    "technology",
    "requirements",
    "requirement",
    "skills",
    "skill",
];

/// Shortest list item kept from a labelled list.
const MIN_ITEM_LEN: usize = 2;

/// Extract at most [`MAX_SKILLS`] unique skills from a posting's text.
///
/// Vocabulary hits come first, ordered by where they first appear, followed by
/// labelled-list items in text order.
pub fn extract_skills(description: &str, requirements: &str) -> Vec<String> {
    let text = format!("{description} {requirements}").to_lowercase();

    let mut hits: Vec<(usize, &str)> = KNOWN_SKILLS
        .iter()
        .filter_map(|skill| find_skill(&text, skill).map(|pos| (pos, *skill)))
        .collect();
    hits.sort_by_key(|(pos, _)| *pos);

    let candidates = hits
        .into_iter()
        .map(|(_, skill)| skill.to_string())
        .chain(labelled_items(&text));

    let mut seen = HashSet::new();
    let mut skills = Vec::new();
    for candidate in candidates {
        if seen.insert(candidate.to_lowercase()) {
            skills.push(candidate);
            if skills.len() == MAX_SKILLS {
                break;
            }
        }
    }
    skills
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte offsets of the occurrences of `needle` that are not glued to
/// surrounding word characters.
fn word_matches<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    let step = needle.chars().next().map_or(1, char::len_utf8);
    let mut from = 0;
    std::iter::from_fn(move || {
        while let Some(offset) = haystack.get(from..)?.find(needle) {
            let start = from + offset;
            let end = start + needle.len();
            from = start + step;
            let before = haystack[..start].chars().next_back();
            let after = haystack[end..].chars().next();
            if !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char) {
                return Some(start);
            }
        }
        None
    })
}

/// First position where `skill` counts as a hit.
fn find_skill(text: &str, skill: &str) -> Option<usize> {
    let mut hits = word_matches(text, skill);
    if !AMBIGUOUS_SKILLS.contains(&skill) {
        return hits.next();
    }
    hits.find(|&start| in_list(text, start, start + skill.len()))
}

/// Whether the token at `start..end` is delimited by a list separator.
fn in_list(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].trim_end_matches([' ', '\t']).chars().next_back();
    let after = text[end..].trim_start_matches([' ', '\t']).chars().next();
    before.is_some_and(|c| matches!(c, ',' | ';' | '/' | '(' | ':' | '|'))
        || after.is_some_and(|c| matches!(c, ',' | ';' | '/' | ')' | '|'))
}

/// Items of every `label: a, b; c` list in `text`, in order of appearance.
fn labelled_items(text: &str) -> Vec<String> {
    let mut lists: Vec<(usize, &str)> = Vec::new();

    for label in LIST_LABELS {
        let mut from = 0;
        while let Some(offset) = text[from..].find(label) {
            let start = from + offset;
            let end = start + label.len();
            from = end;

            let before = text[..start].chars().next_back();
            if before.is_some_and(is_word_char) {
                continue;
            }
            let Some(body) = list_body(&text[end..]) else {
                continue;
            };
            // "skill" also matches inside "skills:"; keep the longest label only.
            if lists.iter().any(|(pos, _)| *pos == start) {
                continue;
            }
            lists.push((start, body));
        }
    }

    lists.sort_by_key(|(pos, _)| *pos);
    lists
        .into_iter()
        .flat_map(|(_, body)| body.split([',', ';']))
        .map(str::trim)
        .filter(|item| item.chars().count() >= MIN_ITEM_LEN)
        .map(String::from)
        .collect()
}

/// The list following a label: optional spaces, a colon, then everything up
/// to the next sentence boundary. `None` when the label is not followed by a colon.
fn list_body(rest: &str) -> Option<&str> {
    let rest = rest.trim_start_matches([' ', '\t']);
    let body = rest.strip_prefix(':')?;

    let mut chars = body.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\n' | '\r' => return Some(&body[..idx]),
            '.' | '!' | '?' => {
                let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
                if at_boundary {
                    return Some(&body[..idx]);
                }
            }
            _ => {}
        }
    }
    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_vocabulary_at_word_boundaries() {
        let skills = extract_skills(
            "We use Rust and PostgreSQL with Docker. Google experience is a plus.",
            "",
        );
        assert_eq!(skills, vec!["rust", "postgresql", "docker"]);
    }

    #[test]
    fn short_tokens_do_not_match_inside_words() {
        let skills = extract_skills("Maintain a good team spirit", "Strong javascript");
        assert_eq!(skills, vec!["javascript"]);
    }

    #[test]
    fn common_words_need_a_list_context() {
        let skills = extract_skills(
            "No less than five years as the go-to person. Let's go!",
            "Stack: Rust, Go and Less / Sass",
        );
        assert_eq!(skills, vec!["rust", "go", "less", "sass"]);

        assert!(extract_skills("You will go further with us, no less.", "").is_empty());
    }

    #[test]
    fn symbols_in_skill_names_are_matched() {
        let skills = extract_skills("Backend in C# and C++ with a CI/CD pipeline on Node.js", "");
        assert_eq!(skills, vec!["c#", "c++", "ci/cd", "node.js"]);
    }

    #[test]
    fn parses_labelled_lists_up_to_sentence_end() {
        let skills = extract_skills(
            "Great team. Technologies: Tokio, Axum; SQLx. We offer remote work.",
            "",
        );
        assert_eq!(skills, vec!["tokio", "axum", "sqlx"]);
    }

    #[test]
    fn dotted_names_do_not_end_a_list() {
        let skills = extract_skills("", "Skills: Next.js, Vue.js, Deno");
        assert_eq!(skills, vec!["vue", "next.js", "vue.js", "deno"]);
    }

    #[test]
    fn label_without_colon_is_ignored() {
        let skills = extract_skills("Soft skills matter here", "");
        assert!(skills.is_empty());
    }

    #[test]
    fn deduplicates_case_insensitively() {
        let skills = extract_skills("Python, python and PYTHON", "Skills: Python, Kafka");
        assert_eq!(skills, vec!["python", "kafka"]);
    }

    #[test]
    fn output_is_bounded_to_twenty() {
        let text = KNOWN_SKILLS[..25].join(", ");
        let skills = extract_skills(&text, "");

        assert_eq!(skills.len(), MAX_SKILLS);
        let unique: HashSet<_> = skills.iter().map(|s| s.to_lowercase()).collect();
        assert_eq!(unique.len(), skills.len());
    }

    #[test]
    fn is_deterministic() {
        let description = "Compétences : React, TypeScript. Requirements: AWS; Terraform";
        assert_eq!(
            extract_skills(description, "Linux"),
            extract_skills(description, "Linux")
        );
    }
}
