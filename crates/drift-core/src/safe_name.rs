use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn scheme() -> Option<&'static Regex> {
    static SCHEME: OnceLock<Option<Regex>> = OnceLock::new();
    SCHEME.get_or_init(|| Regex::new(r"https?://").ok()).as_ref()
}

/// Map a `repository#path` identifier to a file-name and URL-safe token.
///
/// Removes every `http://` and `https://` (not only a leading one), then
/// turns each of `- / : . #` into `-`. The dashboard derives the same token
/// to fetch history files, so both steps are part of the published format.
pub fn safe_name(identifier: &str) -> String {
    let stripped = match scheme() {
        Some(re) => re.replace_all(identifier, ""),
        None => Cow::Borrowed(identifier),
    };
    stripped
        .chars()
        .map(|c| match c {
            '-' | '/' | ':' | '.' | '#' => '-',
            other => other,
        })
        .collect()
}

/// Safe names shared by more than one distinct identifier, with the
/// identifiers that collide on each.
pub fn find_collisions<'a, I>(identifiers: I) -> Vec<(String, Vec<String>)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for id in identifiers {
        let ids = by_name.entry(safe_name(id)).or_default();
        if !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    }
    by_name.into_iter().filter(|(_, ids)| ids.len() > 1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_and_replaces_separators() {
        assert_eq!(
            safe_name("https://github.com/org/repo.git#api"),
            "github-com-org-repo-git-api"
        );
        assert_eq!(
            safe_name("https://github.com/1024pix/pix.git#"),
            "github-com-1024pix-pix-git-"
        );
        assert_eq!(safe_name("http://host:8080/a-b#"), "host-8080-a-b-");
    }

    #[test]
    fn strips_every_scheme_occurrence() {
        assert_eq!(
            safe_name("https://host/r.git#docs/http://mirror"),
            "host-r-git-docs-mirror"
        );
        assert_eq!(safe_name("git@host:org/r.git#"), "git@host-org-r-git-");
    }

    #[test]
    fn is_deterministic() {
        let id = "https://gitlab.com/$USER/r.git#packages/web";
        assert_eq!(safe_name(id), safe_name(id));
    }

    #[test]
    fn reports_collisions() {
        let ids = [
            "https://host/a-b.git#",
            "https://host/a.b.git#",
            "https://host/c.git#",
            "https://host/a-b.git#",
        ];
        let collisions = find_collisions(ids.iter().copied());
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].0, "host-a-b-git-");
        assert_eq!(collisions[0].1.len(), 2);
    }
}
